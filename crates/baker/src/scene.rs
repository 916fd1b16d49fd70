//! Collaborator contracts for the scene side of a bake.
//!
//! The baker never walks a real scene graph; it consumes a snapshot of
//! renderable objects through [`SceneGraph`] and leaves evaluation, material
//! compilation and draw submission to the implementor.

use anyhow::Result;
use glam::{Mat4, UVec3, Vec3};

/// Constant description of the world background lighting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldEnvironment {
    /// Linear RGB colour of the environment.
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for WorldEnvironment {
    fn default() -> Self {
        Self {
            color: Vec3::splat(0.05),
            intensity: 1.0,
        }
    }
}

/// An irradiance-grid probe object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridProbe {
    /// Object transform; the grid spans the unit cube [-1, 1] in local space.
    pub transform: Mat4,
    pub resolution: UVec3,
    pub visibility_range: f32,
    pub visibility_blur: f32,
    pub intensity: f32,
}

impl GridProbe {
    /// Cell count of the sample lattice. Widened so file-supplied
    /// resolutions cannot overflow before the capacity check rejects them.
    pub fn sample_count(&self) -> u64 {
        let res = self.resolution.max(UVec3::ONE);
        u64::from(res.x) * u64::from(res.y) * u64::from(res.z)
    }
}

/// A reflection cubemap probe object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeProbe {
    pub position: Vec3,
    pub clip_near: f32,
    pub clip_far: f32,
    pub intensity: f32,
}

/// Planar probes are refreshed by the realtime path, never baked; the
/// gatherer classifies and skips them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarProbe {
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeShape {
    Grid(GridProbe),
    Cube(CubeProbe),
    Planar(PlanarProbe),
}

/// One render-visible object of the evaluated scene.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    /// `None` for objects that are not light probes.
    pub probe: Option<ProbeShape>,
}

/// Snapshot view of an evaluated scene graph.
///
/// `renderable_objects` must return the same objects in the same order
/// across repeated calls within one job; the gatherer's two passes rely on
/// that to keep record indices aligned with sample-space offsets.
pub trait SceneGraph: Send {
    /// Evaluates the graph at `frame` before any probes are read.
    fn evaluate(&mut self, frame: i64) -> Result<()>;

    /// All render-visible objects, in stable order.
    fn renderable_objects(&self) -> Vec<SceneObject>;

    /// The world background used for the implicit probe at slot 0.
    fn world(&self) -> WorldEnvironment;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_handles_extreme_resolutions() {
        let probe = GridProbe {
            transform: Mat4::IDENTITY,
            resolution: UVec3::splat(4096),
            visibility_range: 1.0,
            visibility_blur: 0.0,
            intensity: 1.0,
        };
        assert_eq!(probe.sample_count(), 1u64 << 36);
    }

    #[test]
    fn zero_resolution_axes_count_as_one() {
        let probe = GridProbe {
            transform: Mat4::IDENTITY,
            resolution: UVec3::new(0, 3, 0),
            visibility_range: 1.0,
            visibility_blur: 0.0,
            intensity: 1.0,
        };
        assert_eq!(probe.sample_count(), 3);
    }
}
