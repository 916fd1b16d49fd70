//! TOML scene descriptions for headless bakes.
//!
//! A scene file lists a world environment and a flat sequence of probes.
//! Probe order in the file is the capture order, so repeated runs of the
//! same file schedule identical bakes.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use baker::{
    CubeProbe, GridProbe, PlanarProbe, ProbeShape, SceneGraph, SceneObject, WorldEnvironment,
};
use glam::{Mat4, Quat, UVec3, Vec3};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneFile {
    #[serde(default)]
    pub world: WorldSection,
    #[serde(default, rename = "probes")]
    pub probes: Vec<ProbeSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldSection {
    #[serde(default = "default_world_color")]
    pub color: [f32; 3],
    #[serde(default = "default_one")]
    pub intensity: f32,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            color: default_world_color(),
            intensity: default_one(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ProbeSection {
    /// Irradiance grid spanning an axis-aligned box.
    Grid {
        name: String,
        #[serde(default)]
        translation: [f32; 3],
        #[serde(default = "default_scale")]
        scale: [f32; 3],
        resolution: [u32; 3],
        #[serde(default = "default_one")]
        visibility_range: f32,
        #[serde(default = "default_visibility_blur")]
        visibility_blur: f32,
        #[serde(default = "default_one")]
        intensity: f32,
    },
    /// Reflection cubemap captured from one point.
    Cube {
        name: String,
        position: [f32; 3],
        #[serde(default = "default_clip_near")]
        clip_near: f32,
        #[serde(default = "default_clip_far")]
        clip_far: f32,
        #[serde(default = "default_one")]
        intensity: f32,
    },
    /// Accepted for completeness; planar captures happen per view, not
    /// during a bake, so these contribute nothing here.
    Planar {
        name: String,
        #[serde(default)]
        position: [f32; 3],
    },
}

fn default_world_color() -> [f32; 3] {
    [0.05, 0.05, 0.05]
}

fn default_one() -> f32 {
    1.0
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_visibility_blur() -> f32 {
    0.2
}

fn default_clip_near() -> f32 {
    0.1
}

fn default_clip_far() -> f32 {
    100.0
}

impl SceneFile {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid scene file")
    }
}

/// A fully static scene backed by a parsed file.
pub struct FileScene {
    world: WorldEnvironment,
    objects: Vec<SceneObject>,
}

impl FileScene {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scene file {}", path.display()))?;
        let file = SceneFile::parse(&text)?;
        Ok(Self::from_file(file))
    }

    pub fn from_file(file: SceneFile) -> Self {
        let world = WorldEnvironment {
            color: Vec3::from_array(file.world.color),
            intensity: file.world.intensity,
        };
        let objects = file.probes.into_iter().map(object_from_section).collect();
        Self { world, objects }
    }
}

fn object_from_section(section: ProbeSection) -> SceneObject {
    match section {
        ProbeSection::Grid {
            name,
            translation,
            scale,
            resolution,
            visibility_range,
            visibility_blur,
            intensity,
        } => SceneObject {
            name,
            probe: Some(ProbeShape::Grid(GridProbe {
                transform: Mat4::from_scale_rotation_translation(
                    Vec3::from_array(scale),
                    Quat::IDENTITY,
                    Vec3::from_array(translation),
                ),
                resolution: UVec3::from_array(resolution),
                visibility_range,
                visibility_blur,
                intensity,
            })),
        },
        ProbeSection::Cube {
            name,
            position,
            clip_near,
            clip_far,
            intensity,
        } => SceneObject {
            name,
            probe: Some(ProbeShape::Cube(CubeProbe {
                position: Vec3::from_array(position),
                clip_near,
                clip_far,
                intensity,
            })),
        },
        ProbeSection::Planar { name, position } => SceneObject {
            name,
            probe: Some(ProbeShape::Planar(PlanarProbe {
                position: Vec3::from_array(position),
            })),
        },
    }
}

impl SceneGraph for FileScene {
    fn evaluate(&mut self, _frame: i64) -> Result<()> {
        // File scenes carry no animation.
        Ok(())
    }

    fn renderable_objects(&self) -> Vec<SceneObject> {
        self.objects.clone()
    }

    fn world(&self) -> WorldEnvironment {
        self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baker::count_probes;

    const SAMPLE: &str = r#"
[world]
color = [0.2, 0.4, 0.6]

[[probes]]
kind = "grid"
name = "room"
translation = [0.0, 2.0, 0.0]
scale = [4.0, 2.0, 4.0]
resolution = [4, 2, 4]

[[probes]]
kind = "cube"
name = "mirror"
position = [1.0, 1.0, 0.0]

[[probes]]
kind = "planar"
name = "floor"
"#;

    #[test]
    fn parses_probes_in_file_order() {
        let scene = FileScene::from_file(SceneFile::parse(SAMPLE).expect("parse"));
        let objects = scene.renderable_objects();
        assert_eq!(objects.len(), 3);
        assert_eq!(objects[0].name, "room");
        assert_eq!(objects[1].name, "mirror");
        assert_eq!(objects[2].name, "floor");

        // World + one 4x2x4 grid and world + one cube; the planar probe
        // contributes no samples.
        let counts = count_probes(&objects);
        assert_eq!(counts.grid_count, 2);
        assert_eq!(counts.cube_count, 2);
        assert_eq!(counts.total_irradiance_samples, 1 + 32);
    }

    #[test]
    fn grid_defaults_apply() {
        let scene = FileScene::from_file(SceneFile::parse(SAMPLE).expect("parse"));
        let objects = scene.renderable_objects();
        let Some(ProbeShape::Grid(grid)) = &objects[0].probe else {
            panic!("expected grid probe");
        };
        assert_eq!(grid.visibility_range, 1.0);
        assert_eq!(grid.visibility_blur, 0.2);
        assert_eq!(grid.intensity, 1.0);
        let Some(ProbeShape::Cube(cube)) = &objects[1].probe else {
            panic!("expected cube probe");
        };
        assert_eq!(cube.clip_near, 0.1);
        assert_eq!(cube.clip_far, 100.0);
    }

    #[test]
    fn world_defaults_to_dim_grey() {
        let scene = FileScene::from_file(SceneFile::parse("").expect("parse"));
        assert_eq!(scene.world().color, Vec3::splat(0.05));
        assert_eq!(scene.world().intensity, 1.0);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("scene.toml");
        std::fs::write(&path, SAMPLE).expect("write scene");
        let scene = FileScene::load(&path).expect("load");
        assert_eq!(scene.renderable_objects().len(), 3);
    }

    #[test]
    fn unknown_probe_kind_is_rejected() {
        let bad = "[[probes]]\nkind = \"spot\"\nname = \"nope\"\n";
        assert!(SceneFile::parse(bad).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let bad = "[world]\ncolour = [1.0, 1.0, 1.0]\n";
        assert!(SceneFile::parse(bad).is_err());
    }
}
