//! The rendering collaborator contract.
//!
//! The baker owns the sequencing (which sample, which atlas slot, which
//! bounce input) and delegates the actual GPU pipelines behind
//! [`ProbeRenderer`]. Every method is a synchronous pipeline invocation; a
//! failure is fatal to the whole job, there is no per-sample retry.

use anyhow::Result;
use glam::Vec3;
use lightcache::{LightCache, SampleSlot};

use crate::targets::{CubeRenderTarget, PreviousBounce};

/// Camera parameters for one probe capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeView {
    pub position: Vec3,
    pub clip_near: f32,
    pub clip_far: f32,
}

pub trait ProbeRenderer: Send {
    /// Toggles specular/reflection contributions from other probes in the
    /// renderer's shared uniform state. Disabled while capturing probe
    /// samples to avoid feedback loops.
    fn set_indirect_specular(&mut self, enabled: bool);

    /// Renders the world environment into the six faces of `target`.
    fn render_world(&mut self, target: &CubeRenderTarget) -> Result<()>;

    /// Renders the scene from `view` into the six faces of `target`.
    /// `previous_bounce` holds the irradiance of the prior bounce; `bounce`
    /// is 0 for direct light only.
    fn render_probe(
        &mut self,
        view: ProbeView,
        previous_bounce: &PreviousBounce,
        bounce: u32,
        target: &CubeRenderTarget,
    ) -> Result<()>;

    /// Glossy-reflection convolution of the captured cube into layer
    /// `layer` of the cache's reflection atlas, one roughness step per mip.
    fn filter_glossy(
        &mut self,
        target: &CubeRenderTarget,
        cache: &LightCache,
        layer: u32,
        intensity: f32,
    ) -> Result<()>;

    /// Diffuse-irradiance convolution into the atlas block of `slot`.
    fn filter_diffuse(
        &mut self,
        target: &CubeRenderTarget,
        cache: &LightCache,
        slot: SampleSlot,
        intensity: f32,
    ) -> Result<()>;

    /// Visibility/occlusion filter into the parallel visibility block of
    /// `slot`; only invoked on bounce 0.
    fn filter_visibility(
        &mut self,
        target: &CubeRenderTarget,
        cache: &LightCache,
        slot: SampleSlot,
        range: f32,
        blur: f32,
    ) -> Result<()>;
}
