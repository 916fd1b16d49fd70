//! Progressive, resumable light-probe baking.
//!
//! The pipeline precomputes indirect lighting for a scene - diffuse
//! irradiance grids and glossy reflection cubemaps - and accumulates the
//! results into a shared [`lightcache::LightCache`] that an interactive
//! viewport may read mid-bake.
//!
//! - [`scene`] and [`render`] define the collaborator contracts (scene
//!   graph snapshots, probe rendering and filtering).
//! - [`gather`] runs the two-pass probe scan that sizes the cache.
//! - [`plan`] precomputes the sample schedule; one discrete sample per
//!   step, cancellation polled at every boundary.
//! - [`job`] drives the schedule, wrapping each sample in an execution
//!   [`context`] scope so an interactive thread can interleave.
//! - [`flat`] ships a reference renderer for headless bakes and tests.

pub mod context;
mod error;
pub mod flat;
pub mod gather;
pub mod job;
pub mod plan;
pub mod render;
pub mod scene;
pub mod targets;

pub use context::{ContextScope, ExclusiveContext, ExecutionContext, SharedDeviceContext};
pub use error::BakeError;
pub use flat::FlatEnvironmentRenderer;
pub use gather::{count_probes, gather_probes, ProbeBatch, ProbeCounts};
pub use job::{quick_world_update, BakeEvent, BakeOutcome, BakeParams, BakeSignals, LightBake};
pub use plan::{SamplePlan, SampleStep};
pub use render::{ProbeRenderer, ProbeView};
pub use scene::{
    CubeProbe, GridProbe, PlanarProbe, ProbeShape, SceneGraph, SceneObject, WorldEnvironment,
};
pub use targets::{CubeRenderTarget, PreviousBounce};
