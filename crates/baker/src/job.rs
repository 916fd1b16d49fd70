//! The bake job: allocation, the blocking sample loop, and the quick
//! world-only refresh path.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use lightcache::{
    irradiance_pool_size, max_irradiance_samples, sample_slot, CacheFlags, CacheShape, CacheSlot,
    CellOrder, LightCache,
};
use tracing::{debug, info};

use crate::context::{ContextScope, ExecutionContext};
use crate::error::BakeError;
use crate::gather::{count_probes, gather_probes, ProbeCounts, GRID_CLIP_FAR, GRID_CLIP_NEAR};
use crate::plan::{SamplePlan, SampleStep};
use crate::render::{ProbeRenderer, ProbeView};
use crate::scene::SceneGraph;
use crate::targets::{CubeRenderTarget, PreviousBounce};

/// Knobs of one bake job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BakeParams {
    /// Frame the scene graph is evaluated at.
    pub frame: i64,
    /// Indirect light bounces; bounce N reads bounce N-1's irradiance.
    pub bounce_count: u32,
    /// Edge length of the cube capture target and the reflection atlas.
    pub cube_resolution: u32,
    /// Side length of one visibility block in the irradiance pool.
    pub visibility_size: u32,
}

impl Default for BakeParams {
    fn default() -> Self {
        Self {
            frame: 0,
            bounce_count: 1,
            cube_resolution: 128,
            visibility_size: 16,
        }
    }
}

/// Terminal state of a job that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeOutcome {
    Completed,
    /// Stop was requested; completed samples stay committed, ready flags
    /// reflect only fully finished channels.
    Cancelled,
}

/// Progress notification, one per completed sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeEvent {
    Sample { done: u64, total: u64 },
}

/// Shared control surface between the worker and its coordinator.
///
/// `stop` is advisory and polled once per sample boundary; `update` flips
/// after every completed sample so a display can redraw lazily; `progress`
/// is a monotone fraction in [0, 1] stored as f32 bits.
#[derive(Clone, Default)]
pub struct BakeSignals {
    stop: Arc<AtomicBool>,
    update: Arc<AtomicBool>,
    progress: Arc<AtomicU32>,
    events: Option<Sender<BakeEvent>>,
}

impl BakeSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a channel receiving one [`BakeEvent`] per sample.
    pub fn with_events(mut self, sender: Sender<BakeEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Swaps the update flag back to false, returning whether it was set.
    pub fn take_update(&self) -> bool {
        self.update.swap(false, Ordering::AcqRel)
    }

    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Acquire))
    }

    fn publish(&self, done: u64, total: u64) {
        let fraction = if total == 0 {
            1.0
        } else {
            done as f32 / total as f32
        };
        self.progress.store(fraction.to_bits(), Ordering::Release);
        self.update.store(true, Ordering::Release);
        if let Some(events) = &self.events {
            let _ = events.send(BakeEvent::Sample { done, total });
        }
    }
}

/// One progressive bake job.
///
/// Construction must happen on the coordinating thread: it evaluates the
/// scene and sizes resources synchronously. [`run`](Self::run) is the
/// blocking worker entry point and may execute on a background thread; all
/// GPU work inside it is wrapped in execution-context scopes. Job-owned
/// resources are released when the value drops, success or failure.
pub struct LightBake {
    scene: Box<dyn SceneGraph>,
    renderer: Box<dyn ProbeRenderer>,
    context: Arc<dyn ExecutionContext>,
    slot: Arc<CacheSlot>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    params: BakeParams,
    counts: ProbeCounts,
}

impl LightBake {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut scene: Box<dyn SceneGraph>,
        renderer: Box<dyn ProbeRenderer>,
        context: Arc<dyn ExecutionContext>,
        slot: Arc<CacheSlot>,
        device: wgpu::Device,
        queue: wgpu::Queue,
        params: BakeParams,
    ) -> Result<Self, BakeError> {
        scene.evaluate(params.frame).map_err(BakeError::Scene)?;
        let counts = count_probes(&scene.renderable_objects());
        if counts.total_irradiance_samples > max_irradiance_samples() {
            return Err(BakeError::CapacityExceeded {
                samples: counts.total_irradiance_samples,
                max: max_irradiance_samples(),
            });
        }
        debug!(
            grids = counts.grid_count,
            cubes = counts.cube_count,
            samples = counts.total_irradiance_samples,
            "allocated bake job"
        );
        Ok(Self {
            scene,
            renderer,
            context,
            slot,
            device,
            queue,
            params,
            counts,
        })
    }

    /// Probe totals from the allocation-time count pass.
    pub fn counts(&self) -> ProbeCounts {
        self.counts
    }

    /// Runs the job to completion or cancellation. Blocking; call from the
    /// worker thread the job was allocated for.
    pub fn run(&mut self, signals: &BakeSignals) -> Result<BakeOutcome, BakeError> {
        let result = self.run_inner(signals);
        // Restore shared renderer state and drop the baking mark on every
        // exit path; the cache keeps its last consistent contents.
        self.renderer.set_indirect_specular(true);
        if let Some(cache) = self.slot.snapshot() {
            cache.flags().remove(CacheFlags::BAKING);
        }
        result
    }

    fn run_inner(&mut self, signals: &BakeSignals) -> Result<BakeOutcome, BakeError> {
        self.scene
            .evaluate(self.params.frame)
            .map_err(BakeError::Scene)?;
        let objects = self.scene.renderable_objects();
        let world = self.scene.world();
        let batch = gather_probes(&objects, &world);
        let counts = batch.counts;
        if counts.total_irradiance_samples > max_irradiance_samples() {
            return Err(BakeError::CapacityExceeded {
                samples: counts.total_irradiance_samples,
                max: max_irradiance_samples(),
            });
        }

        let pool = irradiance_pool_size(
            self.params.visibility_size,
            counts.total_irradiance_samples,
        );
        let shape = CacheShape {
            grid_count: counts.grid_count,
            cube_count: counts.cube_count,
            cube_resolution: self.params.cube_resolution,
            irradiance_size: pool,
            visibility_size: self.params.visibility_size,
        };

        let (cache, target, previous) = {
            let _scope = ContextScope::enter(self.context.as_ref());
            let cache = self.slot.validate_or_create(&self.device, shape)?;
            let target = CubeRenderTarget::new(&self.device, self.params.cube_resolution)?;
            let previous = PreviousBounce::new(&self.device, pool)?;
            (cache, target, previous)
        };
        cache.set_grid_records(batch.grid_records.clone());
        cache.set_cube_records(batch.cube_records.clone());
        cache.flags().insert(CacheFlags::BAKING);

        let orders: Vec<CellOrder> = batch
            .grid_records
            .iter()
            .map(|record| CellOrder::new(record.resolution))
            .collect();
        let sample_counts: Vec<u32> = batch
            .grid_records
            .iter()
            .map(|record| record.sample_count())
            .collect();

        let include_world = cache.flags().contains(CacheFlags::NEEDS_WORLD_UPDATE);
        let plan = SamplePlan::new(
            &counts,
            &sample_counts,
            self.params.bounce_count,
            include_world,
        );
        let total = plan.len() as u64;
        let mut done = 0u64;
        let mut grid_remaining = plan.grid_steps();
        let mut cube_remaining = plan.cube_steps();
        let mut current_bounce = 0u32;
        let mut cubes_started = false;
        info!(total, include_world, "starting bake");
        signals.publish(done, total);

        self.renderer.set_indirect_specular(false);

        for step in plan.iter() {
            if signals.stop_requested() {
                info!(done, total, "bake cancelled");
                return Ok(BakeOutcome::Cancelled);
            }

            let _scope = ContextScope::enter(self.context.as_ref());

            // Snapshot the atlas at bounce transitions and before the cube
            // phase, so reads never observe a half-written bounce.
            let step_bounce = match step {
                SampleStep::WorldIrradiance { bounce } => Some(bounce),
                SampleStep::Grid { bounce, .. } => Some(bounce),
                _ => None,
            };
            if let Some(bounce) = step_bounce {
                if bounce > current_bounce {
                    previous.capture(&self.device, &self.queue, &cache)?;
                    current_bounce = bounce;
                }
            }

            match step {
                SampleStep::World => {
                    self.renderer
                        .render_world(&target)
                        .map_err(BakeError::Render)?;
                    self.renderer
                        .filter_glossy(&target, &cache, 0, world.intensity)
                        .map_err(BakeError::Render)?;
                    let slot = sample_slot(pool, shape.visibility_size, 0);
                    self.renderer
                        .filter_diffuse(&target, &cache, slot, world.intensity)
                        .map_err(BakeError::Render)?;
                    cache.flags().remove(CacheFlags::NEEDS_WORLD_UPDATE);
                }
                SampleStep::WorldIrradiance { bounce } => {
                    self.renderer
                        .render_world(&target)
                        .map_err(BakeError::Render)?;
                    let slot = sample_slot(pool, shape.visibility_size, 0);
                    self.renderer
                        .filter_diffuse(&target, &cache, slot, world.intensity)
                        .map_err(BakeError::Render)?;
                    debug!(bounce, "re-filtered world irradiance slot");
                    grid_remaining -= 1;
                }
                SampleStep::Grid {
                    grid,
                    sample,
                    bounce,
                } => {
                    let record = batch.grid_records[grid as usize];
                    let cell = orders[grid as usize]
                        .get(sample as usize)
                        .ok_or(BakeError::InvariantViolation { grid, sample })?;
                    let view = ProbeView {
                        position: record.cell_position(cell.cell),
                        clip_near: GRID_CLIP_NEAR,
                        clip_far: GRID_CLIP_FAR,
                    };
                    self.renderer
                        .render_probe(view, &previous, bounce, &target)
                        .map_err(BakeError::Render)?;
                    let slot =
                        sample_slot(pool, shape.visibility_size, record.offset + cell.linear);
                    self.renderer
                        .filter_diffuse(&target, &cache, slot, record.intensity)
                        .map_err(BakeError::Render)?;
                    if bounce == 0 {
                        self.renderer
                            .filter_visibility(
                                &target,
                                &cache,
                                slot,
                                record.visibility_range,
                                record.visibility_blur,
                            )
                            .map_err(BakeError::Render)?;
                    }
                    cache.set_grid_level_bias(grid as usize, cell.stride as f32);
                    grid_remaining -= 1;
                }
                SampleStep::Cube { cube } => {
                    if !cubes_started {
                        previous.capture(&self.device, &self.queue, &cache)?;
                        cubes_started = true;
                    }
                    let record = batch.cube_records[cube as usize];
                    let view = ProbeView {
                        position: record.position,
                        clip_near: record.clip_near,
                        clip_far: record.clip_far,
                    };
                    self.renderer
                        .render_probe(view, &previous, self.params.bounce_count, &target)
                        .map_err(BakeError::Render)?;
                    self.renderer
                        .filter_glossy(&target, &cache, cube, record.intensity)
                        .map_err(BakeError::Render)?;
                    cube_remaining -= 1;
                }
            }

            drop(_scope);
            done += 1;

            if grid_remaining == 0 && !cache.flags().contains(CacheFlags::GRID_READY) {
                cache.flags().insert(CacheFlags::GRID_READY);
                cache.flags().remove(CacheFlags::NEEDS_GRID_UPDATE);
                debug!(done, "irradiance grids complete");
            }
            if cube_remaining == 0 && !cache.flags().contains(CacheFlags::CUBE_READY) {
                cache.flags().insert(CacheFlags::CUBE_READY);
                cache.flags().remove(CacheFlags::NEEDS_CUBE_UPDATE);
                debug!(done, "reflection cubes complete");
            }
            signals.publish(done, total);
        }

        // Degenerate plans (nothing scheduled) still complete their channels.
        if grid_remaining == 0 {
            cache.flags().insert(CacheFlags::GRID_READY);
            cache.flags().remove(CacheFlags::NEEDS_GRID_UPDATE);
        }
        if cube_remaining == 0 {
            cache.flags().insert(CacheFlags::CUBE_READY);
            cache.flags().remove(CacheFlags::NEEDS_CUBE_UPDATE);
        }
        cache.flags().insert(CacheFlags::BAKED);
        info!(done, total, "bake complete");
        Ok(BakeOutcome::Completed)
    }
}

/// Lightweight synchronous refresh of the world channel only, for
/// interactive use; no scheduler, no bounces, no cube probes.
pub fn quick_world_update(
    device: &wgpu::Device,
    context: &dyn ExecutionContext,
    renderer: &mut dyn ProbeRenderer,
    scene: &dyn SceneGraph,
    slot: &CacheSlot,
    params: &BakeParams,
) -> Result<(), BakeError> {
    let world = scene.world();
    let _scope = ContextScope::enter(context);

    let cache: Arc<LightCache> = match slot.snapshot() {
        Some(cache) => cache,
        None => {
            // No bake ran yet; a world-only cache is enough for a preview.
            let batch = gather_probes(&[], &world);
            let pool = irradiance_pool_size(params.visibility_size, 1);
            let cache = Arc::new(LightCache::create(
                device,
                CacheShape {
                    grid_count: batch.counts.grid_count,
                    cube_count: batch.counts.cube_count,
                    cube_resolution: params.cube_resolution,
                    irradiance_size: pool,
                    visibility_size: params.visibility_size,
                },
            )?);
            cache.set_grid_records(batch.grid_records);
            cache.set_cube_records(batch.cube_records);
            slot.install(cache.clone());
            cache
        }
    };

    let target = CubeRenderTarget::new(device, cache.shape().cube_resolution)?;
    renderer.set_indirect_specular(false);
    let result = (|| {
        renderer.render_world(&target).map_err(BakeError::Render)?;
        renderer
            .filter_glossy(&target, &cache, 0, world.intensity)
            .map_err(BakeError::Render)?;
        let slot = sample_slot(
            cache.shape().irradiance_size,
            cache.shape().visibility_size,
            0,
        );
        renderer
            .filter_diffuse(&target, &cache, slot, world.intensity)
            .map_err(BakeError::Render)
    })();
    renderer.set_indirect_specular(true);
    result?;

    cache.flags().remove(CacheFlags::NEEDS_WORLD_UPDATE);
    debug!("world channel refreshed");
    Ok(())
}
