//! The bake schedule, precomputed as a flat list of sample steps.
//!
//! Walking world -> grid bounces -> reflection cubes one discrete sample per
//! step keeps cancellation polling and progress accounting trivial: `done`
//! advances by exactly one per completed step and the denominator is the
//! plan length, so `done / total` is always in [0, 1] and reaches 1 only on
//! full completion.
//!
//! World-inclusion rule: the world pass covers reflection layer 0 and the
//! bounce-0 irradiance of slot 0; every later bounce re-filters slot 0
//! against the new bounce input. With the world pass scheduled this sums to
//! `total_irradiance_samples * bounce_count + cube_count - 1` for any bounce
//! count >= 1, and one less when the world is already up to date.

use crate::gather::ProbeCounts;

/// One unit of GPU work; cancellation is polled between steps, never inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStep {
    /// Render the world environment, filter it into irradiance slot 0 and
    /// reflection layer 0.
    World,
    /// Re-filter the world irradiance slot against bounce `bounce`'s input.
    WorldIrradiance { bounce: u32 },
    /// One grid sample: `grid` indexes the gathered records (1-based, slot 0
    /// is the world), `sample` the grid-local visiting order.
    Grid { grid: u32, sample: u32, bounce: u32 },
    /// One reflection probe render + glossy filter.
    Cube { cube: u32 },
}

/// Immutable schedule for one bake job.
#[derive(Debug, Clone)]
pub struct SamplePlan {
    steps: Vec<SampleStep>,
    grid_steps: usize,
    cube_steps: usize,
}

impl SamplePlan {
    /// Builds the schedule. `grid_sample_counts` lists the per-grid sample
    /// counts in gather order, world slot included at index 0.
    pub fn new(
        counts: &ProbeCounts,
        grid_sample_counts: &[u32],
        bounce_count: u32,
        include_world: bool,
    ) -> Self {
        debug_assert_eq!(grid_sample_counts.len(), counts.grid_count as usize);
        let bounce_count = bounce_count.max(1);

        let mut steps = Vec::new();
        if include_world {
            steps.push(SampleStep::World);
        }

        let mut grid_steps = 0usize;
        for bounce in 0..bounce_count {
            if bounce > 0 {
                steps.push(SampleStep::WorldIrradiance { bounce });
                grid_steps += 1;
            }
            for (grid, &samples) in grid_sample_counts.iter().enumerate().skip(1) {
                for sample in 0..samples {
                    steps.push(SampleStep::Grid {
                        grid: grid as u32,
                        sample,
                        bounce,
                    });
                    grid_steps += 1;
                }
            }
        }

        let cube_steps = counts.cube_count.saturating_sub(1) as usize;
        for cube in 1..counts.cube_count {
            steps.push(SampleStep::Cube { cube });
        }

        Self {
            steps,
            grid_steps,
            cube_steps,
        }
    }

    /// Expected plan length, computed without building the step list.
    pub fn total(counts: &ProbeCounts, bounce_count: u32, include_world: bool) -> u64 {
        let bounce_count = u64::from(bounce_count.max(1));
        let samples = u64::from(counts.total_irradiance_samples);
        let cubes = u64::from(counts.cube_count);
        let total = samples * bounce_count + cubes - 1;
        if include_world {
            total
        } else {
            total - 1
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps belonging to the irradiance-grid channel.
    pub fn grid_steps(&self) -> usize {
        self.grid_steps
    }

    /// Steps belonging to the reflection-cube channel.
    pub fn cube_steps(&self) -> usize {
        self.cube_steps
    }

    pub fn iter(&self) -> impl Iterator<Item = SampleStep> + '_ {
        self.steps.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(grids: &[u32], cube_count: u32) -> (ProbeCounts, Vec<u32>) {
        let mut sample_counts = vec![1u32];
        sample_counts.extend_from_slice(grids);
        let counts = ProbeCounts {
            grid_count: sample_counts.len() as u32,
            cube_count,
            total_irradiance_samples: sample_counts.iter().sum(),
        };
        (counts, sample_counts)
    }

    #[test]
    fn scenario_4x4x4_two_bounces_three_cubes() {
        // One (4,4,4) grid, two bounces, world + two cubes.
        let (counts, samples) = counts(&[64], 3);
        assert_eq!(counts.total_irradiance_samples, 65);
        let plan = SamplePlan::new(&counts, &samples, 2, true);
        assert_eq!(plan.len() as u64, SamplePlan::total(&counts, 2, true));
        assert_eq!(plan.len(), 132);
    }

    #[test]
    fn total_matches_plan_length_across_configurations() {
        for grids in [&[][..], &[8][..], &[64, 27][..]] {
            for cube_count in [1u32, 2, 5] {
                for bounces in [1u32, 2, 4] {
                    for world in [true, false] {
                        let (counts, samples) = counts(grids, cube_count);
                        let plan = SamplePlan::new(&counts, &samples, bounces, world);
                        assert_eq!(
                            plan.len() as u64,
                            SamplePlan::total(&counts, bounces, world),
                            "grids={grids:?} cubes={cube_count} bounces={bounces} world={world}"
                        );
                        assert_eq!(plan.len(), plan.grid_steps() + plan.cube_steps()
                            + usize::from(world));
                    }
                }
            }
        }
    }

    #[test]
    fn world_precedes_grids_precede_cubes() {
        let (counts, samples) = counts(&[4], 2);
        let plan = SamplePlan::new(&counts, &samples, 2, true);
        let steps: Vec<_> = plan.iter().collect();
        assert_eq!(steps[0], SampleStep::World);
        let phase = |step: &SampleStep| match step {
            SampleStep::World => 0,
            SampleStep::WorldIrradiance { .. } | SampleStep::Grid { .. } => 1,
            SampleStep::Cube { .. } => 2,
        };
        let mut previous = 0;
        for step in &steps {
            let current = phase(step);
            assert!(current >= previous, "phase went backwards at {step:?}");
            previous = current;
        }
    }

    #[test]
    fn later_bounces_refilter_the_world_slot() {
        let (counts, samples) = counts(&[4], 1);
        let plan = SamplePlan::new(&counts, &samples, 3, true);
        let refilters: Vec<_> = plan
            .iter()
            .filter_map(|step| match step {
                SampleStep::WorldIrradiance { bounce } => Some(bounce),
                _ => None,
            })
            .collect();
        assert_eq!(refilters, vec![1, 2]);
    }

    #[test]
    fn bounces_walk_each_grid_in_visiting_order() {
        let (counts, samples) = counts(&[3, 2], 1);
        let plan = SamplePlan::new(&counts, &samples, 2, false);
        let grid_samples: Vec<_> = plan
            .iter()
            .filter_map(|step| match step {
                SampleStep::Grid {
                    grid,
                    sample,
                    bounce,
                } => Some((bounce, grid, sample)),
                _ => None,
            })
            .collect();
        let mut expected = Vec::new();
        for bounce in 0..2u32 {
            for (grid, count) in [(1u32, 3u32), (2, 2)] {
                for sample in 0..count {
                    expected.push((bounce, grid, sample));
                }
            }
        }
        assert_eq!(grid_samples, expected);
    }
}
