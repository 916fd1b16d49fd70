//! Two-pass probe gathering.
//!
//! `count_probes` runs before any resource exists because the irradiance
//! pool is sized from the total sample count; `gather_probes` then fills the
//! metadata records. Both passes iterate the same object list in the same
//! order, so the offsets assigned here index the shared sample space
//! directly. Slot 0 of each array is the implicit world probe.

use glam::{UVec3, Vec3};
use lightcache::{CubeRecord, GridRecord};

use crate::scene::{GridProbe, ProbeShape, SceneObject, WorldEnvironment};

/// Clip distances used when rendering grid samples; grid probes carry no
/// clip settings of their own.
pub const GRID_CLIP_NEAR: f32 = 0.01;
pub const GRID_CLIP_FAR: f32 = 1000.0;

/// Probe totals for one scene snapshot, world included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeCounts {
    pub grid_count: u32,
    pub cube_count: u32,
    /// Sum of all grid sample counts, plus one for the world.
    pub total_irradiance_samples: u32,
}

/// First pass: classify and count. Planar and unknown probes are skipped
/// silently; they are not an error.
///
/// The sample total is accumulated in u64 and saturated into the u32 field,
/// so absurd grid resolutions surface as a failed capacity check instead of
/// wrapping past it.
pub fn count_probes(objects: &[SceneObject]) -> ProbeCounts {
    let mut grid_count = 1u32;
    let mut cube_count = 1u32;
    let mut total = 1u64;
    for object in objects {
        match &object.probe {
            Some(ProbeShape::Grid(grid)) => {
                grid_count += 1;
                total += grid.sample_count();
            }
            Some(ProbeShape::Cube(_)) => cube_count += 1,
            Some(ProbeShape::Planar(_)) | None => {}
        }
    }
    ProbeCounts {
        grid_count,
        cube_count,
        total_irradiance_samples: total.min(u64::from(u32::MAX)) as u32,
    }
}

/// Metadata records plus parallel name arrays, in gather order.
#[derive(Debug, Clone)]
pub struct ProbeBatch {
    pub counts: ProbeCounts,
    pub grid_records: Vec<GridRecord>,
    pub cube_records: Vec<CubeRecord>,
    pub grid_names: Vec<String>,
    pub cube_names: Vec<String>,
}

/// Second pass: populate records. Iteration order must match
/// [`count_probes`]; indices assigned here are later used as direct offsets
/// into sample space.
pub fn gather_probes(objects: &[SceneObject], world: &WorldEnvironment) -> ProbeBatch {
    let mut grid_records = vec![world_grid_record(world)];
    let mut cube_records = vec![world_cube_record(world)];
    let mut grid_names = vec![String::from("world")];
    let mut cube_names = vec![String::from("world")];

    let mut sample_offset = 1u64;
    for object in objects {
        match &object.probe {
            Some(ProbeShape::Grid(grid)) => {
                let offset = sample_offset.min(u64::from(u32::MAX)) as u32;
                grid_records.push(grid_record_from_probe(grid, offset));
                grid_names.push(object.name.clone());
                sample_offset += grid.sample_count();
            }
            Some(ProbeShape::Cube(cube)) => {
                cube_records.push(CubeRecord {
                    position: cube.position,
                    clip_near: cube.clip_near,
                    clip_far: cube.clip_far,
                    intensity: cube.intensity,
                });
                cube_names.push(object.name.clone());
            }
            Some(ProbeShape::Planar(_)) | None => {}
        }
    }

    let counts = ProbeCounts {
        grid_count: grid_records.len() as u32,
        cube_count: cube_records.len() as u32,
        total_irradiance_samples: sample_offset.min(u64::from(u32::MAX)) as u32,
    };
    tracing::debug!(
        grids = counts.grid_count,
        cubes = counts.cube_count,
        samples = counts.total_irradiance_samples,
        "gathered probes"
    );

    ProbeBatch {
        counts,
        grid_records,
        cube_records,
        grid_names,
        cube_names,
    }
}

/// Derives the sample lattice from the probe's object transform: the local
/// unit cube is split into `resolution` cells, the corner record points at
/// the centre of the first cell and each increment spans one cell.
fn grid_record_from_probe(probe: &GridProbe, offset: u32) -> GridRecord {
    let res = probe.resolution.max(UVec3::ONE);
    let cell = 2.0 / res.as_vec3();
    let local_corner = Vec3::splat(-1.0) + cell * 0.5;

    GridRecord {
        resolution: res,
        corner: probe.transform.transform_point3(local_corner),
        increment: [
            probe.transform.transform_vector3(Vec3::new(cell.x, 0.0, 0.0)),
            probe.transform.transform_vector3(Vec3::new(0.0, cell.y, 0.0)),
            probe.transform.transform_vector3(Vec3::new(0.0, 0.0, cell.z)),
        ],
        offset,
        visibility_range: probe.visibility_range,
        visibility_blur: probe.visibility_blur,
        intensity: probe.intensity,
        level_bias: 1.0,
    }
}

/// The world occupies sample 0: a single-cell grid at the origin.
fn world_grid_record(world: &WorldEnvironment) -> GridRecord {
    GridRecord {
        resolution: UVec3::ONE,
        corner: Vec3::ZERO,
        increment: [Vec3::ZERO; 3],
        offset: 0,
        visibility_range: 0.0,
        visibility_blur: 0.0,
        intensity: world.intensity,
        level_bias: 1.0,
    }
}

fn world_cube_record(world: &WorldEnvironment) -> CubeRecord {
    CubeRecord {
        position: Vec3::ZERO,
        clip_near: GRID_CLIP_NEAR,
        clip_far: GRID_CLIP_FAR,
        intensity: world.intensity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{CubeProbe, PlanarProbe};
    use glam::Mat4;

    fn sample_scene() -> Vec<SceneObject> {
        vec![
            SceneObject {
                name: "suzanne".into(),
                probe: None,
            },
            SceneObject {
                name: "grid-a".into(),
                probe: Some(ProbeShape::Grid(GridProbe {
                    transform: Mat4::from_scale(Vec3::splat(4.0)),
                    resolution: UVec3::new(4, 4, 4),
                    visibility_range: 1.0,
                    visibility_blur: 0.2,
                    intensity: 1.0,
                })),
            },
            SceneObject {
                name: "mirror".into(),
                probe: Some(ProbeShape::Planar(PlanarProbe {
                    position: Vec3::ZERO,
                })),
            },
            SceneObject {
                name: "cube-a".into(),
                probe: Some(ProbeShape::Cube(CubeProbe {
                    position: Vec3::new(0.0, 2.0, 0.0),
                    clip_near: 0.1,
                    clip_far: 50.0,
                    intensity: 1.0,
                })),
            },
            SceneObject {
                name: "cube-b".into(),
                probe: Some(ProbeShape::Cube(CubeProbe {
                    position: Vec3::new(3.0, 1.0, 0.0),
                    clip_near: 0.2,
                    clip_far: 25.0,
                    intensity: 0.5,
                })),
            },
        ]
    }

    #[test]
    fn counting_includes_the_world_and_skips_planars() {
        let counts = count_probes(&sample_scene());
        assert_eq!(counts.grid_count, 2);
        assert_eq!(counts.cube_count, 3);
        assert_eq!(counts.total_irradiance_samples, 65);
    }

    #[test]
    fn gather_matches_count_and_is_deterministic() {
        let scene = sample_scene();
        let world = WorldEnvironment::default();
        let counts = count_probes(&scene);
        let first = gather_probes(&scene, &world);
        let second = gather_probes(&scene, &world);

        assert_eq!(first.counts, counts);
        assert_eq!(first.grid_records, second.grid_records);
        assert_eq!(first.cube_records, second.cube_records);
        assert_eq!(first.grid_names, second.grid_names);
        assert_eq!(first.cube_names, vec!["world", "cube-a", "cube-b"]);
    }

    #[test]
    fn offsets_tile_the_sample_space() {
        let batch = gather_probes(&sample_scene(), &WorldEnvironment::default());
        assert_eq!(batch.grid_records[0].offset, 0);
        assert_eq!(batch.grid_records[1].offset, 1);
        assert_eq!(
            batch.grid_records[1].offset + batch.grid_records[1].sample_count(),
            batch.counts.total_irradiance_samples
        );
    }

    #[test]
    fn oversized_grids_saturate_past_the_capacity_limit() {
        let scene = vec![SceneObject {
            name: "absurd".into(),
            probe: Some(ProbeShape::Grid(GridProbe {
                transform: Mat4::IDENTITY,
                resolution: UVec3::splat(4096),
                visibility_range: 1.0,
                visibility_blur: 0.0,
                intensity: 1.0,
            })),
        }];
        // 4096^3 cells must not wrap to a tiny total; the count has to stay
        // above the pool capacity so allocation refuses the scene.
        let counts = count_probes(&scene);
        assert_eq!(counts.total_irradiance_samples, u32::MAX);
        assert!(counts.total_irradiance_samples > lightcache::max_irradiance_samples());

        let batch = gather_probes(&scene, &WorldEnvironment::default());
        assert_eq!(batch.counts.total_irradiance_samples, u32::MAX);
    }

    #[test]
    fn grid_record_lattice_spans_the_local_unit_cube() {
        let probe = GridProbe {
            transform: Mat4::from_scale(Vec3::splat(2.0)),
            resolution: UVec3::new(2, 2, 2),
            visibility_range: 1.0,
            visibility_blur: 0.0,
            intensity: 1.0,
        };
        let record = grid_record_from_probe(&probe, 1);
        // Cell centres of a 2x2x2 grid in a [-2, 2] box sit at +-1.
        assert_eq!(record.corner, Vec3::splat(-1.0));
        assert_eq!(record.increment[0], Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(
            record.cell_position(UVec3::new(1, 1, 1)),
            Vec3::splat(1.0)
        );
    }
}
