use glam::Vec3;
use rand::Rng;

use crate::mesh::{uv_sphere, MeshData};
use crate::scene::Star;

/// Number of stars composed into the scene.
pub const STAR_COUNT: usize = 400;
/// Radius of the shared star sphere mesh.
pub const STAR_RADIUS: f32 = 0.2;
/// Latitude/longitude segment count of the shared star sphere mesh.
pub const STAR_SEGMENTS: u32 = 24;
/// Per-axis position spread: components are sampled from
/// `[-POSITION_SPREAD / 2, POSITION_SPREAD / 2]`.
pub const POSITION_SPREAD: f32 = 100.0;

/// Uniform sample from `[-spread / 2, spread / 2]`.
///
/// The distribution is uniform, not Gaussian; "spread" is the full width of
/// the sampling interval.
pub fn rand_float_spread<R: Rng + ?Sized>(rng: &mut R, spread: f32) -> f32 {
    spread * (rng.random::<f32>() - 0.5)
}

/// Generates the full star field with positions drawn from the given source.
pub fn generate_stars<R: Rng + ?Sized>(rng: &mut R) -> Vec<Star> {
    (0..STAR_COUNT)
        .map(|_| Star {
            position: Vec3::new(
                rand_float_spread(rng, POSITION_SPREAD),
                rand_float_spread(rng, POSITION_SPREAD),
                rand_float_spread(rng, POSITION_SPREAD),
            ),
        })
        .collect()
}

/// The sphere mesh shared by every star (and the core marker).
pub fn star_mesh() -> MeshData {
    uv_sphere(STAR_RADIUS, STAR_SEGMENTS, STAR_SEGMENTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generates_exactly_four_hundred_stars() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(generate_stars(&mut rng).len(), STAR_COUNT);
    }

    #[test]
    fn positions_stay_within_the_spread_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let half = POSITION_SPREAD / 2.0;
        for star in generate_stars(&mut rng) {
            for component in star.position.to_array() {
                assert!(component >= -half && component <= half, "{component}");
            }
        }
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = generate_stars(&mut StdRng::seed_from_u64(9));
        let b = generate_stars(&mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn shared_sphere_stays_at_the_star_radius() {
        // Stars and the core marker both draw this mesh; it must not be
        // resized for either use.
        let mesh = star_mesh();
        for index in 0..mesh.vertex_count() {
            let distance = mesh.position(index).length();
            assert!((distance - STAR_RADIUS).abs() < 1e-4, "{distance}");
        }
    }

    #[test]
    fn stars_do_not_collapse_onto_one_point() {
        let stars = generate_stars(&mut StdRng::seed_from_u64(1));
        let first = stars[0].position;
        assert!(stars.iter().any(|star| star.position != first));
    }
}
