//! Random sampling helpers shared by materials, lights and integrators.
//!
//! Every parallel task owns its own generator (see [`task_rng`]); nothing in
//! the renderer touches a global RNG.

use lumen_math::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use std::f32::consts::PI;

/// Uniform float in [0, 1).
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}

/// Generator for one rayon task (an image row, a photon index).
///
/// Seeds are spread with a 64-bit odd constant so neighbouring tasks do not
/// start from correlated states.
pub fn task_rng(seed: u64, index: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ index)
}

/// Rejection-sampled point strictly inside the unit sphere.
pub fn random_in_unit_sphere(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let p = Vec3::new(
            gen_f32(rng) * 2.0 - 1.0,
            gen_f32(rng) * 2.0 - 1.0,
            gen_f32(rng) * 2.0 - 1.0,
        );
        if p.length_squared() < 1.0 {
            return p;
        }
    }
}

/// Uniformly distributed direction on the unit sphere.
pub fn random_unit_vector(rng: &mut dyn RngCore) -> Vec3 {
    loop {
        let p = random_in_unit_sphere(rng);
        let len_sq = p.length_squared();
        if len_sq > 1e-6 {
            return p / len_sq.sqrt();
        }
    }
}

/// Orthonormal tangent pair `(u, v)` for a unit vector `w`.
pub fn tangent_frame(w: Vec3) -> (Vec3, Vec3) {
    let helper = if w.x.abs() > 0.1 { Vec3::Y } else { Vec3::X };
    let u = helper.cross(w).normalize();
    let v = w.cross(u);
    (u, v)
}

/// Cosine-weighted direction in the hemisphere around unit vector `normal`.
///
/// The pdf is `cos(theta) / PI`.
pub fn cosine_hemisphere(normal: Vec3, rng: &mut dyn RngCore) -> Vec3 {
    let r1 = 2.0 * PI * gen_f32(rng);
    let r2 = gen_f32(rng);
    let r2s = r2.sqrt();

    let (u, v) = tangent_frame(normal);
    (u * r1.cos() * r2s + v * r1.sin() * r2s + normal * (1.0 - r2).sqrt()).normalize()
}

/// Uniform point on a triangle, returned with its barycentric `(u, v)`.
pub fn uniform_triangle(v0: Vec3, v1: Vec3, v2: Vec3, rng: &mut dyn RngCore) -> (Vec3, f32, f32) {
    let su = gen_f32(rng).sqrt();
    let b1 = su * (1.0 - gen_f32(rng));
    let b2 = 1.0 - su;
    // b1 weights v1, b2 weights v2
    let b0 = 1.0 - b1 - b2;
    (v0 * b0 + v1 * b1 + v2 * b2, b1, b2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn test_unit_sphere_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            assert!(random_in_unit_sphere(&mut rng).length_squared() < 1.0);
            assert!((random_unit_vector(&mut rng).length() - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_cosine_hemisphere_stays_above_surface() {
        let mut rng = StdRng::seed_from_u64(11);
        let normal = Vec3::new(0.3, -0.8, 0.2).normalize();
        let mut mean_cos = 0.0;
        let n = 20_000;
        for _ in 0..n {
            let d = cosine_hemisphere(normal, &mut rng);
            assert!((d.length() - 1.0).abs() < 0.001);
            assert!(d.dot(normal) >= -1e-4);
            mean_cos += d.dot(normal);
        }
        // E[cos] under a cosine-weighted pdf is 2/3
        assert!((mean_cos / n as f32 - 2.0 / 3.0).abs() < 0.02);
    }

    #[test]
    fn test_tangent_frame_is_orthonormal() {
        for w in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, 1.0, 1.0).normalize()] {
            let (u, v) = tangent_frame(w);
            assert!(u.dot(w).abs() < 1e-5);
            assert!(v.dot(w).abs() < 1e-5);
            assert!(u.dot(v).abs() < 1e-5);
            assert!((u.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_uniform_triangle_inside() {
        let mut rng = StdRng::seed_from_u64(3);
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        for _ in 0..500 {
            let (p, u, v) = uniform_triangle(a, b, c, &mut rng);
            assert!(u >= 0.0 && v >= 0.0 && u + v <= 1.0 + 1e-5);
            assert!(p.x >= -1e-5 && p.y >= -1e-5 && p.x + p.y <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn test_task_rng_is_deterministic() {
        let a: f32 = task_rng(42, 3).gen();
        let b: f32 = task_rng(42, 3).gen();
        let c: f32 = task_rng(42, 4).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
