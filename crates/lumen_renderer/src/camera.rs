//! Camera for ray generation.

use crate::sampling::gen_f32;
use lumen_math::{Ray, Vec3};
use rand::RngCore;

/// Thin-lens camera; a zero defocus angle makes it a pinhole.
///
/// Image coordinates `(s, t)` are normalized: `s` runs left to right and
/// `t` top to bottom, both over [0, 1].
#[derive(Debug, Clone)]
pub struct Camera {
    pub image_width: u32,
    pub image_height: u32,

    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,
    /// Vertical field of view in degrees
    vfov: f32,
    /// Cone angle, in degrees, of rays through one pixel center
    defocus_angle: f32,
    /// Distance to the plane in perfect focus
    focus_dist: f32,

    // Derived by `initialize`
    upper_left: Vec3,
    horizontal: Vec3,
    vertical: Vec3,
    lens_u: Vec3,
    lens_v: Vec3,
}

impl Camera {
    /// 400x300 pinhole at the origin looking down -Z with a 90 degree field of view.
    pub fn new() -> Self {
        let mut camera = Self {
            image_width: 400,
            image_height: 300,
            look_from: Vec3::ZERO,
            look_at: -Vec3::Z,
            vup: Vec3::Y,
            vfov: 90.0,
            defocus_angle: 0.0,
            focus_dist: 1.0,
            upper_left: Vec3::ZERO,
            horizontal: Vec3::ZERO,
            vertical: Vec3::ZERO,
            lens_u: Vec3::ZERO,
            lens_v: Vec3::ZERO,
        };
        camera.initialize();
        camera
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width.max(1);
        self.image_height = height.max(1);
        self.initialize();
        self
    }

    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self.initialize();
        self
    }

    pub fn with_lens(mut self, vfov: f32, defocus_angle: f32, focus_dist: f32) -> Self {
        self.vfov = vfov;
        self.defocus_angle = defocus_angle;
        self.focus_dist = focus_dist;
        self.initialize();
        self
    }

    /// Recompute the image plane after any setting changed.
    pub fn initialize(&mut self) {
        let aspect = self.image_width as f32 / self.image_height as f32;
        let half_height = (0.5 * self.vfov.to_radians()).tan() * self.focus_dist;
        let half_width = half_height * aspect;

        let back = (self.look_from - self.look_at).normalize();
        let right = self.vup.cross(back).normalize();
        let up = back.cross(right);

        self.horizontal = 2.0 * half_width * right;
        self.vertical = -2.0 * half_height * up;
        self.upper_left = self.look_from - self.focus_dist * back - 0.5 * self.horizontal
            - 0.5 * self.vertical;

        let lens_radius = self.focus_dist * (0.5 * self.defocus_angle).to_radians().tan();
        self.lens_u = lens_radius * right;
        self.lens_v = lens_radius * up;
    }

    /// Point on the focus plane at normalized image coordinates.
    fn focus_point(&self, s: f32, t: f32) -> Vec3 {
        self.upper_left + s * self.horizontal + t * self.vertical
    }

    /// Ray through normalized image coordinates from the lens center.
    pub fn ray_at(&self, s: f32, t: f32) -> Ray {
        Ray::new(self.look_from, self.focus_point(s, t) - self.look_from)
    }

    /// Jittered ray through pixel `(i, j)`, `j = 0` being the top row.
    pub fn get_ray(&self, i: u32, j: u32, rng: &mut dyn RngCore) -> Ray {
        let s = (i as f32 + gen_f32(rng)) / self.image_width as f32;
        let t = (j as f32 + gen_f32(rng)) / self.image_height as f32;
        let target = self.focus_point(s, t);

        let origin = if self.defocus_angle > 0.0 {
            let (dx, dy) = random_in_unit_disk(rng);
            self.look_from + dx * self.lens_u + dy * self.lens_v
        } else {
            self.look_from
        };

        Ray::new(origin, target - origin)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

fn random_in_unit_disk(rng: &mut dyn RngCore) -> (f32, f32) {
    loop {
        let x = 2.0 * gen_f32(rng) - 1.0;
        let y = 2.0 * gen_f32(rng) - 1.0;
        if x * x + y * y < 1.0 {
            return (x, y);
        }
    }
}
