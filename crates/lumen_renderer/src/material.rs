//! Materials: how light scatters off, refracts through, or leaves a surface.
//!
//! All integrators consume the same contract. The path tracer only needs
//! [`Material::scatter`] and [`Material::emitted`]; the photon-mapping
//! integrators additionally classify a hit with [`Material::surface`] so they
//! can treat diffuse, specular and refractive bounces differently.

use std::sync::Arc;

use lumen_math::{Ray, Vec3};
use rand::RngCore;

use crate::hittable::HitRecord;
use crate::sampling::{gen_f32, random_in_unit_sphere};
use crate::texture::{SolidColor, Texture};

/// Color type alias (linear RGB)
pub type Color = Vec3;

/// A scattered ray and the per-channel weight it carries.
#[derive(Debug, Clone, Copy)]
pub struct ScatterResult {
    pub attenuation: Color,
    pub scattered: Ray,
}

/// What kind of bounce a hit represents, for integrators that branch on it.
#[derive(Clone, Copy)]
pub enum Surface<'a> {
    /// Lambertian reflector with albedo in [0, 1].
    Diffuse { albedo: Color },
    /// Mirror-like reflector; sample it with `scatter`.
    Specular,
    Refractive(&'a Dielectric),
    /// Light source; paths terminate here.
    Emissive { radiance: Color },
}

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    /// Scatter an incoming ray, or `None` if the ray is absorbed.
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord, rng: &mut dyn RngCore)
        -> Option<ScatterResult>;

    /// Light emitted at the given surface point. Black unless overridden.
    fn emitted(&self, _u: f32, _v: f32, _p: Vec3) -> Color {
        Color::ZERO
    }

    /// Emission seen along the ray that produced `rec`. Surfaces emit from
    /// their front side only, matching how area lights are sampled.
    fn emitted_toward(&self, rec: &HitRecord) -> Color {
        if rec.front_face {
            self.emitted(rec.u, rec.v, rec.p)
        } else {
            Color::ZERO
        }
    }

    fn is_emissive(&self) -> bool {
        false
    }

    fn surface(&self, rec: &HitRecord) -> Surface<'_>;
}

/// Lambertian (diffuse) material.
#[derive(Clone)]
pub struct Lambertian {
    texture: Arc<dyn Texture>,
}

impl Lambertian {
    /// Create a new Lambertian material with the given albedo color.
    pub fn new(albedo: Color) -> Self {
        Self::textured(Arc::new(SolidColor::new(albedo)))
    }

    pub fn textured(texture: Arc<dyn Texture>) -> Self {
        Self { texture }
    }

    /// Texture albedo, clamped so the surface never reflects more than it receives.
    pub fn albedo(&self, rec: &HitRecord) -> Color {
        self.texture
            .value(rec.u, rec.v, rec.p)
            .clamp(Color::ZERO, Color::ONE)
    }
}

impl Material for Lambertian {
    fn scatter(
        &self,
        _ray_in: &Ray,
        rec: &HitRecord,
        rng: &mut dyn RngCore,
    ) -> Option<ScatterResult> {
        let mut scatter_direction = rec.normal + random_in_unit_sphere(rng);

        // Catch degenerate scatter direction
        if scatter_direction.length_squared() < 1e-8 {
            scatter_direction = rec.normal;
        }

        Some(ScatterResult {
            attenuation: self.albedo(rec),
            scattered: Ray::new(rec.p, scatter_direction),
        })
    }

    fn surface(&self, rec: &HitRecord) -> Surface<'_> {
        Surface::Diffuse {
            albedo: self.albedo(rec),
        }
    }
}

/// Metal (specular) material.
#[derive(Debug, Clone)]
pub struct Metal {
    albedo: Color,
    fuzz: f32,
}

impl Metal {
    /// Create a new Metal material.
    ///
    /// - `albedo`: The color of the metal, clamped to [0, 1]
    /// - `fuzz`: Roughness, 0.0 = perfect mirror, 1.0 = very rough
    pub fn new(albedo: Color, fuzz: f32) -> Self {
        Self {
            albedo: albedo.clamp(Color::ZERO, Color::ONE),
            fuzz: fuzz.clamp(0.0, 1.0),
        }
    }
}

impl Material for Metal {
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord, rng: &mut dyn RngCore) -> Option<ScatterResult> {
        let reflected = reflect(ray_in.direction().normalize(), rec.normal);
        let scattered_dir = reflected + self.fuzz * random_in_unit_sphere(rng);

        // Fuzz can push the reflection below the surface; absorb those.
        if scattered_dir.dot(rec.normal) <= 0.0 {
            return None;
        }

        Some(ScatterResult {
            attenuation: self.albedo,
            scattered: Ray::new(rec.p, scattered_dir),
        })
    }

    fn surface(&self, _rec: &HitRecord) -> Surface<'_> {
        Surface::Specular
    }
}

/// Both outcomes of a dielectric interface, before one is chosen.
#[derive(Debug, Clone, Copy)]
pub struct FresnelSplit {
    /// Mirror direction (unit length)
    pub reflected: Vec3,
    /// Refracted direction, `None` under total internal reflection
    pub refracted: Option<Vec3>,
    /// Schlick reflectance `Re`
    pub reflectance: f32,
    /// `Tr = 1 - Re`
    pub transmittance: f32,
    /// Beer's-law factor for the segment just travelled inside the medium
    pub transmission: Color,
}

impl FresnelSplit {
    /// Probability of sampling the reflected branch, `0.25 + 0.5 * Re`.
    pub fn reflect_probability(&self) -> f32 {
        0.25 + 0.5 * self.reflectance
    }
}

/// Dielectric (glass) material with optional per-channel absorption.
#[derive(Debug, Clone)]
pub struct Dielectric {
    /// Index of refraction
    ior: f32,
    /// Beer's-law absorption coefficient per unit distance
    absorbance: Color,
}

impl Dielectric {
    /// Create a clear dielectric.
    ///
    /// - `ior`: Index of refraction (1.0 = air, 1.5 = glass, 2.4 = diamond)
    pub fn new(ior: f32) -> Self {
        Self::with_absorbance(ior, Color::ZERO)
    }

    pub fn with_absorbance(ior: f32, absorbance: Color) -> Self {
        Self {
            ior,
            absorbance: absorbance.max(Color::ZERO),
        }
    }

    pub fn ior(&self) -> f32 {
        self.ior
    }

    /// Schlick's approximation for reflectance
    pub fn reflectance(cosine: f32, ratio: f32) -> f32 {
        let r0 = ((1.0 - ratio) / (1.0 + ratio)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
    }

    /// Attenuation for a ray that travelled `ray_in` up to this hit.
    ///
    /// Only a ray leaving the medium (back face) has been inside it.
    pub fn transmission(&self, ray_in: &Ray, rec: &HitRecord) -> Color {
        if rec.front_face {
            return Color::ONE;
        }
        (-self.absorbance * ray_in.distance_to(rec.t)).exp()
    }

    /// Compute both branches of the interface without choosing one.
    pub fn fresnel_split(&self, ray_in: &Ray, rec: &HitRecord) -> FresnelSplit {
        let ratio = if rec.front_face {
            1.0 / self.ior
        } else {
            self.ior
        };

        let unit_direction = ray_in.direction().normalize();
        let cos_theta = (-unit_direction).dot(rec.normal).min(1.0);
        let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

        let reflected = reflect(unit_direction, rec.normal);
        let transmission = self.transmission(ray_in, rec);

        if ratio * sin_theta > 1.0 {
            return FresnelSplit {
                reflected,
                refracted: None,
                reflectance: 1.0,
                transmittance: 0.0,
                transmission,
            };
        }

        let reflectance = Self::reflectance(cos_theta, ratio);
        FresnelSplit {
            reflected,
            refracted: Some(refract(unit_direction, rec.normal, ratio)),
            reflectance,
            transmittance: 1.0 - reflectance,
            transmission,
        }
    }

    /// Follow the refracted branch only, weighted by absorption alone.
    ///
    /// Returns `None` under total internal reflection.
    pub fn refract_through(&self, ray_in: &Ray, rec: &HitRecord) -> Option<ScatterResult> {
        let split = self.fresnel_split(ray_in, rec);
        split.refracted.map(|direction| ScatterResult {
            attenuation: split.transmission,
            scattered: Ray::new(rec.p, direction),
        })
    }
}

impl Material for Dielectric {
    fn scatter(&self, ray_in: &Ray, rec: &HitRecord, rng: &mut dyn RngCore) -> Option<ScatterResult> {
        let split = self.fresnel_split(ray_in, rec);

        let (attenuation, direction) = match split.refracted {
            None => (split.transmission, split.reflected),
            Some(refracted) => {
                let p = split.reflect_probability();
                if gen_f32(rng) < p {
                    (split.transmission * (split.reflectance / p), split.reflected)
                } else {
                    (
                        split.transmission * (split.transmittance / (1.0 - p)),
                        refracted,
                    )
                }
            }
        };

        Some(ScatterResult {
            attenuation,
            scattered: Ray::new(rec.p, direction),
        })
    }

    fn surface(&self, _rec: &HitRecord) -> Surface<'_> {
        Surface::Refractive(self)
    }
}

/// Diffuse light emitter.
#[derive(Clone)]
pub struct DiffuseLight {
    texture: Arc<dyn Texture>,
}

impl DiffuseLight {
    /// Create a new diffuse light with the given emission color.
    pub fn new(emit: Color) -> Self {
        Self::textured(Arc::new(SolidColor::new(emit)))
    }

    pub fn textured(texture: Arc<dyn Texture>) -> Self {
        Self { texture }
    }
}

impl Material for DiffuseLight {
    fn scatter(&self, _ray_in: &Ray, _rec: &HitRecord, _rng: &mut dyn RngCore) -> Option<ScatterResult> {
        None
    }

    fn emitted(&self, u: f32, v: f32, p: Vec3) -> Color {
        self.texture.value(u, v, p)
    }

    fn is_emissive(&self) -> bool {
        true
    }

    fn surface(&self, rec: &HitRecord) -> Surface<'_> {
        Surface::Emissive {
            radiance: self.emitted_toward(rec),
        }
    }
}

/// Reflect a vector about a normal.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a unit vector through a surface with relative index `etai_over_etat`.
#[inline]
pub fn refract(uv: Vec3, n: Vec3, etai_over_etat: f32) -> Vec3 {
    let cos_theta = (-uv).dot(n).min(1.0);
    let r_out_perp = etai_over_etat * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    r_out_perp + r_out_parallel
}
