use crate::Vec3;

/// Half-line `origin + t * direction`, `t >= 0`.
///
/// `direction` is kept as given. Scattered and shadow rays are often
/// unnormalized, so a hit distance `t` is measured in multiples of
/// `|direction|`, not in world units.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    origin: Vec3,
    direction: Vec3,
}

impl Ray {
    #[inline]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    #[inline]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + t * self.direction
    }

    /// World-space length travelled between `t = 0` and `t`.
    #[inline]
    pub fn distance_to(&self, t: f32) -> f32 {
        t * self.direction.length()
    }
}
