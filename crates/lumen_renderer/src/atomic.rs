//! Lock-free float accumulators for hit-point flux.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::Color;

/// An `f32` stored as its bit pattern in an `AtomicU32`.
#[derive(Debug, Default)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Atomically add `delta`, returning the previous value.
    pub fn fetch_add(&self, delta: f32) -> f32 {
        let mut current = self.bits.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(current) + delta).to_bits();
            match self
                .bits
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(prev) => return f32::from_bits(prev),
                Err(actual) => current = actual,
            }
        }
    }

    /// Reset to zero, returning the old value.
    pub fn take(&self) -> f32 {
        f32::from_bits(self.bits.swap(0.0f32.to_bits(), Ordering::Relaxed))
    }
}

/// Three [`AtomicF32`] channels.
#[derive(Debug, Default)]
pub struct AtomicColor {
    r: AtomicF32,
    g: AtomicF32,
    b: AtomicF32,
}

impl AtomicColor {
    pub fn add(&self, c: Color) {
        self.r.fetch_add(c.x);
        self.g.fetch_add(c.y);
        self.b.fetch_add(c.z);
    }

    pub fn load(&self) -> Color {
        Color::new(self.r.load(), self.g.load(), self.b.load())
    }

    pub fn take(&self) -> Color {
        Color::new(self.r.take(), self.g.take(), self.b.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_fetch_add_and_take() {
        let a = AtomicF32::new(1.5);
        assert_eq!(a.fetch_add(2.0), 1.5);
        assert_eq!(a.load(), 3.5);
        assert_eq!(a.take(), 3.5);
        assert_eq!(a.load(), 0.0);
        a.fetch_add(-1.0);
        assert_eq!(a.load(), -1.0);
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let c = AtomicColor::default();
        (0..10_000).into_par_iter().for_each(|_| {
            c.add(Color::new(1.0, 0.5, 0.25));
        });
        // Small integers and halves are exact in f32 at this magnitude
        assert_eq!(c.load(), Color::new(10_000.0, 5_000.0, 2_500.0));
    }
}
