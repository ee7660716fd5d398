//! Continuous two-dimensional field.

use anyhow::{Result, bail};
use rand::prelude::*;

/// Location on the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounded, non-toroidal field `[0, width] x [0, height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    width: f64,
    height: f64,
}

impl Field {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            bail!("field dimensions must be positive and finite, but are {width} x {height}");
        }
        Ok(Self { width, height })
    }

    /// Euclidean distance between two points.
    pub fn distance(&self, a: &Point, b: &Point) -> f64 {
        (a.x - b.x).hypot(a.y - b.y)
    }

    /// Sample a point uniformly over the whole field.
    pub fn sample_point<R: Rng>(&self, rng: &mut R) -> Point {
        self.sample_inset_point(0.0, rng)
    }

    /// Sample a point uniformly over the field shrunk by `factor` of each side.
    ///
    /// `factor` must lie in `[0, 0.5)`.
    pub fn sample_inset_point<R: Rng>(&self, factor: f64, rng: &mut R) -> Point {
        let x = rng.random_range(self.width * factor..=self.width * (1.0 - factor));
        let y = rng.random_range(self.height * factor..=self.height * (1.0 - factor));
        Point::new(x, y)
    }

    pub fn contains(&self, point: &Point) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }
}
