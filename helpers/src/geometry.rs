use serde::Deserialize;

/// Point2d is a position on the track map (m).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Point2d {
    pub x: f64,
    pub y: f64,
}

/// Vector2d is a direction or offset on the track map.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2d {
    pub x: f64,
    pub y: f64,
}

impl Point2d {
    pub fn new(x: f64, y: f64) -> Point2d {
        Point2d { x, y }
    }

    pub fn as_vector2d(&self) -> Vector2d {
        Vector2d {
            x: self.x,
            y: self.y,
        }
    }

    pub fn dist(&self, other: &Point2d) -> f64 {
        other.as_vector2d().sub(&self.as_vector2d()).norm()
    }

    /// lerp returns the point at fraction `u` of the way to `other`.
    pub fn lerp(&self, other: &Point2d, u: f64) -> Point2d {
        Point2d {
            x: self.x + (other.x - self.x) * u,
            y: self.y + (other.y - self.y) * u,
        }
    }
}

impl Vector2d {
    pub fn new(x: f64, y: f64) -> Vector2d {
        Vector2d { x, y }
    }

    pub fn as_point2d(&self) -> Point2d {
        Point2d {
            x: self.x,
            y: self.y,
        }
    }

    pub fn add(&self, other: &Vector2d) -> Vector2d {
        Vector2d {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn sub(&self, other: &Vector2d) -> Vector2d {
        Vector2d {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn mult(&self, factor: f64) -> Vector2d {
        Vector2d {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// normalized returns the unit vector, or None for a zero-length vector.
    pub fn normalized(&self) -> Option<Vector2d> {
        let norm = self.norm();

        if norm > 0.0 && norm.is_finite() {
            Some(self.mult(1.0 / norm))
        } else {
            None
        }
    }

    /// normal returns the vector rotated by +90 degrees (pointing to the left).
    pub fn normal(&self) -> Vector2d {
        Vector2d {
            x: -self.y,
            y: self.x,
        }
    }
}
