use std::ops::{Add, Mul, Sub};

// Point
//------------------------------------------------------------------------------

/// Continuous image coordinate. Pixel `(i, j)` spans `[i, i + 1) x [j, j + 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dist(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Pixel containing the point, `None` when it lies left of or above the image.
    pub fn pixel(&self) -> Option<(u32, u32)> {
        let (x, y) = (self.x.floor(), self.y.floor());
        if x < 0.0 || y < 0.0 || x > u32::MAX as f64 || y > u32::MAX as f64 {
            return None;
        }
        Some((x as u32, y as u32))
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Z component of `(a - o) x (b - o)`. Positive when `b` is clockwise from `a` in image space
/// (y pointing down).
pub fn cross(o: &Point, a: &Point, b: &Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

#[cfg(test)]
mod geometry_tests {
    use super::{cross, Point};

    #[test]
    fn test_cross_orientation() {
        let tl = Point::new(10.0, 10.0);
        let tr = Point::new(50.0, 10.0);
        let bl = Point::new(10.0, 50.0);
        assert!(cross(&tl, &tr, &bl) > 0.0);
        assert!(cross(&tl, &bl, &tr) < 0.0);
    }

    #[test]
    fn test_pixel() {
        assert_eq!(Point::new(3.99, 0.0).pixel(), Some((3, 0)));
        assert_eq!(Point::new(-0.01, 4.0).pixel(), None);
        assert_eq!((Point::new(1.0, 2.0) + Point::new(2.0, 2.0)) * 0.5, Point::new(1.5, 2.0));
    }
}
