use super::geometry::Point;

// Accumulator trait for flood fill
//------------------------------------------------------------------------------

pub trait Accumulator {
    fn accumulate(&mut self, row: Row);
}

impl<F> Accumulator for F
where
    F: FnMut(Row),
{
    fn accumulate(&mut self, row: Row) {
        self(row)
    }
}

// Region row
//------------------------------------------------------------------------------

/// Horizontal run of filled pixels, both ends inclusive.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Row {
    pub left: u32,
    pub right: u32,
    pub y: u32,
}

// Area and centre of a region
// CX = Sum of X / Total points
// CY = Sum of Y / Total points
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegionStats {
    sum_x: f64,
    sum_y: f64,
    pub area: u32,
}

impl RegionStats {
    /// Centroid in continuous coordinates, pixel centres sit at `i + 0.5`.
    pub fn centre(&self) -> Point {
        if self.area == 0 {
            return Point::default();
        }
        let area = self.area as f64;
        Point::new(self.sum_x / area, self.sum_y / area)
    }
}

impl Accumulator for RegionStats {
    fn accumulate(&mut self, row: Row) {
        let Row { left, right, y } = row;
        let width = right - left + 1;
        // Sum of (x + 0.5) over left..=right
        let mid = (left as f64 + right as f64) / 2.0 + 0.5;

        self.sum_x += mid * width as f64;
        self.sum_y += (y as f64 + 0.5) * width as f64;
        self.area += width;
    }
}
