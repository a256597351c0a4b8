use std::ops::Index;

use crate::common::error::{QRError, QRResult};

use super::geometry::Point;

// Homographic projection matrix to map logical qr onto image qr
//------------------------------------------------------------------------------

/// Row-major 3x3 projection with the last coefficient fixed to 1.
#[derive(Debug, PartialEq, Clone)]
pub struct Homography(pub [f64; 8]);

impl Index<usize> for Homography {
    type Output = f64;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl Homography {
    /// Solves for the projection taking `src[i]` onto `dst[i]`.
    pub fn compute(src: [Point; 4], dst: [Point; 4]) -> QRResult<Self> {
        let mut a = [[0.0_f64; 8]; 8];
        let mut b = [0.0_f64; 8];

        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            a[2 * i] = [s.x, s.y, 1.0, 0.0, 0.0, 0.0, -d.x * s.x, -d.x * s.y];
            b[2 * i] = d.x;
            a[2 * i + 1] = [0.0, 0.0, 0.0, s.x, s.y, 1.0, -d.y * s.x, -d.y * s.y];
            b[2 * i + 1] = d.y;
        }

        Ok(Self(solve(a, b)?))
    }

    pub fn map(&self, x: f64, y: f64) -> QRResult<Point> {
        let w = self[6] * x + self[7] * y + 1.0;
        if w.abs() <= f64::EPSILON {
            return Err(QRError::PointAtInfinity);
        }
        let xp = (self[0] * x + self[1] * y + self[2]) / w;
        let yp = (self[3] * x + self[4] * y + self[5]) / w;
        Ok(Point::new(xp, yp))
    }
}

// Gaussian elimination with partial pivoting
fn solve(mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> QRResult<[f64; 8]> {
    for i in 0..8 {
        let pivot_row = (i..8)
            .max_by(|&p, &q| a[p][i].abs().total_cmp(&a[q][i].abs()))
            .unwrap_or(i);
        a.swap(i, pivot_row);
        b.swap(i, pivot_row);

        let pivot = a[i][i];
        if pivot.abs() < 1e-12 {
            return Err(QRError::SingularMatrix);
        }

        for c in i..8 {
            a[i][c] /= pivot;
        }
        b[i] /= pivot;

        for r in i + 1..8 {
            let factor = a[r][i];
            if factor == 0.0 {
                continue;
            }
            for c in i..8 {
                a[r][c] -= factor * a[i][c];
            }
            b[r] -= factor * b[i];
        }
    }

    let mut x = [0.0; 8];
    for r in (0..8).rev() {
        let sum: f64 = (r + 1..8).map(|c| a[r][c] * x[c]).sum();
        x[r] = b[r] - sum;
    }
    Ok(x)
}
