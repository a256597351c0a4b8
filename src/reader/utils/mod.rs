use crate::common::metadata::Color;

use super::binarize::BinaryImage;

pub mod accumulate;
pub mod geometry;
pub mod homography;

// Run lengths of the 5 alternating runs centred on a seed pixel along one direction. Used to
// cross check the 1:1:3:1:1 finder pattern perpendicular to the scan line.
//------------------------------------------------------------------------------

pub fn runs_around(img: &BinaryImage, seed: (u32, u32), step: (i64, i64), max_run: u32) -> Option<[u32; 5]> {
    let back = walk(img, seed, (-step.0, -step.1), max_run)?;
    let fwd = walk(img, seed, step, max_run)?;
    Some([back[2], back[1], back[0] + 1 + fwd[0], fwd[1], fwd[2]])
}

// Counts the rest of the seed run, the opposite run and the next run in one direction.
// Leaving the image ends the outermost run.
fn walk(img: &BinaryImage, seed: (u32, u32), step: (i64, i64), max_run: u32) -> Option<[u32; 3]> {
    let (mut x, mut y) = (seed.0 as i64, seed.1 as i64);
    let mut expected: Color = img.color(x, y)?;
    let mut runs = [0u32; 3];
    let mut idx = 0;

    loop {
        x += step.0;
        y += step.1;
        let Some(color) = img.color(x, y) else { break };
        if color != expected {
            if idx == 2 {
                break;
            }
            idx += 1;
            expected = color;
        }
        runs[idx] += 1;
        if runs[idx] > max_run {
            return None;
        }
    }

    (idx == 2 && runs[2] > 0).then_some(runs)
}

#[cfg(test)]
mod utils_tests {
    use image::{GrayImage, Luma};

    use super::runs_around;
    use crate::reader::binarize::{BinaryImage, Strategy};

    #[test]
    fn test_runs_around() {
        // Column pattern: 2 light, 1 dark, 1 light, 3 dark, 1 light, 1 dark, 2 light
        let col = [255u8, 255, 0, 255, 0, 0, 0, 255, 0, 255, 255];
        let img = GrayImage::from_fn(1, col.len() as u32, |_, y| Luma([col[y as usize]]));
        let bin = BinaryImage::binarize(&img, Strategy::Otsu);
        assert_eq!(runs_around(&bin, (0, 5), (0, 1), 10), Some([1, 1, 3, 1, 1]));
        assert_eq!(runs_around(&bin, (0, 5), (0, 1), 0), None);
    }
}
