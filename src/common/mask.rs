use std::ops::Deref;

use super::metadata::Color;
use crate::builder::QR;

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Hash)]
pub struct MaskPattern(u8);

impl MaskPattern {
    pub fn new(pattern: u8) -> Self {
        debug_assert!(pattern < 8, "Invalid masking pattern");
        Self(pattern & 0b111)
    }
}

impl Deref for MaskPattern {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

mod mask_functions {
    pub fn checkerboard(r: i32, c: i32) -> bool {
        (r + c) & 1 == 0
    }

    pub fn horizontal_lines(r: i32, _: i32) -> bool {
        r & 1 == 0
    }

    pub fn vertical_lines(_: i32, c: i32) -> bool {
        c % 3 == 0
    }

    pub fn diagonal_lines(r: i32, c: i32) -> bool {
        (r + c) % 3 == 0
    }

    pub fn large_checkerboard(r: i32, c: i32) -> bool {
        ((r >> 1) + (c / 3)) & 1 == 0
    }

    pub fn fields(r: i32, c: i32) -> bool {
        ((r * c) & 1) + ((r * c) % 3) == 0
    }

    pub fn diamonds(r: i32, c: i32) -> bool {
        (((r * c) & 1) + ((r * c) % 3)) & 1 == 0
    }

    pub fn meadow(r: i32, c: i32) -> bool {
        (((r + c) & 1) + ((r * c) % 3)) & 1 == 0
    }
}

impl MaskPattern {
    /// Predicate over (row, column) telling whether a data module is flipped.
    pub fn mask_function(self) -> fn(i32, i32) -> bool {
        match *self {
            0b000 => mask_functions::checkerboard,
            0b001 => mask_functions::horizontal_lines,
            0b010 => mask_functions::vertical_lines,
            0b011 => mask_functions::diagonal_lines,
            0b100 => mask_functions::large_checkerboard,
            0b101 => mask_functions::fields,
            0b110 => mask_functions::diamonds,
            _ => mask_functions::meadow,
        }
    }
}

/// Applies the mask with the lowest penalty score, lowest index on ties.
pub fn apply_best_mask(qr: &mut QR) -> MaskPattern {
    let (best, _) = (0..8)
        .map(|m| {
            let mut candidate = qr.clone();
            candidate.apply_mask(MaskPattern(m));
            (MaskPattern(m), compute_total_penalty(&candidate))
        })
        .fold((MaskPattern(0), u32::MAX), |best, cur| if cur.1 < best.1 { cur } else { best });
    qr.apply_mask(best);
    best
}

pub fn compute_total_penalty(qr: &QR) -> u32 {
    let adj_pen = compute_adjacent_penalty(qr, true) + compute_adjacent_penalty(qr, false);
    let blk_pen = compute_block_penalty(qr);
    let fp_pen = compute_finder_pattern_penalty(qr, true) + compute_finder_pattern_penalty(qr, false);
    let bal_pen = compute_balance_penalty(qr);
    adj_pen + blk_pen + fp_pen + bal_pen
}

fn line_color(qr: &QR, is_hor: bool, i: i32, j: i32) -> Color {
    if is_hor {
        *qr.get(i, j)
    } else {
        *qr.get(j, i)
    }
}

// Runs of 5 or more same colored modules: 3 + (run - 5)
fn compute_adjacent_penalty(qr: &QR, is_hor: bool) -> u32 {
    let w = qr.width() as i32;
    let mut pen = 0;
    for i in 0..w {
        let mut run = 0;
        let mut last = None;
        for j in 0..w {
            let clr = line_color(qr, is_hor, i, j);
            if Some(clr) == last {
                run += 1;
            } else {
                if run >= 5 {
                    pen += run - 2;
                }
                last = Some(clr);
                run = 1;
            }
        }
        if run >= 5 {
            pen += run - 2;
        }
    }
    pen
}

// 2x2 blocks of the same color
fn compute_block_penalty(qr: &QR) -> u32 {
    let mut pen = 0;
    let w = qr.width() as i32;
    for r in 0..w - 1 {
        for c in 0..w - 1 {
            let clr = *qr.get(r, c);
            if clr == *qr.get(r + 1, c) && clr == *qr.get(r, c + 1) && clr == *qr.get(r + 1, c + 1)
            {
                pen += 3;
            }
        }
    }
    pen
}

// 1:1:3:1:1 finder-like runs with 4 light modules on either side, outside counts as light
fn compute_finder_pattern_penalty(qr: &QR, is_hor: bool) -> u32 {
    static PATTERN: [Color; 7] =
        [Color::Dark, Color::Light, Color::Dark, Color::Dark, Color::Dark, Color::Light, Color::Dark];
    let w = qr.width() as i32;
    let mut pen = 0;
    for i in 0..w {
        let get = |j: i32| {
            if (0..w).contains(&j) {
                line_color(qr, is_hor, i, j)
            } else {
                Color::Light
            }
        };
        for j in 0..=w - 7 {
            if (0..7).any(|k| get(j + k) != PATTERN[k as usize]) {
                continue;
            }
            if (j - 4..j).all(|k| get(k) == Color::Light) {
                pen += 40;
            }
            if (j + 7..j + 11).all(|k| get(k) == Color::Light) {
                pen += 40;
            }
        }
    }
    pen
}

// 10 points per 5% deviation of dark modules from half
fn compute_balance_penalty(qr: &QR) -> u32 {
    let dark = qr.count_dark_modules();
    let w = qr.width();
    let total = w * w;
    let k = (dark * 20).abs_diff(total * 10) / total;
    (k * 10) as u32
}
