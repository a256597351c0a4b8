use std::collections::HashSet;

use crate::common::metadata::Color;

use super::{
    binarize::BinaryImage,
    utils::{geometry::Point, runs_around},
};

// Finder
//------------------------------------------------------------------------------

/// Centre of a finder stone with the module size measured from its regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Finder {
    pub centre: Point,
    pub module: f64,
}

// Finder line
//------------------------------------------------------------------------------

// **   ******   **  <- Finder line
// ^    ^        ^
// left |        right
//      stone
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct DatumLine {
    left: u32,
    stone: u32,
    right: u32,
    y: u32,
    runs: [u32; 5],
}

// Line scanner to detect finder line
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct LineScanner {
    buffer: [u32; 6],    // Run length of each transition
    prev: Option<Color>, // Last observed color
    flips: u32,          // Count of color changes
    pos: u32,            // Current position
    y: u32,
}

impl LineScanner {
    fn new() -> Self {
        Self { buffer: [0; 6], prev: None, flips: 0, pos: 0, y: 0 }
    }

    fn reset(&mut self, y: u32) {
        *self = Self { y, ..Self::new() };
    }

    fn advance(&mut self, color: Color) -> Option<DatumLine> {
        self.pos += 1;

        if self.prev == Some(color) {
            self.buffer[5] += 1;
            return None;
        }

        self.buffer.rotate_left(1);
        self.buffer[5] = 1;
        self.prev = Some(color);
        self.flips += 1;

        // A light run just started, the 5 runs before it must read dark-light-dark-light-dark
        if self.flips < 6 || color != Color::Light {
            return None;
        }

        let runs = [self.buffer[0], self.buffer[1], self.buffer[2], self.buffer[3], self.buffer[4]];
        if !is_finder_ratio(&runs) {
            return None;
        }

        let end = self.pos - 1;
        Some(DatumLine {
            left: end - runs.iter().sum::<u32>(),
            stone: end - runs[2..].iter().sum::<u32>(),
            right: end - runs[4],
            y: self.y,
            runs,
        })
    }
}

/// Whether 5 run lengths are in the 1:1:3:1:1 ratio.
fn is_finder_ratio(runs: &[u32; 5]) -> bool {
    let total: u32 = runs.iter().sum();
    if total < 7 {
        return false;
    }

    let avg = total as f64 / 7.0;
    let tol = avg * 3.0 / 4.0;

    [1.0, 1.0, 3.0, 1.0, 1.0].iter().zip(runs).all(|(r, &rl)| {
        let rl = rl as f64;
        (r * avg - tol..=r * avg + tol).contains(&rl)
    })
}

// Locate finders
//------------------------------------------------------------------------------

/// Centres of potential finders in scan order.
pub fn locate_finders(img: &mut BinaryImage) -> Vec<Finder> {
    let mut finders = Vec::new();
    let mut seen = HashSet::new();
    let mut scanner = LineScanner::new();

    for y in 0..img.h {
        scanner.reset(y);
        for x in 0..img.w {
            let color = img.color(x as i64, y as i64).unwrap_or(Color::Light);
            if let Some(datum) = scanner.advance(color) {
                finders.extend(verify_finder(img, &datum, &mut seen));
            }
        }

        // Handles a symbol touching the right edge of the image
        if let Some(datum) = scanner.advance(Color::Light) {
            finders.extend(verify_finder(img, &datum, &mut seen));
        }
    }

    finders
}

// Checks multiple conditions to ensure the finder is valid
// 1. The stone region wasn't already accepted
// 2. Ring region encloses left and right datum points and isn't the stone
// 3. Area of stone region is roughly 37.5% of ring region and both share a centre
// 4. Crosscheck 1:1:3:1:1 pattern along Y axis
fn verify_finder(img: &mut BinaryImage, datum: &DatumLine, seen: &mut HashSet<usize>) -> Option<Finder> {
    let DatumLine { left, stone, right, y, runs } = *datum;
    let stone_x = stone + runs[2] / 2;

    let stone_reg = img.region(stone_x, y)?;
    if stone_reg.color != Color::Dark || seen.contains(&stone_reg.id) {
        return None;
    }

    let ring = img.region(left, y)?;
    if ring.color != Color::Dark || ring.id == stone_reg.id || img.region(right, y)?.id != ring.id {
        return None;
    }

    let ratio = stone_reg.area as f64 / ring.area as f64;
    if !(0.2..=0.75).contains(&ratio) {
        return None;
    }

    let module = ((stone_reg.area + ring.area) as f64 / 33.0).sqrt();
    if stone_reg.centre.dist(&ring.centre) > module {
        return None;
    }

    let line_w: u32 = runs.iter().sum();
    let vruns = runs_around(img, (stone_x, y), (0, 1), line_w * 2)?;
    if !is_finder_ratio(&vruns) {
        return None;
    }
    let vtotal: u32 = vruns.iter().sum();
    if vtotal * 2 < line_w || vtotal > line_w * 2 {
        return None;
    }

    seen.insert(stone_reg.id);
    Some(Finder { centre: stone_reg.centre, module })
}
