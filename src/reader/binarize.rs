use std::collections::VecDeque;

use image::GrayImage;
use imageproc::contrast::otsu_level;

use crate::common::metadata::Color;

use super::utils::{
    accumulate::{Accumulator, RegionStats, Row},
    geometry::Point,
};

// Binarization strategy
//------------------------------------------------------------------------------

/// Thresholding attempts, tried in order until a symbol decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Otsu,
    OtsuInverted,
    Adaptive,
    AdaptiveInverted,
}

impl Strategy {
    pub const ALL: [Strategy; 4] =
        [Strategy::Otsu, Strategy::OtsuInverted, Strategy::Adaptive, Strategy::AdaptiveInverted];

    fn is_inverted(self) -> bool {
        matches!(self, Strategy::OtsuInverted | Strategy::AdaptiveInverted)
    }
}

// Pixel
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Pixel {
    Visited(usize, Color), // Contains id of associated region
    Unvisited(Color),
}

impl From<Pixel> for Color {
    fn from(p: Pixel) -> Self {
        match p {
            Pixel::Visited(_, c) | Pixel::Unvisited(c) => c,
        }
    }
}

// Region
//------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Region {
    pub id: usize,
    pub color: Color,
    pub area: u32,
    pub centre: Point,
}

// Block thresholds
// The image is split into 8x8 blocks. Each block threshold is the mean of block averages in
// its 5x5 neighbourhood.
//------------------------------------------------------------------------------

const BLOCK: u32 = 8;
const MIN_VARIANCE: u8 = 24;

struct BlockGrid {
    wsteps: usize,
    hsteps: usize,
}

impl BlockGrid {
    fn new(w: u32, h: u32) -> Self {
        Self { wsteps: w.div_ceil(BLOCK) as usize, hsteps: h.div_ceil(BLOCK) as usize }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y / BLOCK) as usize * self.wsteps + (x / BLOCK) as usize
    }
}

fn block_averages(img: &GrayImage, grid: &BlockGrid) -> Vec<u32> {
    let len = grid.wsteps * grid.hsteps;
    let mut sum = vec![0u32; len];
    let mut count = vec![0u32; len];
    let mut min_max = vec![(u8::MAX, u8::MIN); len];

    for (x, y, p) in img.enumerate_pixels() {
        let idx = grid.index(x, y);
        let p = p[0];
        sum[idx] += p as u32;
        count[idx] += 1;
        min_max[idx].0 = min_max[idx].0.min(p);
        min_max[idx].1 = min_max[idx].1.max(p);
    }

    // Low variance blocks are assumed light unless their top/left neighbours say otherwise
    let w = grid.wsteps;
    let mut avg = vec![0u32; len];
    for i in 0..len {
        let (mn, mx) = min_max[i];
        if mx - mn > MIN_VARIANCE {
            avg[i] = sum[i] / count[i].max(1);
            continue;
        }
        avg[i] = mn as u32 / 2;
        if i > w && i % w > 0 {
            let ng_avg = (2 * avg[i - 1] + avg[i - w] + avg[i - w - 1]) / 4;
            if (mn as u32) < ng_avg {
                avg[i] = ng_avg;
            }
        }
    }
    avg
}

fn block_thresholds(img: &GrayImage, grid: &BlockGrid) -> Vec<u8> {
    let avg = block_averages(img, grid);
    let (wsteps, hsteps) = (grid.wsteps, grid.hsteps);
    let mut res = vec![0u8; wsteps * hsteps];

    for y in 0..hsteps {
        let ys = window(y, hsteps);
        for x in 0..wsteps {
            let xs = window(x, wsteps);

            let mut sum = 0u32;
            let mut n = 0u32;
            for ny in ys.clone() {
                for nx in xs.clone() {
                    sum += avg[ny * wsteps + nx];
                    n += 1;
                }
            }
            res[y * wsteps + x] = (sum / n.max(1)).min(255) as u8;
        }
    }
    res
}

// Indices of the 5 blocks centred on i, shifted inwards at the edges
fn window(i: usize, n: usize) -> std::ops::RangeInclusive<usize> {
    if n < 5 {
        return 0..=n - 1;
    }
    let c = i.clamp(2, n - 3);
    c - 2..=c + 2
}

// Image type for reader
//------------------------------------------------------------------------------

#[derive(Debug)]
pub struct BinaryImage {
    buffer: Vec<Pixel>,
    regions: Vec<Region>, // Index is id
    pub w: u32,
    pub h: u32,
}

impl BinaryImage {
    pub fn binarize(img: &GrayImage, strategy: Strategy) -> Self {
        let (w, h) = img.dimensions();
        let invert = strategy.is_inverted();

        let buffer = match strategy {
            Strategy::Otsu | Strategy::OtsuInverted => {
                let level = otsu_level(img);
                img.pixels().map(|p| Pixel::Unvisited(Color::from((p[0] <= level) ^ invert))).collect()
            }
            Strategy::Adaptive | Strategy::AdaptiveInverted => {
                let grid = BlockGrid::new(w, h);
                let thresh = block_thresholds(img, &grid);
                img.enumerate_pixels()
                    .map(|(x, y, p)| {
                        let dark = p[0] <= thresh[grid.index(x, y)];
                        Pixel::Unvisited(Color::from(dark ^ invert))
                    })
                    .collect()
            }
        };

        Self { buffer, regions: Vec::new(), w, h }
    }

    fn coord_to_index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.w as i64 || y >= self.h as i64 {
            return None;
        }
        Some((y * self.w as i64 + x) as usize)
    }

    pub fn get(&self, x: i64, y: i64) -> Option<Pixel> {
        self.coord_to_index(x, y).map(|i| self.buffer[i])
    }

    pub fn color(&self, x: i64, y: i64) -> Option<Color> {
        self.get(x, y).map(Color::from)
    }

    /// Color of the pixel containing `pt`; outside the image counts as light.
    pub fn color_at_point(&self, pt: &Point) -> Color {
        pt.pixel().and_then(|(x, y)| self.color(x as i64, y as i64)).unwrap_or(Color::Light)
    }

    fn is(&self, px: Pixel, x: u32, y: u32) -> bool {
        self.get(x as i64, y as i64) == Some(px)
    }

    fn set(&mut self, x: u32, y: u32, px: Pixel) {
        if let Some(i) = self.coord_to_index(x as i64, y as i64) {
            self.buffer[i] = px;
        }
    }

    /// Connected region containing the pixel, flood filled and measured on first access.
    pub fn region(&mut self, x: u32, y: u32) -> Option<Region> {
        match self.get(x as i64, y as i64)? {
            Pixel::Visited(id, _) => self.regions.get(id).copied(),
            Pixel::Unvisited(color) => {
                let id = self.regions.len();
                let stats = self.fill_and_accumulate((x, y), Pixel::Visited(id, color), RegionStats::default());
                let reg = Region { id, color, area: stats.area, centre: stats.centre() };
                self.regions.push(reg);
                Some(reg)
            }
        }
    }

    /// Fills region with provided pixel and accumulates info
    pub fn fill_and_accumulate<A: Accumulator>(&mut self, src: (u32, u32), target: Pixel, mut acc: A) -> A {
        let Some(from) = self.get(src.0 as i64, src.1 as i64) else {
            return acc;
        };
        debug_assert!(from != target, "Cannot fill same color: From {from:?}, To {target:?}");

        let (w, h) = (self.w, self.h);
        let mut queue = VecDeque::new();
        queue.push_back(src);

        while let Some((x, y)) = queue.pop_front() {
            // Seeds can be reached through another row before they are popped
            if !self.is(from, x, y) {
                continue;
            }

            let mut left = x;
            let mut right = x;
            self.set(x, y, target);

            while left > 0 && self.is(from, left - 1, y) {
                left -= 1;
                self.set(left, y, target);
            }

            while right + 1 < w && self.is(from, right + 1, y) {
                right += 1;
                self.set(right, y, target);
            }

            acc.accumulate(Row { left, right, y });

            for ny in [y.wrapping_sub(1), y + 1] {
                if ny >= h {
                    continue;
                }
                let mut seg_len = 0;
                for nx in left..=right {
                    if self.is(from, nx, ny) {
                        seg_len += 1;
                    } else if seg_len > 0 {
                        queue.push_back((nx - 1, ny));
                        seg_len = 0;
                    }
                }
                if seg_len > 0 {
                    queue.push_back((right, ny));
                }
            }
        }
        acc
    }
}
