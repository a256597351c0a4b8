use std::ops::Deref;

use crate::common::{
    iter::EncRegionIter,
    mask::MaskPattern,
    metadata::{format_info, Color, ECLevel, Version},
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Module {
    Empty,
    Func(Color),
    Version(Color),
    Format(Color),
    Data(Color),
}

impl Deref for Module {
    type Target = Color;
    fn deref(&self) -> &Self::Target {
        match self {
            Module::Empty => &Color::Light,
            Module::Func(c) => c,
            Module::Version(c) => c,
            Module::Format(c) => c,
            Module::Data(c) => c,
        }
    }
}

// QR type for builder
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QR {
    grid: Vec<Module>,
    w: usize,
    ver: Version,
    ecl: ECLevel,
    mask: Option<MaskPattern>,
}

impl QR {
    pub fn new(ver: Version, ecl: ECLevel) -> Self {
        let w = ver.width();
        Self { grid: vec![Module::Empty; w * w], w, ver, ecl, mask: None }
    }

    pub fn version(&self) -> Version {
        self.ver
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ecl
    }

    pub fn mask(&self) -> Option<MaskPattern> {
        self.mask
    }

    pub fn count_dark_modules(&self) -> usize {
        self.grid.iter().filter(|m| ***m == Color::Dark).count()
    }

    /// Row-major dark flags, the boolean module matrix handed to renderers.
    pub fn to_matrix(&self) -> Vec<bool> {
        self.grid.iter().map(|m| **m == Color::Dark).collect()
    }

    pub fn is_dark(&self, r: usize, c: usize) -> bool {
        *self.grid[r * self.w + c] == Color::Dark
    }

    // Negative coordinates count from the far edge
    fn coord_to_index(&self, r: i32, c: i32) -> usize {
        let w = self.w as i32;
        debug_assert!(-w <= r && r < w, "row should be less than width: {r}");
        debug_assert!(-w <= c && c < w, "column should be less than width: {c}");

        let r = if r < 0 { r + w } else { r };
        let c = if c < 0 { c + w } else { c };
        (r * w + c) as usize
    }

    pub fn get(&self, r: i32, c: i32) -> Module {
        self.grid[self.coord_to_index(r, c)]
    }

    pub fn set(&mut self, r: i32, c: i32, module: Module) {
        let index = self.coord_to_index(r, c);
        self.grid[index] = module;
    }

    /// Renders the symbol as text with a quiet zone, two characters per module.
    pub fn to_str(&self) -> String {
        let qz = 2;
        let w = self.w as i32;
        let mut res = String::with_capacity(((w + 2 * qz) * (w + 2 * qz + 1) * 2) as usize);
        for r in -qz..w + qz {
            for c in -qz..w + qz {
                let dark = (0..w).contains(&r) && (0..w).contains(&c) && *self.get(r, c) == Color::Dark;
                res.push_str(if dark { "██" } else { "  " });
            }
            res.push('\n');
        }
        res
    }
}

// Function patterns
//------------------------------------------------------------------------------

impl QR {
    pub fn draw_all_function_patterns(&mut self) {
        self.draw_timing_patterns();
        self.draw_finder_patterns();
        self.draw_alignment_patterns();
        self.reserve_format_area();
        self.draw_version_info();
    }

    fn draw_finder_patterns(&mut self) {
        let w = self.w as i32;
        for (r, c) in [(3, 3), (3, w - 4), (w - 4, 3)] {
            self.draw_finder_pattern_at(r, c);
        }
    }

    // Finder with its separator, clipped to the symbol
    fn draw_finder_pattern_at(&mut self, r: i32, c: i32) {
        let w = self.w as i32;
        for dr in -4i32..=4 {
            for dc in -4i32..=4 {
                let (rr, cc) = (r + dr, c + dc);
                if !(0..w).contains(&rr) || !(0..w).contains(&cc) {
                    continue;
                }
                let dist = dr.abs().max(dc.abs());
                self.set(rr, cc, Module::Func(Color::from(dist != 2 && dist != 4)));
            }
        }
    }

    fn draw_timing_patterns(&mut self) {
        let w = self.w as i32;
        for i in 0..w {
            let clr = Color::from(i & 1 == 0);
            self.set(6, i, Module::Func(clr));
            self.set(i, 6, Module::Func(clr));
        }
    }

    fn draw_alignment_patterns(&mut self) {
        let pos = self.ver.alignment_pattern();
        let last = pos.len().saturating_sub(1);
        for (i, &r) in pos.iter().enumerate() {
            for (j, &c) in pos.iter().enumerate() {
                if (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0) {
                    continue;
                }
                self.draw_alignment_pattern_at(r as i32, c as i32);
            }
        }
    }

    fn draw_alignment_pattern_at(&mut self, r: i32, c: i32) {
        for dr in -2i32..=2 {
            for dc in -2i32..=2 {
                let dist = i32::max(dr.abs(), dc.abs());
                self.set(r + dr, c + dc, Module::Func(Color::from(dist != 1)));
            }
        }
    }

    fn reserve_format_area(&mut self) {
        self.draw_format_info(0);
        let w = self.w as i32;
        self.set(w - 8, 8, Module::Func(Color::Dark));
    }

    pub fn draw_format_info(&mut self, info: u16) {
        let w = self.w as i32;
        for coords in format_info_coords(w) {
            for (i, (r, c)) in coords.into_iter().enumerate() {
                self.set(r, c, Module::Format(Color::from((info >> i) & 1 == 1)));
            }
        }
    }

    fn draw_version_info(&mut self) {
        if *self.ver < 7 {
            return;
        }
        let info = self.ver.version_info();
        let w = self.w as i32;
        for coords in version_info_coords(w) {
            for (i, (r, c)) in coords.into_iter().enumerate() {
                self.set(r, c, Module::Version(Color::from((info >> i) & 1 == 1)));
            }
        }
    }
}

/// Positions of format info bits 0..15 in both copies, as (row, column).
pub(crate) fn format_info_coords(w: i32) -> [[(i32, i32); 15]; 2] {
    let mut main = [(0, 0); 15];
    let mut side = [(0, 0); 15];
    for i in 0..15 {
        main[i] = match i {
            0..=5 => (i as i32, 8),
            6 => (7, 8),
            7 => (8, 8),
            8 => (8, 7),
            _ => (8, 14 - i as i32),
        };
        side[i] = if i < 8 { (8, w - 1 - i as i32) } else { (w - 15 + i as i32, 8) };
    }
    [main, side]
}

/// Positions of version info bits 0..18 in both copies, as (row, column).
pub(crate) fn version_info_coords(w: i32) -> [[(i32, i32); 18]; 2] {
    let mut top_right = [(0, 0); 18];
    let mut bottom_left = [(0, 0); 18];
    for i in 0..18 {
        let a = w - 11 + (i % 3) as i32;
        let b = (i / 3) as i32;
        top_right[i] = (b, a);
        bottom_left[i] = (a, b);
    }
    [top_right, bottom_left]
}

// Encoding region
//------------------------------------------------------------------------------

impl QR {
    /// Places codewords along the zig-zag path, remainder bits stay light.
    pub fn draw_encoding_region(&mut self, payload: &[u8]) {
        let total_bits = payload.len() << 3;
        let mut i = 0;
        for (r, c) in EncRegionIter::new(self.ver) {
            if self.get(r, c) != Module::Empty {
                continue;
            }
            let dark = i < total_bits && (payload[i >> 3] >> (7 - (i & 7))) & 1 == 1;
            self.set(r, c, Module::Data(Color::from(dark)));
            i += 1;
        }
        debug_assert!(i >= total_bits, "Payload of {total_bits} bits exceeds region of {i}");
    }

    pub fn apply_mask(&mut self, pattern: MaskPattern) {
        self.mask = Some(pattern);
        let mask_fn = pattern.mask_function();
        let w = self.w as i32;
        for r in 0..w {
            for c in 0..w {
                if let Module::Data(clr) = self.get(r, c) {
                    if mask_fn(r, c) {
                        self.set(r, c, Module::Data(!clr));
                    }
                }
            }
        }
        self.draw_format_info(format_info(self.ecl, *pattern));
    }
}
