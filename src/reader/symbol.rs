use std::collections::HashSet;

use super::{
    binarize::BinaryImage,
    finder::Finder,
    utils::{
        geometry::{cross, Point},
        homography::Homography,
    },
};
use crate::{
    builder::{format_info_coords, version_info_coords, Module, QR},
    common::{
        bitstream::BitStream,
        error::{QRError, QRResult},
        iter::EncRegionIter,
        mask::MaskPattern,
        metadata::{rectify_format_info, rectify_version_info, Color, ECLevel, Version},
    },
};

const MAX_FINDERS: usize = 24;
const MAX_GROUPS: usize = 8;

// Group of 3 finders forming the corners of a candidate symbol
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderGroup {
    pub tl: Point,
    pub tr: Point,
    pub bl: Point,
    pub module: f64,
    score: f64, // Deviation from a right isosceles triangle, lower is better
}

impl FinderGroup {
    // The corner finder sits opposite the longest side
    fn from_triple(f: [Finder; 3]) -> Option<Self> {
        let (mn, mx) = f.iter().fold((f64::MAX, f64::MIN), |(mn, mx), f| (mn.min(f.module), mx.max(f.module)));
        if mx > mn * 1.5 {
            return None;
        }
        let module = f.iter().map(|f| f.module).sum::<f64>() / 3.0;

        let opposite = [
            f[1].centre.dist(&f[2].centre),
            f[0].centre.dist(&f[2].centre),
            f[0].centre.dist(&f[1].centre),
        ];
        let corner = (0..3).max_by(|&a, &b| opposite[a].total_cmp(&opposite[b])).unwrap_or(0);
        let tl = f[corner].centre;
        let mut tr = f[(corner + 1) % 3].centre;
        let mut bl = f[(corner + 2) % 3].centre;

        let (l1, l2, hyp) = (tl.dist(&tr), tl.dist(&bl), opposite[corner]);
        if l1.min(l2) < 10.0 * module {
            return None;
        }

        let asym = (l1 - l2).abs() / l1.max(l2);
        let hyp_err = (hyp - l1.hypot(l2)).abs() / hyp;
        if asym > 0.25 || hyp_err > 0.15 {
            return None;
        }

        if cross(&tl, &tr, &bl) < 0.0 {
            std::mem::swap(&mut tr, &mut bl);
        }

        Some(Self { tl, tr, bl, module, score: asym + hyp_err })
    }

    /// Provisional version from the finder spacing, centres are 7 modules short of the width.
    pub fn estimate_version(&self) -> Version {
        let dist = (self.tl.dist(&self.tr) + self.tl.dist(&self.bl)) / 2.0;
        let width = dist / self.module + 7.0;
        let v = ((width - 17.0) / 4.0).round().clamp(1.0, 40.0);
        Version::new(v as u8).unwrap_or(Version::MIN)
    }

    // Unit module vectors along the symbol's columns and rows
    fn axes(&self, ver: Version) -> (Point, Point) {
        let span = ver.width() as f64 - 7.0;
        ((self.tr - self.tl) * (1.0 / span), (self.bl - self.tl) * (1.0 / span))
    }
}

/// Candidate finder groups ordered by how closely they form a right isosceles triangle.
pub fn group_finders(finders: &[Finder]) -> Vec<FinderGroup> {
    let finders = &finders[..finders.len().min(MAX_FINDERS)];
    let n = finders.len();

    let mut groups = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                groups.extend(FinderGroup::from_triple([finders[i], finders[j], finders[k]]));
            }
        }
    }

    groups.sort_by(|a, b| a.score.total_cmp(&b.score));
    groups.truncate(MAX_GROUPS);
    groups
}

// Symbol
//------------------------------------------------------------------------------

/// Located symbol of a given version, sampled through a homography from logical module space.
pub struct Symbol<'a> {
    img: &'a BinaryImage,
    h: Homography,
    ver: Version,
}

/// Projects the logical grid of `ver` onto the finder group. The bottom right anchor is the
/// last alignment pattern when one can be found, else the parallelogram completion.
pub fn locate_symbol<'a>(img: &'a mut BinaryImage, group: &FinderGroup, ver: Version) -> QRResult<Symbol<'a>> {
    let w = ver.width() as f64;
    let src = [Point::new(3.5, 3.5), Point::new(w - 3.5, 3.5), Point::new(3.5, w - 3.5)];
    let dst = [group.tl, group.tr, group.bl];
    let far = (Point::new(w - 3.5, w - 3.5), group.tr + group.bl - group.tl);

    let affine = Homography::compute([src[0], src[1], src[2], far.0], [dst[0], dst[1], dst[2], far.1])?;

    let anchor = match ver.alignment_pattern().last() {
        Some(&a) => {
            let logical = Point::new(a as f64 + 0.5, a as f64 + 0.5);
            let seed = affine.map(logical.x, logical.y)?;
            let found = locate_alignment_pattern(img, group, ver, seed);
            found.map_or(far, |centre| (logical, centre))
        }
        None => far,
    };

    let h = Homography::compute([src[0], src[1], src[2], anchor.0], [dst[0], dst[1], dst[2], anchor.1])?;
    let img: &'a BinaryImage = img;
    let h = jiggle_homography(img, h, ver);

    Ok(Symbol { img, h, ver })
}

// Spirals outward from the seed looking for a module sized dark region ringed like an
// alignment pattern
fn locate_alignment_pattern(img: &mut BinaryImage, group: &FinderGroup, ver: Version, seed: Point) -> Option<Point> {
    let mod_area = group.module * group.module;
    let (ex, ey) = group.axes(ver);
    let mut tried = HashSet::new();

    // x & y increments w.r.t direction
    const DX: [i64; 4] = [1, 0, -1, 0];
    const DY: [i64; 4] = [0, -1, 0, 1];

    let (mut x, mut y) = (seed.x.floor() as i64, seed.y.floor() as i64);
    let mut dir = 0;
    let mut run_len = 1;

    while ((run_len * run_len) as f64) < mod_area * 64.0 {
        for _ in 0..run_len {
            if img.color(x, y) == Some(Color::Dark) {
                if let Some(reg) = img.region(x as u32, y as u32) {
                    let area = reg.area as f64;
                    if tried.insert(reg.id)
                        && (mod_area / 4.0..=mod_area * 2.0).contains(&area)
                        && is_alignment_centre(img, reg.centre, ex, ey)
                    {
                        return Some(reg.centre);
                    }
                }
            }
            x += DX[dir];
            y += DY[dir];
        }

        // Cycle direction
        dir = (dir + 1) & 3;
        if dir & 1 == 0 {
            run_len += 1;
        }
    }

    None
}

// Light ring at 1 module and dark ring at 2 modules from the centre, one miss tolerated
fn is_alignment_centre(img: &BinaryImage, centre: Point, ex: Point, ey: Point) -> bool {
    const RING: [(f64, f64); 8] =
        [(-1.0, -1.0), (0.0, -1.0), (1.0, -1.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (-1.0, 1.0), (-1.0, 0.0)];

    let misses = RING
        .iter()
        .flat_map(|&(dx, dy)| [(dx, dy, Color::Light), (dx * 2.0, dy * 2.0, Color::Dark)])
        .filter(|&(dx, dy, exp)| img.color_at_point(&(centre + ex * dx + ey * dy)) != exp)
        .count();
    misses <= 1
}

// Adjust the homography slightly to refine viewport of qr
fn jiggle_homography(img: &BinaryImage, mut h: Homography, ver: Version) -> Homography {
    let mut best = symbol_fitness(img, &h, ver);

    // Create an adjustment matrix by scaling the homography
    let mut adjustments = h.0.map(|x| x * 0.02);

    for _pass in 0..5 {
        for i in 0..16 {
            let j = i >> 1;
            let old = h.0[j];
            let step = adjustments[j];

            h.0[j] = if i & 1 == 0 { old - step } else { old + step };

            let test = symbol_fitness(img, &h, ver);
            if test > best {
                best = test
            } else {
                h.0[j] = old
            }
        }

        // Halve all adjustment steps
        adjustments = adjustments.map(|x| x * 0.5);
    }
    h
}

// Agreement of timing patterns and finder rings with the sampled image
fn symbol_fitness(img: &BinaryImage, h: &Homography, ver: Version) -> i32 {
    let w = ver.width() as i32;
    let mut score = 0;

    for i in 8..w - 8 {
        let exp = Color::from(i & 1 == 0);
        score += cell_fitness(img, h, 6, i, exp) + cell_fitness(img, h, i, 6, exp);
    }

    for (r, c) in [(3, 3), (3, w - 4), (w - 4, 3)] {
        score += ring_fitness(img, h, r, c, 0, Color::Dark)
            + ring_fitness(img, h, r, c, 1, Color::Dark)
            + ring_fitness(img, h, r, c, 2, Color::Light)
            + ring_fitness(img, h, r, c, 3, Color::Dark);
    }

    score
}

fn ring_fitness(img: &BinaryImage, h: &Homography, r: i32, c: i32, rad: i32, exp: Color) -> i32 {
    if rad == 0 {
        return cell_fitness(img, h, r, c, exp);
    }
    (-rad..rad)
        .map(|i| {
            cell_fitness(img, h, r - rad, c + i, exp)
                + cell_fitness(img, h, r + i + 1, c - rad, exp)
                + cell_fitness(img, h, r + rad, c - i, exp)
                + cell_fitness(img, h, r - i - 1, c + rad, exp)
        })
        .sum()
}

fn cell_fitness(img: &BinaryImage, h: &Homography, r: i32, c: i32, exp: Color) -> i32 {
    const OFFSETS: [f64; 3] = [0.3, 0.5, 0.7];
    let mut score = 0;
    for dy in OFFSETS {
        for dx in OFFSETS {
            let Ok(pt) = h.map(c as f64 + dx, r as f64 + dy) else { continue };
            score += if img.color_at_point(&pt) == exp { 1 } else { -1 };
        }
    }
    score
}

// Sampling, format & version info
//------------------------------------------------------------------------------

impl Symbol<'_> {
    pub fn version(&self) -> Version {
        self.ver
    }

    /// Color at the centre of module (r, c).
    pub fn is_dark(&self, r: i32, c: i32) -> bool {
        match self.h.map(c as f64 + 0.5, r as f64 + 0.5) {
            Ok(pt) => self.img.color_at_point(&pt) == Color::Dark,
            Err(_) => false,
        }
    }

    fn read_bits(&self, coords: &[(i32, i32)]) -> u32 {
        coords.iter().enumerate().fold(0, |bits, (i, &(r, c))| bits | ((self.is_dark(r, c) as u32) << i))
    }

    /// Error level and mask from the main copy, falling back to the copy split across the
    /// top right and bottom left finders.
    pub fn read_format_info(&self) -> QRResult<(ECLevel, MaskPattern)> {
        let w = self.ver.width() as i32;
        format_info_coords(w)
            .iter()
            .find_map(|coords| rectify_format_info(self.read_bits(coords) as u16))
            .map(|(ecl, mask)| (ecl, MaskPattern::new(mask)))
            .ok_or(QRError::InvalidFormatInfo)
    }

    pub fn read_version_info(&self) -> QRResult<Version> {
        let w = self.ver.width() as i32;
        version_info_coords(w)
            .iter()
            .find_map(|coords| rectify_version_info(self.read_bits(coords)))
            .ok_or(QRError::InvalidVersionInfo)
    }

    /// Demasked codewords read along the placement path, skipping function modules.
    pub fn extract_codewords(&self, ecl: ECLevel, mask: MaskPattern) -> Vec<u8> {
        let mut blank = QR::new(self.ver, ecl);
        blank.draw_all_function_patterns();

        let total_bits = self.ver.total_codewords() << 3;
        let mask_fn = mask.mask_function();
        let mut bits = BitStream::new(total_bits);

        for (r, c) in EncRegionIter::new(self.ver) {
            if bits.len() == total_bits {
                break;
            }
            if blank.get(r, c) != Module::Empty {
                continue;
            }
            bits.push(self.is_dark(r, c) ^ mask_fn(r, c));
        }

        bits.into_bytes()
    }
}
