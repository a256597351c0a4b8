use crate::builder::QR;

use super::ModuleStyle;

/// Light modules around the symbol on every side.
pub const QUIET_ZONE: usize = 4;

// Corner radius of rounded modules relative to the module edge
const MODULE_RADIUS: f64 = 0.35;
// Plate padding around the logo on each side, relative to the logo edge
const PLATE_PADDING: f64 = 0.15;
// Largest plate edge relative to the symbol edge, keeping the hidden area within what H recovers
const MAX_PLATE: f64 = 0.4;
// Corner radius of the logo plate relative to its edge
const PLATE_RADIUS: f64 = 0.15;
// Bezier handle length approximating a quarter circle
pub const KAPPA: f64 = 0.552_284_75;

// Shapes
//------------------------------------------------------------------------------

/// Dark module drawn at row `r`, column `c` of the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Square { r: usize, c: usize },
    /// Rounded corners flagged in `[top left, top right, bottom right, bottom left]` order.
    Rounded { r: usize, c: usize, corners: [bool; 4] },
    Dot { r: usize, c: usize },
}

impl Shape {
    pub fn cell(&self) -> (usize, usize) {
        match *self {
            Self::Square { r, c } | Self::Rounded { r, c, .. } | Self::Dot { r, c } => (r, c),
        }
    }
}

pub fn is_finder(r: usize, c: usize, w: usize) -> bool {
    (r < 7 && c < 7) || (r < 7 && c + 7 >= w) || (r + 7 >= w && c < 7)
}

/// Dark modules of the symbol in row-major order, styled. Finder patterns stay square.
pub fn layout(qr: &QR, style: ModuleStyle) -> Vec<Shape> {
    let w = qr.width();
    let dark = |r: isize, c: isize| {
        (0..w as isize).contains(&r) && (0..w as isize).contains(&c) && qr.is_dark(r as usize, c as usize)
    };

    let mut shapes = Vec::with_capacity(w * w / 2);
    for r in 0..w {
        for c in 0..w {
            if !qr.is_dark(r, c) {
                continue;
            }
            if is_finder(r, c, w) {
                shapes.push(Shape::Square { r, c });
                continue;
            }
            let shape = match style {
                ModuleStyle::Square => Shape::Square { r, c },
                ModuleStyle::Dots => Shape::Dot { r, c },
                ModuleStyle::Rounded => {
                    let (ri, ci) = (r as isize, c as isize);
                    let top = dark(ri - 1, ci);
                    let right = dark(ri, ci + 1);
                    let bottom = dark(ri + 1, ci);
                    let left = dark(ri, ci - 1);
                    let corners = [!top && !left, !top && !right, !bottom && !right, !bottom && !left];
                    Shape::Rounded { r, c, corners }
                }
            };
            shapes.push(shape);
        }
    }
    shapes
}

// Logo placement
//------------------------------------------------------------------------------

/// Square plate and logo box centered on the symbol, in module units from its top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogoPlacement {
    pub plate: f64,
    pub plate_origin: f64,
    pub plate_radius: f64,
    pub logo: f64,
    pub logo_origin: f64,
}

impl LogoPlacement {
    pub fn new(w: usize, logo_size: u8) -> Self {
        let target = w as f64 * logo_size as f64 / 100.0;
        // Keeps clear of the finders and their separators on both sides
        let max_plate = (w.saturating_sub(18).max(1) as f64).min(w as f64 * MAX_PLATE);
        let plate = (target * (1.0 + 2.0 * PLATE_PADDING)).min(max_plate);
        let logo = plate / (1.0 + 2.0 * PLATE_PADDING);
        Self {
            plate,
            plate_origin: (w as f64 - plate) / 2.0,
            plate_radius: plate * PLATE_RADIUS,
            logo,
            logo_origin: (w as f64 - logo) / 2.0,
        }
    }
}

// Outlines
//------------------------------------------------------------------------------

/// Drawing command of a closed outline in a y-down coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathOp {
    Move(f64, f64),
    Line(f64, f64),
    /// Quarter circle of radius `r` ending at `to`, with cubic Bezier handles.
    Arc { r: f64, ctrl1: (f64, f64), ctrl2: (f64, f64), to: (f64, f64) },
    Close,
}

/// Outline of an axis aligned rectangle with the flagged corners rounded by `radius`.
pub fn rounded_rect(x: f64, y: f64, w: f64, h: f64, radius: f64, corners: [bool; 4]) -> Vec<PathOp> {
    let [tl, tr, br, bl] = corners.map(|on| if on { radius } else { 0.0 });
    let (x1, y1) = (x + w, y + h);

    let mut path = Vec::with_capacity(10);
    path.push(PathOp::Move(x + tl, y));
    path.push(PathOp::Line(x1 - tr, y));
    path.extend(quarter_arc((x1 - tr, y), (x1, y), (x1, y + tr), tr));
    path.push(PathOp::Line(x1, y1 - br));
    path.extend(quarter_arc((x1, y1 - br), (x1, y1), (x1 - br, y1), br));
    path.push(PathOp::Line(x + bl, y1));
    path.extend(quarter_arc((x + bl, y1), (x, y1), (x, y1 - bl), bl));
    path.push(PathOp::Line(x, y + tl));
    path.extend(quarter_arc((x, y + tl), (x, y), (x + tl, y), tl));
    path.push(PathOp::Close);
    path
}

// Arc from `from` to `to` bending towards the rectangle corner it replaces
fn quarter_arc(from: (f64, f64), corner: (f64, f64), to: (f64, f64), r: f64) -> Option<PathOp> {
    if r <= 0.0 {
        return None;
    }
    let ctrl1 = (from.0 + KAPPA * (corner.0 - from.0), from.1 + KAPPA * (corner.1 - from.1));
    let ctrl2 = (to.0 + KAPPA * (corner.0 - to.0), to.1 + KAPPA * (corner.1 - to.1));
    Some(PathOp::Arc { r, ctrl1, ctrl2, to })
}

/// Outline of a rounded module in module units.
pub fn module_outline(r: usize, c: usize, corners: [bool; 4]) -> Vec<PathOp> {
    rounded_rect(c as f64, r as f64, 1.0, 1.0, MODULE_RADIUS, corners)
}

/// Outline of the logo plate in module units.
pub fn plate_outline(p: &LogoPlacement) -> Vec<PathOp> {
    rounded_rect(p.plate_origin, p.plate_origin, p.plate, p.plate, p.plate_radius, [true; 4])
}

// Coverage
//------------------------------------------------------------------------------

/// Whether point `(x, y)`, relative to the top left of a `w` x `h` box, lies inside the box
/// with the flagged corners rounded by `radius`.
pub fn rounded_rect_contains(x: f64, y: f64, w: f64, h: f64, radius: f64, corners: [bool; 4]) -> bool {
    if x < 0.0 || y < 0.0 || x > w || y > h {
        return false;
    }
    let (x1, y1) = (w - radius, h - radius);
    // Corner circle centres, each paired with whether the point lies in that corner's square
    let corner_zones = [
        ((radius, radius), x < radius && y < radius),
        ((x1, radius), x > x1 && y < radius),
        ((x1, y1), x > x1 && y > y1),
        ((radius, y1), x < radius && y > y1),
    ];
    corners.iter().zip(corner_zones).all(|(&on, ((cx, cy), in_zone))| {
        !on || !in_zone || (x - cx).powi(2) + (y - cy).powi(2) <= radius * radius
    })
}

/// Coverage test of a styled module, `(x, y)` in module units relative to its top left.
pub fn module_contains(shape: &Shape, x: f64, y: f64) -> bool {
    match *shape {
        Shape::Square { .. } => (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y),
        Shape::Rounded { corners, .. } => rounded_rect_contains(x, y, 1.0, 1.0, MODULE_RADIUS, corners),
        Shape::Dot { .. } => (x - 0.5).powi(2) + (y - 0.5).powi(2) <= 0.25,
    }
}

#[cfg(test)]
mod layout_tests {
    use test_case::test_case;

    use super::{is_finder, layout, rounded_rect, rounded_rect_contains, LogoPlacement, PathOp, Shape};
    use crate::builder::QRBuilder;
    use crate::render::ModuleStyle;

    #[test_case(0, 0, true)]
    #[test_case(6, 20, true)]
    #[test_case(20, 6, true)]
    #[test_case(20, 20, false)]
    #[test_case(7, 7, false)]
    #[test_case(3, 10, false)]
    fn test_is_finder(r: usize, c: usize, exp: bool) {
        assert_eq!(is_finder(r, c, 21), exp);
    }

    #[test_case(ModuleStyle::Square)]
    #[test_case(ModuleStyle::Rounded)]
    #[test_case(ModuleStyle::Dots)]
    fn test_layout_covers_dark_modules(style: ModuleStyle) {
        let qr = QRBuilder::new(b"layout").build().unwrap();
        let shapes = layout(&qr, style);
        assert_eq!(shapes.len(), qr.count_dark_modules());
        assert!(shapes.iter().all(|s| qr.is_dark(s.cell().0, s.cell().1)));
        assert!(shapes
            .iter()
            .filter(|s| is_finder(s.cell().0, s.cell().1, qr.width()))
            .all(|s| matches!(s, Shape::Square { .. })));
    }

    #[test]
    fn test_rounded_corner_rule() {
        let qr = QRBuilder::new(b"corners").build().unwrap();
        let w = qr.width();
        for shape in layout(&qr, ModuleStyle::Rounded) {
            if let Shape::Rounded { r, c, corners } = shape {
                let dark = |r: isize, c: isize| {
                    (0..w as isize).contains(&r) && (0..w as isize).contains(&c) && qr.is_dark(r as usize, c as usize)
                };
                let (r, c) = (r as isize, c as isize);
                assert_eq!(corners[0], !dark(r - 1, c) && !dark(r, c - 1));
                assert_eq!(corners[2], !dark(r + 1, c) && !dark(r, c + 1));
            }
        }
    }

    #[test]
    fn test_logo_placement() {
        let p = LogoPlacement::new(25, 20);
        assert!((p.logo - 5.0).abs() < 1e-9);
        assert!((p.plate - 6.5).abs() < 1e-9);
        assert!((p.plate_origin + p.plate / 2.0 - 12.5).abs() < 1e-9);

        // Clamped between the finders
        let p = LogoPlacement::new(21, 40);
        assert!((p.plate - 3.0).abs() < 1e-9);
        assert!(p.logo < p.plate);

        // Clamped to the recoverable share of the symbol
        let p = LogoPlacement::new(57, 40);
        assert!((p.plate - 22.8).abs() < 1e-9);
        assert!((p.logo - 22.8 / 1.3).abs() < 1e-9);
        assert!(LogoPlacement::new(57, 30).plate < p.plate);
    }

    #[test]
    fn test_rounded_rect_contains() {
        let all = [true; 4];
        assert!(rounded_rect_contains(0.5, 0.5, 1.0, 1.0, 0.35, all));
        assert!(!rounded_rect_contains(0.02, 0.02, 1.0, 1.0, 0.35, all));
        assert!(rounded_rect_contains(0.02, 0.02, 1.0, 1.0, 0.35, [false, true, true, true]));
        assert!(!rounded_rect_contains(0.98, 0.98, 1.0, 1.0, 0.35, all));
        assert!(!rounded_rect_contains(1.5, 0.5, 1.0, 1.0, 0.35, all));
    }

    #[test]
    fn test_rounded_rect_outline() {
        let square = rounded_rect(0.0, 0.0, 1.0, 1.0, 0.35, [false; 4]);
        assert_eq!(square.len(), 6);
        assert_eq!(square[0], PathOp::Move(0.0, 0.0));

        let round = rounded_rect(0.0, 0.0, 1.0, 1.0, 0.35, [true; 4]);
        assert_eq!(round.iter().filter(|op| matches!(op, PathOp::Arc { .. })).count(), 4);
        assert_eq!(round.last(), Some(&PathOp::Close));
    }
}
