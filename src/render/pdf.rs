use printpdf::{
    Color, LinePoint, Mm, Op, PaintMode, PdfDocument, PdfPage, PdfSaveOptions, Point, Polygon, PolygonRing, Pt,
    RawImage, RawImageData, RawImageFormat, Rect, Rgb, WindingOrder, XObjectTransform,
};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{
    layout::{module_outline, plate_outline, rounded_rect, PathOp, QUIET_ZONE},
    LogoPlacement, RenderOptions, Rgba, Shape,
};

// Embedded logo resolution is capped to keep documents small
const MAX_LOGO_PX: u32 = 256;

// Line segments standing in for each quarter circle
const ARC_SEGMENTS: u32 = 8;

// Page coordinates in points with the origin at the bottom left, y flipped from layout space
#[derive(Debug, Clone, Copy)]
struct Page {
    size: f64,
    module: f64,
    origin: f64,
}

impl Page {
    fn x(self, modules: f64) -> f64 {
        self.origin + modules * self.module
    }

    fn y(self, modules: f64) -> f64 {
        self.size - (self.origin + modules * self.module)
    }

    fn point(self, (x, y): (f64, f64)) -> LinePoint {
        LinePoint { p: Point { x: Pt(self.x(x) as f32), y: Pt(self.y(y) as f32) }, bezier: false }
    }
}

fn fill(color: Rgba) -> Op {
    let [r, g, b] = color.unit_rgb().map(|c| c as f32);
    Op::SetFillColor { col: Color::Rgb(Rgb::new(r, g, b, None)) }
}

fn filled_rect(x: f64, y: f64, w: f64, h: f64) -> Op {
    let mut rectangle = Rect::from_xywh(Pt(x as f32), Pt(y as f32), Pt(w as f32), Pt(h as f32));
    rectangle.mode = Some(PaintMode::Fill);
    rectangle.winding_order = Some(WindingOrder::NonZero);
    Op::DrawRectangle { rectangle }
}

fn cubic(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), p3: (f64, f64), t: f64) -> (f64, f64) {
    let u = 1.0 - t;
    let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
    (a * p0.0 + b * p1.0 + c * p2.0 + d * p3.0, a * p0.1 + b * p1.1 + c * p2.1 + d * p3.1)
}

/// Filled polygon tracing `ops`, with every arc flattened to line segments.
fn polygon(ops: &[PathOp], pg: Page) -> Op {
    let mut rings = Vec::new();
    let mut points = Vec::new();
    let mut cur = (0.0, 0.0);

    for op in ops {
        match *op {
            PathOp::Move(x, y) => {
                if !points.is_empty() {
                    rings.push(PolygonRing { points: std::mem::take(&mut points) });
                }
                cur = (x, y);
                points.push(pg.point(cur));
            }
            PathOp::Line(x, y) => {
                cur = (x, y);
                points.push(pg.point(cur));
            }
            PathOp::Arc { ctrl1, ctrl2, to, .. } => {
                for i in 1..=ARC_SEGMENTS {
                    let t = i as f64 / ARC_SEGMENTS as f64;
                    points.push(pg.point(cubic(cur, ctrl1, ctrl2, to, t)));
                }
                cur = to;
            }
            PathOp::Close => {}
        }
    }
    if !points.is_empty() {
        rings.push(PolygonRing { points });
    }

    Op::DrawPolygon { polygon: Polygon { rings, mode: PaintMode::Fill, winding_order: WindingOrder::NonZero } }
}

// Logo flattened onto the plate color as raw 8 bit RGB rows
fn logo_image(opts: &RenderOptions, side: f64) -> Option<RawImage> {
    let logo = opts.logo.as_ref()?;
    let px = (side.round() as u32).clamp(1, MAX_LOGO_PX);
    let img = logo.fitted(px).to_rgba8();
    let [br, bg, bb] = [opts.bg.r, opts.bg.g, opts.bg.b].map(u32::from);

    let mut rgb = Vec::with_capacity((img.width() * img.height() * 3) as usize);
    for p in img.pixels() {
        let [r, g, b, a] = p.0.map(u32::from);
        let blend = |c: u32, under: u32| ((c * a + under * (255 - a)) / 255) as u8;
        rgb.extend([blend(r, br), blend(g, bg), blend(b, bb)]);
    }
    Some(RawImage {
        pixels: RawImageData::U8(rgb),
        width: img.width() as usize,
        height: img.height() as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    })
}

/// Single page PDF with the symbol drawn as vector shapes, `size` points square.
pub fn render_pdf(w: usize, shapes: &[Shape], logo: Option<&LogoPlacement>, opts: &RenderOptions) -> Vec<u8> {
    let size = opts.size as f64;
    let module = size / (w + 2 * QUIET_ZONE) as f64;
    let pg = Page { size, module, origin: QUIET_ZONE as f64 * module };

    let mut doc = PdfDocument::new("QR Code");
    let mut ops = Vec::with_capacity(shapes.len() + 8);
    ops.push(Op::SetOutlineThickness { pt: Pt(0.0) });
    if opts.bg.a > 0 {
        ops.push(fill(opts.bg));
        ops.push(filled_rect(0.0, 0.0, size, size));
    }

    ops.push(fill(opts.fg));
    for shape in shapes {
        let (r, c) = shape.cell();
        ops.push(match *shape {
            Shape::Square { .. } => filled_rect(pg.x(c as f64), pg.y(r as f64 + 1.0), module, module),
            Shape::Rounded { corners, .. } => polygon(&module_outline(r, c, corners), pg),
            Shape::Dot { .. } => polygon(&rounded_rect(c as f64, r as f64, 1.0, 1.0, 0.5, [true; 4]), pg),
        });
    }

    if let Some(place) = logo {
        ops.push(fill(opts.bg));
        ops.push(polygon(&plate_outline(place), pg));

        let side = place.logo * module;
        if let Some(image) = logo_image(opts, side) {
            // Fit the image box inside the logo square, centered
            let scale = side / image.width.max(image.height) as f64;
            let (dw, dh) = (image.width as f64 * scale, image.height as f64 * scale);
            let x = pg.x(place.logo_origin) + (side - dw) / 2.0;
            let y = pg.y(place.logo_origin + place.logo) + (side - dh) / 2.0;
            let id = doc.add_image(&image);
            // At 72 dpi one image pixel spans one point before scaling
            let transform = XObjectTransform {
                translate_x: Some(Pt(x as f32)),
                translate_y: Some(Pt(y as f32)),
                scale_x: Some(scale as f32),
                scale_y: Some(scale as f32),
                dpi: Some(72.0),
                ..Default::default()
            };
            ops.push(Op::UseXobject { id, transform });
        }
    }

    let page_size: Mm = Pt(size as f32).into();
    doc.pages.push(PdfPage::new(page_size, page_size, ops));

    let mut warnings = Vec::new();
    let mut bytes = doc.save(&PdfSaveOptions { optimize: false, ..Default::default() }, &mut warnings);
    if !warnings.is_empty() {
        debug!(count = warnings.len(), "PDF writer warnings");
    }
    pin_random_ids(&mut bytes);
    bytes
}

// Random ids
//------------------------------------------------------------------------------

/// printpdf draws fresh random names for image XObjects and the trailer `/ID` on every
/// save. Rewrites them in place, keeping lengths so the xref offsets stay valid.
fn pin_random_ids(doc: &mut [u8]) {
    for (n, name) in xobject_names(doc).into_iter().enumerate() {
        let mut pinned = format!("Im{}", n + 1).into_bytes();
        pinned.resize(name.len(), b'0');
        pinned.truncate(name.len());
        replace_all(doc, &name, &pinned);
    }

    let Some(start) = doc.windows(3).rposition(|w| w == b"/ID") else { return };
    let Some(len) = doc[start..].iter().position(|&b| b == b']') else { return };
    let region = start + 3..start + len;

    let mut masked = doc.to_vec();
    masked[region.clone()].fill(b'0');
    let digest = Sha256::digest(&masked);
    let mut hex = digest.iter().flat_map(|b| [b >> 4, b & 0xf]).cycle();

    for b in &mut doc[region] {
        if b.is_ascii_alphanumeric() {
            let nibble = hex.next().unwrap_or(0);
            *b = if b.is_ascii_hexdigit() {
                b"0123456789abcdef"[nibble as usize]
            } else {
                b'g' + nibble
            };
        }
    }
}

// Names painted with `Do` in the page content, in order of first use
fn xobject_names(doc: &[u8]) -> Vec<Vec<u8>> {
    let mut names: Vec<Vec<u8>> = Vec::new();
    let mut from = 0;
    while let Some(at) = find(&doc[from..], b" Do").map(|i| i + from) {
        from = at + 3;
        let Some(slash) = doc[..at].iter().rposition(|&b| b == b'/') else { continue };
        let name = &doc[slash + 1..at];
        if !name.is_empty() && name.iter().all(u8::is_ascii_alphanumeric) && !names.iter().any(|n| n == name) {
            names.push(name.to_vec());
        }
    }
    names
}

fn find(hay: &[u8], needle: &[u8]) -> Option<usize> {
    hay.windows(needle.len()).position(|w| w == needle)
}

fn replace_all(hay: &mut [u8], from: &[u8], to: &[u8]) {
    let mut i = 0;
    while i + from.len() <= hay.len() {
        if &hay[i..i + from.len()] == from {
            hay[i..i + from.len()].copy_from_slice(to);
            i += from.len();
        } else {
            i += 1;
        }
    }
}
