use std::io::Cursor;

use image::{imageops, ImageFormat, RgbaImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

use super::{
    layout::{module_contains, rounded_rect_contains, QUIET_ZONE},
    LogoPlacement, RenderError, RenderOptions, Shape,
};

/// Pixel grid of a rendered symbol: module edge and the offset of the symbol's top left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub canvas: u32,
    pub module: u32,
    pub origin: u32,
}

impl Grid {
    pub fn new(w: usize, size: u32) -> Self {
        let span = (w + 2 * QUIET_ZONE) as u32;
        let canvas = size.max(span);
        let module = (canvas / span).max(1);
        let origin = (canvas - module * w as u32) / 2;
        Self { canvas, module, origin }
    }

    fn to_px(self, modules: f64) -> u32 {
        (self.origin as f64 + modules * self.module as f64).round() as u32
    }
}

pub fn render_png(
    w: usize,
    shapes: &[Shape],
    logo: Option<&LogoPlacement>,
    opts: &RenderOptions,
) -> Result<Vec<u8>, RenderError> {
    let grid = Grid::new(w, opts.size);
    let mut img = RgbaImage::from_pixel(grid.canvas, grid.canvas, opts.bg.to_pixel());
    let fg = opts.fg.to_pixel();
    let m = grid.module;

    for shape in shapes {
        let (r, c) = shape.cell();
        let (x0, y0) = (grid.origin + c as u32 * m, grid.origin + r as u32 * m);
        match shape {
            Shape::Square { .. } => draw_filled_rect_mut(&mut img, Rect::at(x0 as i32, y0 as i32).of_size(m, m), fg),
            _ => {
                for dy in 0..m {
                    for dx in 0..m {
                        let (x, y) = ((dx as f64 + 0.5) / m as f64, (dy as f64 + 0.5) / m as f64);
                        if module_contains(shape, x, y) {
                            img.put_pixel(x0 + dx, y0 + dy, fg);
                        }
                    }
                }
            }
        }
    }

    if let (Some(place), Some(logo)) = (logo, opts.logo.as_ref()) {
        draw_plate(&mut img, grid, place, opts);

        let side = ((place.logo * m as f64).round() as u32).max(1);
        let fitted = logo.fitted(side).to_rgba8();
        let x = grid.to_px(place.logo_origin) + (side - fitted.width().min(side)) / 2;
        let y = grid.to_px(place.logo_origin) + (side - fitted.height().min(side)) / 2;
        imageops::overlay(&mut img, &fitted, x as i64, y as i64);
    }

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

// Clears the modules under the logo with a rounded plate in the background color
fn draw_plate(img: &mut RgbaImage, grid: Grid, place: &LogoPlacement, opts: &RenderOptions) {
    let bg = opts.bg.to_pixel();
    let start = grid.to_px(place.plate_origin);
    let side = (place.plate * grid.module as f64).round() as u32;
    let radius = place.plate_radius * grid.module as f64;

    for dy in 0..side {
        for dx in 0..side {
            let (x, y) = (dx as f64 + 0.5, dy as f64 + 0.5);
            if rounded_rect_contains(x, y, side as f64, side as f64, radius, [true; 4]) {
                img.put_pixel(start + dx, start + dy, bg);
            }
        }
    }
}
