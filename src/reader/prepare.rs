use image::{imageops::FilterType, DynamicImage, GrayImage, Luma};

/// Largest dimension processed at full resolution, bigger inputs are downscaled.
pub const MAX_DIMENSION: u32 = 2048;

/// Luma of the image with transparent pixels composited over white.
pub fn prepare(img: &DynamicImage) -> GrayImage {
    let rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();

    let gray = GrayImage::from_fn(w, h, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
        let a = a as u32;
        Luma([((luma * a + 255 * (255 - a)) / 255) as u8])
    });

    let max_dim = w.max(h);
    if max_dim <= MAX_DIMENSION {
        return gray;
    }

    let scale = MAX_DIMENSION as f64 / max_dim as f64;
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    image::imageops::resize(&gray, nw, nh, FilterType::Triangle)
}
