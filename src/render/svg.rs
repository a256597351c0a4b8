use std::fmt::Write;

use base64::{engine::general_purpose::STANDARD, Engine};

use super::{
    layout::{module_outline, plate_outline, PathOp, QUIET_ZONE},
    LogoPlacement, RenderError, RenderOptions, Rgba, Shape,
};

// Symbol coordinates scaled into the viewBox
#[derive(Debug, Clone, Copy)]
struct Scale {
    module: f64,
    origin: f64,
}

impl Scale {
    fn at(self, modules: f64) -> f64 {
        self.origin + modules * self.module
    }

    fn len(self, modules: f64) -> f64 {
        modules * self.module
    }
}

fn fill_attrs(color: Rgba) -> String {
    let mut attrs = format!(r##"fill="#{}""##, color.rgb_hex());
    if !color.is_opaque() {
        let _ = write!(attrs, r#" fill-opacity="{:.3}""#, color.opacity());
    }
    attrs
}

fn write_path(out: &mut String, ops: &[PathOp], sc: Scale) {
    for op in ops {
        let _ = match *op {
            PathOp::Move(x, y) => write!(out, "M{:.2} {:.2}", sc.at(x), sc.at(y)),
            PathOp::Line(x, y) => write!(out, "L{:.2} {:.2}", sc.at(x), sc.at(y)),
            PathOp::Arc { r, to, .. } => {
                let r = sc.len(r);
                write!(out, "A{r:.2} {r:.2} 0 0 1 {:.2} {:.2}", sc.at(to.0), sc.at(to.1))
            }
            PathOp::Close => write!(out, "Z"),
        };
    }
}

pub fn render_svg(
    w: usize,
    shapes: &[Shape],
    logo: Option<&LogoPlacement>,
    opts: &RenderOptions,
) -> Result<Vec<u8>, RenderError> {
    let size = opts.size;
    let module = size as f64 / (w + 2 * QUIET_ZONE) as f64;
    let sc = Scale { module, origin: QUIET_ZONE as f64 * module };

    // Writing into a String never fails
    let mut out = String::with_capacity(shapes.len() * 48 + 512);
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" version="1.1" width="{size}" height="{size}" viewBox="0 0 {size} {size}">"#
    );
    if opts.bg.a > 0 {
        let _ = writeln!(out, r#"<rect width="{size}" height="{size}" {}/>"#, fill_attrs(opts.bg));
    }

    let _ = writeln!(out, "<g {}>", fill_attrs(opts.fg));
    for shape in shapes {
        let (r, c) = shape.cell();
        let (x, y) = (sc.at(c as f64), sc.at(r as f64));
        let _ = match *shape {
            Shape::Square { .. } => {
                writeln!(out, r#"<rect x="{x:.2}" y="{y:.2}" width="{module:.2}" height="{module:.2}"/>"#)
            }
            Shape::Dot { .. } => {
                let half = module / 2.0;
                writeln!(out, r#"<circle cx="{:.2}" cy="{:.2}" r="{half:.2}"/>"#, x + half, y + half)
            }
            Shape::Rounded { corners, .. } => {
                out.push_str(r#"<path d=""#);
                write_path(&mut out, &module_outline(r, c, corners), sc);
                writeln!(out, r#""/>"#)
            }
        };
    }
    out.push_str("</g>\n");

    if let (Some(place), Some(logo)) = (logo, opts.logo.as_ref()) {
        out.push_str("<path ");
        out.push_str(&fill_attrs(opts.bg));
        out.push_str(r#" d=""#);
        write_path(&mut out, &plate_outline(place), sc);
        out.push_str("\"/>\n");

        let side = sc.len(place.logo);
        let png = logo.fitted_png(side.round().max(1.0) as u32)?;
        let at = sc.at(place.logo_origin);
        let _ = writeln!(
            out,
            r#"<image x="{at:.2}" y="{at:.2}" width="{side:.2}" height="{side:.2}" preserveAspectRatio="xMidYMid meet" href="data:image/png;base64,{}"/>"#,
            STANDARD.encode(png)
        );
    }

    out.push_str("</svg>\n");
    Ok(out.into_bytes())
}

#[cfg(test)]
mod svg_tests {
    use crate::builder::QRBuilder;
    use crate::render::{render, ModuleStyle, OutputFormat, RenderOptions, Rgba};

    fn svg(style: ModuleStyle, fg: Rgba, bg: Rgba) -> String {
        let qr = QRBuilder::new(b"vector").build().unwrap();
        let opts = RenderOptions { format: OutputFormat::Svg, style, fg, bg, size: 290, ..Default::default() };
        String::from_utf8(render(&qr, &opts).unwrap().bytes).unwrap()
    }

    #[test]
    fn test_svg_document() {
        let doc = svg(ModuleStyle::Square, Rgba::BLACK, Rgba::WHITE);
        assert!(doc.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(doc.contains(r#"viewBox="0 0 290 290""#));
        assert!(doc.contains(r##"<g fill="#000000">"##));
        // Top left finder corner sits after the 4 module quiet zone, 10 units per module
        assert!(doc.contains(r#"<rect x="40.00" y="40.00" width="10.00" height="10.00"/>"#));
        assert!(doc.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_svg_styles() {
        let dots = svg(ModuleStyle::Dots, Rgba::BLACK, Rgba::WHITE);
        assert!(dots.contains("<circle "));
        let rounded = svg(ModuleStyle::Rounded, Rgba::BLACK, Rgba::WHITE);
        assert!(rounded.contains("<path d=\"M"));
        // Finder modules stay square in every style
        assert!(rounded.contains(r#"<rect x="40.00" y="40.00""#));
    }

    #[test]
    fn test_svg_transparency() {
        let doc = svg(ModuleStyle::Square, Rgba { r: 0, g: 0, b: 0, a: 128 }, Rgba { r: 255, g: 255, b: 255, a: 0 });
        assert!(doc.contains(r#"fill-opacity="0.502""#));
        assert!(!doc.contains("<rect width="));
    }
}
