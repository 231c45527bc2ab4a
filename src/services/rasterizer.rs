//! Paints a [`CertificateDocument`] into PNG bytes.
//!
//! The production path serializes the scene to SVG and hands it to resvg, so
//! text shaping and font fallback come from usvg and the loaded font database.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::tiny_skia;
use resvg::usvg::{Options, Tree, fontdb};
use tracing::{debug, info, warn};

use crate::errors::RasterError;
use crate::models::Rgba;
use crate::services::scene::{
    CertificateDocument, ImageFit, NodeContent, Rect, SceneNode, TextAnchor, TextStyle,
};

/// Encoded output of one rasterization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

pub trait Rasterizer: Send + Sync {
    /// Renders `document` at `scale` device pixels per canvas unit.
    fn rasterize(
        &self,
        document: &CertificateDocument,
        scale: f32,
    ) -> Result<RasterImage, RasterError>;
}

/// Pixel size of `document` at `scale`, or `InvalidCanvas` when it would be
/// empty.
pub fn scaled_size(document: &CertificateDocument, scale: f32) -> Result<(u32, u32), RasterError> {
    let invalid = RasterError::InvalidCanvas {
        width: document.width,
        height: document.height,
    };
    if !scale.is_finite() || scale <= 0.0 {
        return Err(invalid);
    }
    let width = (document.width as f32 * scale).round() as u32;
    let height = (document.height as f32 * scale).round() as u32;
    if width == 0 || height == 0 {
        return Err(invalid);
    }
    Ok((width, height))
}

pub struct SvgRasterizer {
    fontdb: Arc<fontdb::Database>,
}

impl SvgRasterizer {
    /// System fonts plus every font found under `font_dirs`.
    pub fn new(font_dirs: &[PathBuf]) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        for dir in font_dirs {
            if dir.is_dir() {
                db.load_fonts_dir(dir);
            } else {
                warn!("Font directory {} does not exist, skipping", dir.display());
            }
        }
        if db.is_empty() {
            warn!("No fonts found; certificate text will not be drawn");
        } else {
            info!("Loaded {} font faces", db.len());
        }
        Self { fontdb: Arc::new(db) }
    }

    pub fn font_count(&self) -> usize {
        self.fontdb.len()
    }
}

impl Rasterizer for SvgRasterizer {
    fn rasterize(
        &self,
        document: &CertificateDocument,
        scale: f32,
    ) -> Result<RasterImage, RasterError> {
        let (width, height) = scaled_size(document, scale)?;
        let svg = to_svg(document);

        let mut options = Options::default();
        options.font_family = "sans-serif".to_string();
        options.fontdb = Arc::clone(&self.fontdb);
        let tree = Tree::from_str(&svg, &options)
            .map_err(|err| RasterError::Scene(err.to_string()))?;

        let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or(RasterError::InvalidCanvas {
            width: document.width,
            height: document.height,
        })?;
        let transform = tiny_skia::Transform::from_scale(
            width as f32 / document.width as f32,
            height as f32 / document.height as f32,
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        let png = pixmap
            .encode_png()
            .map_err(|err| RasterError::Encode(err.to_string()))?;
        debug!("Rasterized {}x{} certificate, {} bytes", width, height, png.len());
        Ok(RasterImage { width, height, png })
    }
}

const SHADOW_FILTER_PREFIX: &str = "shadow";

/// SVG markup for the scene. Nodes keep their paint order; images are inlined
/// as data URIs so the markup is self-contained.
pub fn to_svg(document: &CertificateDocument) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" "#,
            r#"xmlns:xlink="http://www.w3.org/1999/xlink" "#,
            r#"width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        ),
        w = document.width,
        h = document.height,
    );

    let shadows: Vec<(usize, &TextStyle)> = document
        .nodes
        .iter()
        .enumerate()
        .filter_map(|(index, node)| match &node.content {
            NodeContent::Text { style, .. } if style.shadow.is_some() => Some((index, style)),
            _ => None,
        })
        .collect();
    if !shadows.is_empty() {
        out.push_str("<defs>");
        for (index, style) in shadows {
            if let Some(shadow) = style.shadow {
                let _ = write!(
                    out,
                    concat!(
                        r#"<filter id="{prefix}-{index}" "#,
                        r#"x="-20%" y="-20%" width="140%" height="140%">"#,
                        r#"<feDropShadow dx="{:.2}" dy="{:.2}" stdDeviation="{:.2}" "#,
                        r#"flood-color="{}" flood-opacity="{:.3}"/></filter>"#,
                    ),
                    shadow.dx,
                    shadow.dy,
                    shadow.blur / 2.0,
                    shadow.color.to_hex(),
                    shadow.color.opacity(),
                    prefix = SHADOW_FILTER_PREFIX,
                    index = index,
                );
            }
        }
        out.push_str("</defs>");
    }

    for (index, node) in document.nodes.iter().enumerate() {
        write_node(&mut out, index, node);
    }
    out.push_str("</svg>");
    out
}

fn write_node(out: &mut String, index: usize, node: &SceneNode) {
    let Rect {
        x,
        y,
        width,
        height,
    } = node.rect;
    match &node.content {
        NodeContent::Fill(color) => {
            let _ = write!(
                out,
                r#"<rect x="{x:.2}" y="{y:.2}" width="{width:.2}" height="{height:.2}" {}/>"#,
                paint("fill", *color),
            );
        }
        NodeContent::Image { asset, fit } => {
            let aspect = match fit {
                ImageFit::Contain => "xMidYMid meet",
                ImageFit::Cover => "xMidYMid slice",
            };
            let _ = write!(
                out,
                concat!(
                    r#"<image x="{x:.2}" y="{y:.2}" width="{width:.2}" height="{height:.2}" "#,
                    r#"preserveAspectRatio="{aspect}" xlink:href="data:{};base64,{}"/>"#,
                ),
                asset.mime,
                BASE64.encode(&asset.bytes),
                x = x,
                y = y,
                width = width,
                height = height,
                aspect = aspect,
            );
        }
        NodeContent::Text {
            lines,
            style,
            anchor,
            ..
        } => {
            let (text_x, text_anchor) = match anchor {
                TextAnchor::Start => (x, "start"),
                TextAnchor::Middle => (node.rect.center_x(), "middle"),
                TextAnchor::End => (node.rect.right(), "end"),
            };
            let filter = if style.shadow.is_some() {
                format!(r#" filter="url(#{SHADOW_FILTER_PREFIX}-{index})""#)
            } else {
                String::new()
            };
            let _ = write!(
                out,
                concat!(
                    r#"<g font-family="{}" font-size="{:.2}" font-weight="{}" "#,
                    r#"letter-spacing="{:.2}" text-anchor="{text_anchor}" {}{filter}>"#,
                ),
                escape_xml(&style.family),
                style.size,
                style.weight,
                style.letter_spacing,
                paint("fill", style.color),
                text_anchor = text_anchor,
                filter = filter,
            );
            // Baseline sits at roughly 80% of the em box, centered in the line.
            let leading = (style.line_height - style.size) / 2.0;
            for (line_index, line) in lines.iter().enumerate() {
                let baseline =
                    y + line_index as f32 * style.line_height + leading + style.size * 0.8;
                let _ = write!(
                    out,
                    r#"<text x="{text_x:.2}" y="{baseline:.2}">{}</text>"#,
                    escape_xml(line),
                );
            }
            out.push_str("</g>");
        }
    }
}

fn paint(attribute: &str, color: Rgba) -> String {
    if color.a == u8::MAX {
        format!(r#"{attribute}="{}""#, color.to_hex())
    } else {
        format!(
            r#"{attribute}="{}" {attribute}-opacity="{:.3}""#,
            color.to_hex(),
            color.opacity()
        )
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HexColor, ImageAsset, ParticipantRecord, TemplateState};
    use crate::services::image_assets::tests::png_bytes;
    use crate::services::renderer::CertificateRenderer;
    use crate::services::scene::NodeRole;

    fn participant(name: &str) -> ParticipantRecord {
        ParticipantRecord {
            id: "1".to_string(),
            name: name.to_string(),
            distance: "10".to_string(),
            time: "00:45:10".to_string(),
            date: "2025-01-01".to_string(),
            place: "Seoul".to_string(),
        }
    }

    #[test]
    fn svg_contains_all_text_and_escapes_it() {
        let template = TemplateState {
            logo_text: "R&H <Crew>".to_string(),
            description: "Test Crew".to_string(),
            ..Default::default()
        };
        let doc = CertificateRenderer::default().render(&participant("Kim \"Fast\""), &template);
        let svg = to_svg(&doc);

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains(r#"viewBox="0 0 800 1131""#));
        assert!(svg.contains("R&amp;H &lt;Crew&gt;"));
        assert!(svg.contains("Kim &quot;Fast&quot;"));
        assert!(svg.contains(">10K 00:45:10</text>"));
        assert!(svg.contains(">Test Crew</text>"));
        assert!(svg.contains("feDropShadow"));
        assert!(svg.contains(r#"filter="url(#shadow-1)""#));
    }

    #[test]
    fn overlay_and_background_image_are_serialized() {
        let background = crate::services::image_assets::image_asset_from_bytes(
            "bg.png",
            png_bytes(8, 4, [0, 128, 0, 255]),
        )
        .unwrap();
        let template = TemplateState {
            background_color: "#336699".parse::<HexColor>().unwrap(),
            background_image: Some(Arc::new(background)),
            ..Default::default()
        };
        let doc = CertificateRenderer::default().render(&participant("Kim"), &template);
        let svg = to_svg(&doc);

        assert!(svg.contains(r##"fill="#336699""##));
        assert!(svg.contains(r#"preserveAspectRatio="xMidYMid slice""#));
        assert!(svg.contains("data:image/png;base64,"));
        assert!(svg.contains(r#"fill-opacity="0.400""#));
    }

    #[test]
    fn image_logo_uses_contain() {
        let logo = ImageAsset {
            name: "logo.jpg".to_string(),
            mime: "image/jpeg".to_string(),
            width: 10,
            height: 10,
            bytes: vec![1, 2, 3],
        };
        let template = TemplateState {
            logo_image: Some(Arc::new(logo)),
            ..Default::default()
        };
        let doc = CertificateRenderer::default().render(&participant("Kim"), &template);
        assert!(doc.node(NodeRole::Logo).is_some());
        let svg = to_svg(&doc);
        assert!(svg.contains(r#"preserveAspectRatio="xMidYMid meet""#));
        assert!(svg.contains("data:image/jpeg;base64,AQID"));
        assert!(!svg.contains("feDropShadow"));
    }

    #[test]
    fn invalid_scale_is_rejected() {
        let doc =
            CertificateRenderer::default().render(&participant("Kim"), &TemplateState::default());
        assert!(matches!(scaled_size(&doc, 0.0), Err(RasterError::InvalidCanvas { .. })));
        assert!(matches!(scaled_size(&doc, f32::NAN), Err(RasterError::InvalidCanvas { .. })));
        assert_eq!(scaled_size(&doc, 2.0).unwrap(), (1600, 2262));
    }

    #[test]
    fn rasterizes_to_png_at_scale() {
        let rasterizer = SvgRasterizer::new(&[]);
        let doc =
            CertificateRenderer::default().render(&participant("Kim"), &TemplateState::default());
        let image = rasterizer.rasterize(&doc, 0.5).unwrap();
        assert_eq!((image.width, image.height), (400, 566));
        assert_eq!(&image.png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&image.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 566));
    }
}
