//! In-memory scene graph for one certificate.
//!
//! The renderer only decides *what* goes *where*; a [`crate::services::rasterizer::Rasterizer`]
//! turns the nodes into pixels. Coordinates are in canvas units (1x), with the
//! origin at the top-left corner.

use std::sync::Arc;

use crate::models::{ImageAsset, Rgba};

pub const A4_WIDTH_RATIO: u32 = 210;
pub const A4_HEIGHT_RATIO: u32 = 297;

/// Height matching `width` in A-series page proportions.
pub fn canonical_height(width: u32) -> u32 {
    (width as f64 * A4_HEIGHT_RATIO as f64 / A4_WIDTH_RATIO as f64).round() as u32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right() + f32::EPSILON
            && other.bottom() <= self.bottom() + f32::EPSILON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Background,
    BackgroundImage,
    Overlay,
    Logo,
    RunnerLabel,
    RunnerName,
    RecordLabel,
    RecordValue,
    PlaceLabel,
    PlaceValue,
    DateLabel,
    DateValue,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFit {
    /// Scale to fit inside the rect, keeping aspect ratio.
    Contain,
    /// Scale to fill the rect, cropping the overflow around the center.
    Cover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextShadow {
    pub dx: f32,
    pub dy: f32,
    pub blur: f32,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub family: String,
    pub size: f32,
    pub weight: u16,
    pub color: Rgba,
    pub letter_spacing: f32,
    pub line_height: f32,
    pub shadow: Option<TextShadow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeContent {
    Fill(Rgba),
    Image {
        asset: Arc<ImageAsset>,
        fit: ImageFit,
    },
    Text {
        /// The value as given, before wrapping.
        text: String,
        lines: Vec<String>,
        style: TextStyle,
        anchor: TextAnchor,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub role: NodeRole,
    pub rect: Rect,
    pub content: NodeContent,
}

/// Fixed-size composition for one participant. Nodes are painted in order.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateDocument {
    pub width: u32,
    pub height: u32,
    pub nodes: Vec<SceneNode>,
}

impl CertificateDocument {
    pub fn bounds(&self) -> Rect {
        Rect {
            x: 0.0,
            y: 0.0,
            width: self.width as f32,
            height: self.height as f32,
        }
    }

    pub fn node(&self, role: NodeRole) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.role == role)
    }

    pub fn text(&self, role: NodeRole) -> Option<&str> {
        match &self.node(role)?.content {
            NodeContent::Text { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn has_overlay(&self) -> bool {
        self.node(NodeRole::Overlay).is_some()
    }

    /// Flat color painted under everything else.
    pub fn background_color(&self) -> Rgba {
        match self.node(NodeRole::Background).map(|node| &node.content) {
            Some(NodeContent::Fill(color)) => *color,
            _ => Rgba::BLACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_height_uses_a4_ratio() {
        assert_eq!(canonical_height(800), 1131);
        assert_eq!(canonical_height(210), 297);
        assert_eq!(canonical_height(420), 594);
    }

    #[test]
    fn rect_containment() {
        let outer = Rect {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
        };
        let inner = Rect {
            x: 10.0,
            y: 10.0,
            width: 90.0,
            height: 20.0,
        };
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }
}
