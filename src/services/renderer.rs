use std::sync::Arc;

use tracing::debug;

use crate::models::{ParticipantRecord, ResolvedLogo, Rgba, TemplateState};
use crate::services::distance::format_distance;
use crate::services::scene::{
    CertificateDocument, ImageFit, NodeContent, NodeRole, Rect, SceneNode, TextAnchor, TextShadow,
    TextStyle, canonical_height,
};
use crate::services::template_editor::export_logo_font_size;

pub const DEFAULT_CANVAS_WIDTH: u32 = 800;
pub const DESCRIPTION_PLACEHOLDER: &str = "설명이 여기에 표시됩니다";
pub const OVERLAY_ALPHA: f32 = 0.4;

const PADDING: f32 = 48.0;
const LOGO_REGION_MIN_HEIGHT: f32 = 120.0;
const LINE_HEIGHT_RATIO: f32 = 1.2;
const CAPTION_GAP: f32 = 8.0;
const MAIN_BLOCK_GAP: f32 = 32.0;
const FOOTER_GAP: f32 = 16.0;
const DESCRIPTION_MARGIN: f32 = 16.0;

const CAPTION_SIZE: f32 = 18.0;
const NAME_SIZE: f32 = 48.0;
const RECORD_SIZE: f32 = 32.0;
const FOOTER_SIZE: f32 = 14.0;
const DESCRIPTION_SIZE: f32 = 12.0;
const DESCRIPTION_OPACITY: f32 = 0.8;
const LOGO_LETTER_SPACING: f32 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub canvas_width: u32,
    /// Family used for every caption and value except the runner name and the
    /// text logo.
    pub font_family: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            font_family: "sans-serif".to_string(),
        }
    }
}

/// Builds the scene graph for one participant. Pure: no I/O, no shared state.
#[derive(Debug, Clone, Default)]
pub struct CertificateRenderer {
    settings: RenderSettings,
}

struct TextBlock {
    role: NodeRole,
    text: String,
    lines: Vec<String>,
    style: TextStyle,
}

impl TextBlock {
    fn height(&self) -> f32 {
        self.lines.len() as f32 * self.style.line_height
    }

    fn into_node(self, rect: Rect, anchor: TextAnchor) -> SceneNode {
        SceneNode {
            role: self.role,
            rect: Rect {
                height: self.height(),
                ..rect
            },
            content: NodeContent::Text {
                text: self.text,
                lines: self.lines,
                style: self.style,
                anchor,
            },
        }
    }
}

impl CertificateRenderer {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn render(
        &self,
        participant: &ParticipantRecord,
        template: &TemplateState,
    ) -> CertificateDocument {
        let width = self.settings.canvas_width;
        let height = canonical_height(width);
        let canvas = Rect {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        };
        let content = Rect {
            x: PADDING,
            y: PADDING,
            width: (canvas.width - PADDING * 2.0).max(0.0),
            height: (canvas.height - PADDING * 2.0).max(0.0),
        };

        let mut nodes = Vec::with_capacity(16);
        nodes.push(SceneNode {
            role: NodeRole::Background,
            rect: canvas,
            content: NodeContent::Fill(template.background_color.rgba()),
        });
        if let Some(background) = &template.background_image {
            nodes.push(SceneNode {
                role: NodeRole::BackgroundImage,
                rect: canvas,
                content: NodeContent::Image {
                    asset: Arc::clone(background),
                    fit: ImageFit::Cover,
                },
            });
            nodes.push(SceneNode {
                role: NodeRole::Overlay,
                rect: canvas,
                content: NodeContent::Fill(Rgba::BLACK.with_alpha(OVERLAY_ALPHA)),
            });
        }

        let logo = self.logo_content(template, content);

        let runner_label = self.caption(
            NodeRole::RunnerLabel,
            "RUNNER",
            CAPTION_SIZE,
            500,
            content.width,
        );
        let runner_name = self.text_block(
            NodeRole::RunnerName,
            &participant.name,
            style("Arial, sans-serif", NAME_SIZE, 900, Rgba::WHITE),
            content.width,
        );
        let record_label = self.caption(
            NodeRole::RecordLabel,
            "RECORD",
            CAPTION_SIZE,
            500,
            content.width,
        );
        let record_value = self.text_block(
            NodeRole::RecordValue,
            &record_text(participant),
            style(&self.settings.font_family, RECORD_SIZE, 700, Rgba::WHITE),
            content.width,
        );

        let column_width = content.width / 2.0;
        let place_label = self.caption(
            NodeRole::PlaceLabel,
            "PLACE",
            FOOTER_SIZE,
            500,
            column_width,
        );
        let place_value = self.text_block(
            NodeRole::PlaceValue,
            &participant.place,
            style(&self.settings.font_family, FOOTER_SIZE, 400, Rgba::WHITE),
            column_width,
        );
        let date_label = self.caption(
            NodeRole::DateLabel,
            "DATE",
            FOOTER_SIZE,
            500,
            column_width,
        );
        let date_value = self.text_block(
            NodeRole::DateValue,
            &participant.date,
            style(&self.settings.font_family, FOOTER_SIZE, 400, Rgba::WHITE),
            column_width,
        );
        let description_text = if template.description.is_empty() {
            DESCRIPTION_PLACEHOLDER
        } else {
            template.description.as_str()
        };
        let description = self.text_block(
            NodeRole::Description,
            description_text,
            style(
                &self.settings.font_family,
                DESCRIPTION_SIZE,
                400,
                Rgba::WHITE.with_alpha(DESCRIPTION_OPACITY),
            ),
            content.width,
        );

        let logo_region_height = logo.height().max(LOGO_REGION_MIN_HEIGHT);
        let runner_height = runner_label.height() + CAPTION_GAP + runner_name.height();
        let record_height = record_label.height() + CAPTION_GAP + record_value.height();
        let main_height = runner_height + MAIN_BLOCK_GAP + record_height;
        let place_height = place_label.height() + place_value.height();
        let date_height = date_label.height() + date_value.height();
        let row_height = place_height.max(date_height);
        let footer_height = row_height + FOOTER_GAP + DESCRIPTION_MARGIN + description.height();

        // Space-between distribution; stacks from the top once it overflows.
        let free = content.height - (logo_region_height + main_height + footer_height);
        let gap = (free / 2.0).max(0.0);
        let logo_top = content.y;
        let main_top = logo_top + logo_region_height + gap;
        let footer_top = main_top + main_height + gap;
        debug!(
            "Certificate layout {}x{}: logo={:.1} main={:.1} footer={:.1} gap={:.1}",
            width, height, logo_region_height, main_height, footer_height, gap
        );

        nodes.push(logo.into_node(content, logo_top, logo_region_height));

        let full_row = |y: f32| Rect {
            x: content.x,
            y,
            width: content.width,
            height: 0.0,
        };
        let mut y = main_top;
        let runner_name_top = y + runner_label.height() + CAPTION_GAP;
        nodes.push(runner_label.into_node(full_row(y), TextAnchor::Middle));
        y = runner_name_top + runner_name.height() + MAIN_BLOCK_GAP;
        nodes.push(runner_name.into_node(full_row(runner_name_top), TextAnchor::Middle));

        let record_value_top = y + record_label.height() + CAPTION_GAP;
        nodes.push(record_label.into_node(full_row(y), TextAnchor::Middle));
        nodes.push(record_value.into_node(full_row(record_value_top), TextAnchor::Middle));

        let left_column = |y: f32| Rect {
            x: content.x,
            y,
            width: column_width,
            height: 0.0,
        };
        let right_column = |y: f32| Rect {
            x: content.x + column_width,
            y,
            width: column_width,
            height: 0.0,
        };
        let place_value_top = footer_top + place_label.height();
        let date_value_top = footer_top + date_label.height();
        nodes.push(place_label.into_node(left_column(footer_top), TextAnchor::Start));
        nodes.push(place_value.into_node(left_column(place_value_top), TextAnchor::Start));
        nodes.push(date_label.into_node(right_column(footer_top), TextAnchor::End));
        nodes.push(date_value.into_node(right_column(date_value_top), TextAnchor::End));

        let description_top = footer_top + row_height + FOOTER_GAP + DESCRIPTION_MARGIN;
        nodes.push(description.into_node(full_row(description_top), TextAnchor::Middle));

        CertificateDocument {
            width,
            height,
            nodes,
        }
    }

    fn caption(
        &self,
        role: NodeRole,
        text: &str,
        size: f32,
        weight: u16,
        max_width: f32,
    ) -> TextBlock {
        self.text_block(
            role,
            text,
            style(&self.settings.font_family, size, weight, Rgba::WHITE),
            max_width,
        )
    }

    fn text_block(
        &self,
        role: NodeRole,
        text: &str,
        style: TextStyle,
        max_width: f32,
    ) -> TextBlock {
        let lines = wrap_text(text, style.size, style.letter_spacing, max_width);
        TextBlock {
            role,
            text: text.to_string(),
            lines,
            style,
        }
    }

    fn logo_content(&self, template: &TemplateState, content: Rect) -> LogoContent {
        match template.resolved_logo() {
            ResolvedLogo::Image(asset) => {
                // Authored box, reclamped to the content area.
                let max_width = template.logo_size.width.min(content.width);
                let max_height = template.logo_size.height.min(content.height);
                let (width, height) =
                    contain_size(asset.width as f32, asset.height as f32, max_width, max_height);
                LogoContent::Image {
                    asset,
                    width,
                    height,
                }
            }
            ResolvedLogo::Text {
                text,
                font,
                font_size,
            } => {
                let mut logo_style = style(
                    &format!("{font}, sans-serif"),
                    export_logo_font_size(font_size),
                    700,
                    Rgba::WHITE,
                );
                logo_style.letter_spacing = LOGO_LETTER_SPACING;
                logo_style.shadow = Some(TextShadow {
                    dx: 2.0,
                    dy: 2.0,
                    blur: 4.0,
                    color: Rgba::BLACK.with_alpha(0.5),
                });
                LogoContent::Text(self.text_block(NodeRole::Logo, &text, logo_style, content.width))
            }
        }
    }
}

enum LogoContent {
    Image {
        asset: Arc<crate::models::ImageAsset>,
        width: f32,
        height: f32,
    },
    Text(TextBlock),
}

impl LogoContent {
    fn height(&self) -> f32 {
        match self {
            LogoContent::Image { height, .. } => *height,
            LogoContent::Text(block) => block.height(),
        }
    }

    /// Centers the logo horizontally in the content area and vertically in
    /// its region.
    fn into_node(self, content: Rect, region_top: f32, region_height: f32) -> SceneNode {
        let top = region_top + (region_height - self.height()) / 2.0;
        match self {
            LogoContent::Image {
                asset,
                width,
                height,
            } => SceneNode {
                role: NodeRole::Logo,
                rect: Rect {
                    x: content.center_x() - width / 2.0,
                    y: top,
                    width,
                    height,
                },
                content: NodeContent::Image {
                    asset,
                    fit: ImageFit::Contain,
                },
            },
            LogoContent::Text(block) => block.into_node(
                Rect {
                    x: content.x,
                    y: top,
                    width: content.width,
                    height: 0.0,
                },
                TextAnchor::Middle,
            ),
        }
    }
}

/// `"{distance} {time}"` with the distance normalized for display.
pub fn record_text(participant: &ParticipantRecord) -> String {
    format!("{} {}", format_distance(&participant.distance), participant.time)
}

/// Natural size scaled down (never up) to fit within the max box.
pub fn contain_size(width: f32, height: f32, max_width: f32, max_height: f32) -> (f32, f32) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (max_width / width).min(max_height / height).min(1.0).max(0.0);
    (width * scale, height * scale)
}

/// Approximate advance of `text` in pixels. Wide (CJK) characters take a full
/// em, Latin capitals and digits a bit over half.
pub fn estimate_text_width(text: &str, size: f32, letter_spacing: f32) -> f32 {
    text.chars()
        .map(|c| {
            let advance = if is_wide(c) {
                1.0
            } else if c == ' ' {
                0.3
            } else if c.is_ascii_uppercase() || c.is_ascii_digit() {
                0.62
            } else {
                0.52
            };
            advance * size + letter_spacing
        })
        .sum()
}

/// Greedy word wrap on the estimated width. Words wider than a line are
/// broken between characters. Always returns at least one line.
pub fn wrap_text(text: &str, size: f32, letter_spacing: f32, max_width: f32) -> Vec<String> {
    let fits = |candidate: &str| estimate_text_width(candidate, size, letter_spacing) <= max_width;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for c in word.chars() {
            current.push(c);
            if !fits(&current) && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x11FF
        | 0x2E80..=0x9FFF
        | 0xAC00..=0xD7AF
        | 0xF900..=0xFAFF
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6)
}

fn style(family: &str, size: f32, weight: u16, color: Rgba) -> TextStyle {
    TextStyle {
        family: family.to_string(),
        size,
        weight,
        color,
        letter_spacing: 0.0,
        line_height: size * LINE_HEIGHT_RATIO,
        shadow: None,
    }
}
