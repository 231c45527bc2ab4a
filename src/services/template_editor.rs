use std::sync::Arc;

use tracing::{debug, info};

use crate::models::{
    Bounds, DESCRIPTION_SOFT_CAP, HexColor, ImageAsset, LOGO_FONT_SIZE_RANGE, LogoAnchor,
    LogoPosition, LogoSize, ResolvedLogo, Rgba, TemplateState,
};

pub const MIN_LOGO_SIDE: f32 = 20.0;
pub const EXPORT_MIN_LOGO_FONT_SIZE: f32 = 24.0;
const ANCHOR_MARGIN: f32 = 20.0;

impl TemplateState {
    /// Image logo when one is uploaded, otherwise the generated text logo.
    pub fn resolved_logo(&self) -> ResolvedLogo {
        match &self.logo_image {
            Some(image) => ResolvedLogo::Image(Arc::clone(image)),
            None => ResolvedLogo::Text {
                text: self.logo_text.clone(),
                font: self.logo_font.clone(),
                font_size: self.logo_font_size,
            },
        }
    }

    /// Drag target clamped so the logo box stays inside `bounds`.
    pub fn move_logo(&mut self, position: LogoPosition, bounds: Bounds) {
        let max_x = (bounds.width - self.logo_size.width).max(0.0);
        let max_y = (bounds.height - self.logo_size.height).max(0.0);
        self.logo_position = LogoPosition {
            x: position.x.clamp(0.0, max_x),
            y: position.y.clamp(0.0, max_y),
        };
        debug!("Logo moved to {:?}", self.logo_position);
    }

    pub fn resize_logo(&mut self, size: LogoSize) {
        self.logo_size = LogoSize {
            width: size.width.max(MIN_LOGO_SIDE),
            height: size.height.max(MIN_LOGO_SIDE),
        };
        debug!("Logo resized to {:?}", self.logo_size);
    }

    pub fn anchor_logo(&mut self, anchor: LogoAnchor, bounds: Bounds) {
        let LogoSize { width, height } = self.logo_size;
        self.logo_position = match anchor {
            LogoAnchor::Top => LogoPosition {
                x: ANCHOR_MARGIN,
                y: ANCHOR_MARGIN,
            },
            LogoAnchor::Center => LogoPosition {
                x: (bounds.width - width) / 2.0,
                y: (bounds.height - height) / 2.0,
            },
            LogoAnchor::Bottom => LogoPosition {
                x: bounds.width - width - ANCHOR_MARGIN,
                y: bounds.height - height - ANCHOR_MARGIN,
            },
        };
    }

    pub fn set_logo_font_size(&mut self, size: f32) {
        let (min, max) = LOGO_FONT_SIZE_RANGE;
        self.logo_font_size = size.clamp(min, max);
    }

    pub fn set_logo_image(&mut self, image: ImageAsset) {
        info!("Logo image set to {}", image.name);
        self.logo_image = Some(Arc::new(image));
    }

    pub fn clear_logo_image(&mut self) {
        self.logo_image = None;
    }

    pub fn set_background_image(&mut self, image: ImageAsset) {
        info!("Background image set to {}", image.name);
        self.background_image = Some(Arc::new(image));
    }

    pub fn clear_background_image(&mut self) {
        self.background_image = None;
    }

    pub fn set_background_color(&mut self, color: HexColor) {
        self.background_color = color;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn description_chars(&self) -> usize {
        self.description.chars().count()
    }

    pub fn description_over_soft_cap(&self) -> bool {
        self.description_chars() > DESCRIPTION_SOFT_CAP
    }

    pub fn reset(&mut self) {
        *self = TemplateState::default();
    }
}

/// Text-logo size used by the live preview: shrinks to fit the logo box.
pub fn preview_logo_font_size(requested: f32, text: &str, size: LogoSize) -> f32 {
    let chars = text.chars().count().max(1) as f32;
    requested
        .min(size.width / chars * 1.5)
        .min(size.height * 0.7)
}

/// Text-logo size used for exported certificates. No box fitting.
pub fn export_logo_font_size(requested: f32) -> f32 {
    requested.max(EXPORT_MIN_LOGO_FONT_SIZE)
}

pub fn random_background_color() -> HexColor {
    HexColor::from(Rgba::rgb(fastrand::u8(..), fastrand::u8(..), fastrand::u8(..)))
}
