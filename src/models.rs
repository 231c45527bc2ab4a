use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{self, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{ColorError, EntryError};

pub const DEFAULT_DISTANCE: &str = "10K";
pub const DEFAULT_DATE: &str = "2025-09-13";
pub const DEFAULT_PLACE: &str = "KOREA";

pub const DEFAULT_LOGO_TEXT: &str = "RUNNING CREW";
pub const DEFAULT_LOGO_FONT: &str = "Arial";
pub const DEFAULT_LOGO_FONT_SIZE: f32 = 24.0;
pub const LOGO_FONT_SIZE_RANGE: (f32, f32) = (12.0, 32.0);
pub const DEFAULT_BACKGROUND_COLOR: &str = "#000000";
pub const DESCRIPTION_SOFT_CAP: usize = 200;

/// Fonts offered by the logo editor.
pub const LOGO_FONTS: [&str; 8] = [
    "Arial",
    "Arial Black",
    "Helvetica",
    "Impact",
    "Times New Roman",
    "Georgia",
    "Courier New",
    "Verdana",
];

pub trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ParticipantRecord {
    pub id: String,
    pub name: String,
    pub distance: String,
    pub time: String,
    pub date: String,
    pub place: String,
}

impl HasId for ParticipantRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

impl ParticipantRecord {
    /// Name and time must be non-blank for a record to enter the registry.
    pub fn validate(&self) -> Result<(), EntryError> {
        validate_entry(&self.name, &self.time)
    }
}

fn validate_entry(name: &str, time: &str) -> Result<(), EntryError> {
    if name.trim().is_empty() {
        return Err(EntryError::MissingName);
    }
    if time.trim().is_empty() {
        return Err(EntryError::MissingTime);
    }
    Ok(())
}

/// Unvalidated manual entry. Defaults match the entry form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantDraft {
    pub name: String,
    pub distance: String,
    pub time: String,
    pub date: String,
    pub place: String,
}

impl Default for ParticipantDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            distance: DEFAULT_DISTANCE.to_string(),
            time: String::new(),
            date: DEFAULT_DATE.to_string(),
            place: DEFAULT_PLACE.to_string(),
        }
    }
}

impl ParticipantDraft {
    pub fn validate(&self) -> Result<(), EntryError> {
        validate_entry(&self.name, &self.time)
    }

    pub fn into_record(self, id: String) -> Result<ParticipantRecord, EntryError> {
        self.validate()?;
        Ok(ParticipantRecord {
            id,
            name: self.name,
            distance: self.distance,
            time: self.time,
            date: self.date,
            place: self.place,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }

    pub fn opacity(&self) -> f32 {
        self.a as f32 / 255.0
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A validated `#rrggbb` color as typed into the color picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(Rgba);

impl HexColor {
    pub fn rgba(&self) -> Rgba {
        self.0
    }
}

impl Default for HexColor {
    fn default() -> Self {
        HexColor(Rgba::BLACK)
    }
}

impl From<Rgba> for HexColor {
    fn from(value: Rgba) -> Self {
        HexColor(Rgba { a: 255, ..value })
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ColorError::InvalidHex(s.to_string());
        let digits = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return Err(invalid()),
        };
        let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| invalid());
        Ok(HexColor(Rgba::rgb(channel(0)?, channel(2)?, channel(4)?)))
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

impl Serialize for HexColor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct LogoPosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct LogoSize {
    pub width: f32,
    pub height: f32,
}

/// Size of the area the logo may be dragged around in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

/// Quick placements offered next to the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoAnchor {
    Top,
    Center,
    Bottom,
}

/// A decoded upload kept in an encoding the rasterizer can embed.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub name: String,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateState {
    pub logo_image: Option<Arc<ImageAsset>>,
    pub logo_text: String,
    pub logo_font: String,
    pub logo_font_size: f32,
    pub logo_position: LogoPosition,
    pub logo_size: LogoSize,
    pub background_color: HexColor,
    pub background_image: Option<Arc<ImageAsset>>,
    pub description: String,
}

impl Default for TemplateState {
    fn default() -> Self {
        Self {
            logo_image: None,
            logo_text: DEFAULT_LOGO_TEXT.to_string(),
            logo_font: DEFAULT_LOGO_FONT.to_string(),
            logo_font_size: DEFAULT_LOGO_FONT_SIZE,
            logo_position: LogoPosition { x: 20.0, y: 20.0 },
            logo_size: LogoSize {
                width: 120.0,
                height: 120.0,
            },
            background_color: HexColor::default(),
            background_image: None,
            description: String::new(),
        }
    }
}

/// What the renderer draws in the logo region.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedLogo {
    Image(Arc<ImageAsset>),
    Text {
        text: String,
        font: String,
        font_size: f32,
    },
}
