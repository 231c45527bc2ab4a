use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::models::{
    DEFAULT_LOGO_FONT, DEFAULT_LOGO_FONT_SIZE, DEFAULT_LOGO_TEXT, HexColor, LOGO_FONTS,
    LogoPosition, LogoSize, TemplateState,
};
use crate::services::exporter::ExportSettings;
use crate::services::image_assets::{UploadPolicy, load_image_asset};
use crate::services::renderer::{DEFAULT_CANVAS_WIDTH, RenderSettings};

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    /// Relative paths are resolved against the config file's folder.
    #[serde(default)]
    pub logo_image: Option<PathBuf>,
    #[serde(default = "default_logo_text")]
    pub logo_text: String,
    #[serde(default = "default_logo_font")]
    pub logo_font: String,
    #[serde(default = "default_logo_font_size")]
    pub logo_font_size: f32,
    #[serde(default = "default_logo_position")]
    pub logo_position: LogoPosition,
    #[serde(default = "default_logo_size")]
    pub logo_size: LogoSize,
    #[serde(default)]
    pub background_color: HexColor,
    #[serde(default)]
    pub background_image: Option<PathBuf>,
    #[serde(default)]
    pub description: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            logo_image: None,
            logo_text: default_logo_text(),
            logo_font: default_logo_font(),
            logo_font_size: default_logo_font_size(),
            logo_position: default_logo_position(),
            logo_size: default_logo_size(),
            background_color: HexColor::default(),
            background_image: None,
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Relative to the working directory, not the config file.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_canvas_width")]
    pub canvas_width: u32,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Extra font folders loaded on top of the system fonts.
    #[serde(default)]
    pub font_dirs: Vec<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            canvas_width: default_canvas_width(),
            scale: default_scale(),
            batch_delay_ms: default_batch_delay_ms(),
            font_dirs: Vec::new(),
        }
    }
}

impl ExportConfig {
    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            scale: self.scale,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
        }
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            canvas_width: self.canvas_width,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CrewcertConfig {
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub export: ExportConfig,
    /// Folder the config was loaded from. Relative asset paths hang off it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_logo_text() -> String {
    DEFAULT_LOGO_TEXT.to_string()
}

fn default_logo_font() -> String {
    DEFAULT_LOGO_FONT.to_string()
}

fn default_logo_font_size() -> f32 {
    DEFAULT_LOGO_FONT_SIZE
}

fn default_logo_position() -> LogoPosition {
    TemplateState::default().logo_position
}

fn default_logo_size() -> LogoSize {
    TemplateState::default().logo_size
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("certificates")
}

fn default_canvas_width() -> u32 {
    DEFAULT_CANVAS_WIDTH
}

fn default_scale() -> f32 {
    2.0
}

fn default_batch_delay_ms() -> u64 {
    500
}

pub fn load_config(config_path: &Path) -> Result<CrewcertConfig> {
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    if !config_path.exists() {
        info!(
            "Config not found, using defaults: {}",
            config_path.display()
        );
        return Ok(CrewcertConfig {
            base_dir,
            ..Default::default()
        });
    }

    let raw = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config at {}", config_path.display()))?;

    let mut config = toml::from_str::<CrewcertConfig>(&raw)
        .with_context(|| format!("Failed to parse config at {}", config_path.display()))?;
    config.base_dir = base_dir;
    info!("Loaded config from {}", config_path.display());
    Ok(config)
}

impl CrewcertConfig {
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn font_dirs(&self) -> Vec<PathBuf> {
        self.export.font_dirs.iter().map(|dir| self.resolve(dir)).collect()
    }

    /// Template state with logo and background images loaded through the
    /// upload policy. Out-of-range values are clamped like editor input.
    pub fn build_template(&self) -> Result<TemplateState> {
        let config = &self.template;
        if !LOGO_FONTS.contains(&config.logo_font.as_str()) {
            warn!(
                "Logo font {} is not in the editor list, falling back to sans-serif if missing",
                config.logo_font
            );
        }
        let mut template = TemplateState {
            logo_text: config.logo_text.clone(),
            logo_font: config.logo_font.clone(),
            logo_position: config.logo_position,
            background_color: config.background_color,
            ..Default::default()
        };
        template.set_logo_font_size(config.logo_font_size);
        template.resize_logo(config.logo_size);
        template.set_description(config.description.clone());

        if let Some(path) = &config.logo_image {
            let path = self.resolve(path);
            let asset = load_image_asset(&path, &UploadPolicy::logo())
                .with_context(|| format!("Failed to load logo image {}", path.display()))?;
            template.set_logo_image(asset);
        }
        if let Some(path) = &config.background_image {
            let path = self.resolve(path);
            let asset = load_image_asset(&path, &UploadPolicy::background())
                .with_context(|| format!("Failed to load background image {}", path.display()))?;
            template.set_background_image(asset);
        }

        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::image_assets::tests::png_bytes;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("crewcert.toml")).unwrap();
        assert_eq!(config.export.canvas_width, 800);
        assert_eq!(config.export.scale, 2.0);
        assert_eq!(config.export.batch_delay_ms, 500);
        assert_eq!(config.export.output_dir, PathBuf::from("certificates"));
        assert_eq!(config.build_template().unwrap(), TemplateState::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crewcert.toml");
        fs::write(
            &path,
            r##"
[template]
logo_text = "RHC"
background_color = "#123"
description = "Test Crew"
logo_font_size = 100

[export]
batch_delay_ms = 0
"##,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.export.export_settings().batch_delay, Duration::ZERO);
        assert_eq!(config.export.render_settings().canvas_width, 800);

        let template = config.build_template().unwrap();
        assert_eq!(template.logo_text, "RHC");
        assert_eq!(template.background_color.to_string(), "#112233");
        assert_eq!(template.description, "Test Crew");
        assert_eq!(template.logo_font_size, 32.0);
        assert_eq!(template.logo_font, "Arial");
    }

    #[test]
    fn invalid_color_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crewcert.toml");
        fs::write(&path, "[template]\nbackground_color = \"blue\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config"));
    }

    #[test]
    fn images_resolve_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        fs::write(
            dir.path().join("assets/logo.png"),
            png_bytes(20, 10, [255, 255, 255, 255]),
        )
        .unwrap();
        fs::write(dir.path().join("assets/bg.png"), png_bytes(30, 40, [0, 0, 0, 255])).unwrap();
        let path = dir.path().join("crewcert.toml");
        fs::write(
            &path,
            "[template]\nlogo_image = \"assets/logo.png\"\nbackground_image = \"assets/bg.png\"\n",
        )
        .unwrap();

        let template = load_config(&path).unwrap().build_template().unwrap();
        let logo = template.logo_image.as_ref().unwrap();
        assert_eq!((logo.width, logo.height), (20, 10));
        assert_eq!(template.background_image.as_ref().unwrap().height, 40);
    }

    #[test]
    fn missing_image_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crewcert.toml");
        fs::write(&path, "[template]\nlogo_image = \"nope.png\"\n").unwrap();
        let err = load_config(&path).unwrap().build_template().unwrap_err();
        assert!(format!("{err:#}").contains("nope.png"));
    }
}
