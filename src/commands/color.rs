use std::path::Path;

use anyhow::{Context, Result};
use crewcert::services::image_assets::{UploadPolicy, extract_dominant_color, load_image_asset};
use tracing::info;

pub fn run(logo: &Path) -> Result<()> {
    let asset = load_image_asset(logo, &UploadPolicy::logo())
        .with_context(|| format!("Failed to load logo {}", logo.display()))?;
    let color = extract_dominant_color(&asset);
    info!("Extracted {} from {}", color, asset.name);
    println!("{color}");
    Ok(())
}
