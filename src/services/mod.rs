pub mod config_loader;
pub mod csv_importer;
pub mod distance;
pub mod exporter;
pub mod image_assets;
pub mod rasterizer;
pub mod registry;
pub mod renderer;
pub mod scene;
pub mod template_editor;
