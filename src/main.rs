// =============================================================================
// TRIANGLE RENDERER - entry point
// =============================================================================
//
// STARTUP:
// 1. Load config.toml (defaults if missing)
// 2. Initialize logging
// 3. init(): device -> window -> shaders -> vertex buffer -> pipeline -> queue
// 4. run(): one triangle per display refresh until the window closes
// 5. cleanup(): release everything in reverse order
//
// =============================================================================

use anyhow::{Context, Result};
use triangle_renderer::{logging, Config, RenderEngine, VulkanBackend};

fn main() -> Result<()> {
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    logging::init_logging(&config.debug);
    log::info!("Starting triangle renderer");
    if let Some(e) = config_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::debug!("Config: {:?}", config);
    log::info!("Present mode: {}", config.graphics.present_mode);

    let backend = VulkanBackend::new(&config);
    let mut engine = RenderEngine::new(backend).with_fps_reporting(config.debug.show_fps);

    // No degraded mode exists for a renderer without a device or shaders
    engine.init().context("Renderer setup failed")?;
    engine.run()?;
    engine.cleanup();

    log::info!("Cleanup complete");
    Ok(())
}
