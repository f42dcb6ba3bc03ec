// =============================================================================
// VK-TRIANGLE
// =============================================================================
//
// FRAME FLOW:
// 1. Wait for the frame slot's fence
// 2. Acquire swapchain image
// 3. Submit the image's pre-recorded commands
// 4. Present
// 5. Pump window events
//
// Any failure ends the process with a non-zero exit status.
// =============================================================================

use anyhow::{Context, Result};
use vk_triangle::config::Config;
use vk_triangle::fs::{DiskFileSystem, FileSystem};
use vk_triangle::window::{Window, WinitWindow};
use vk_triangle::Renderer;

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    init_logging(&config);
    log::info!("Starting vk-triangle");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        config.window.title
    );

    run(&config).inspect_err(|e| log::error!("Fatal: {e:#}"))
}

/// `RUST_LOG` wins over the configured filter.
fn init_logging(config: &Config) {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or(&config.debug.log_filter)).init();
}

fn run(config: &Config) -> Result<()> {
    let file_system = create_file_system();
    let mut window = create_window(config)?;
    // Declared after the window: the renderer (and its surface) drops first.
    let mut renderer = create_renderer(file_system.as_ref(), window.as_ref(), config)?;

    while !window.should_close() {
        renderer.draw().context("Failed to draw frame")?;
        window.handle_events();
    }

    log::info!("Close requested, shutting down...");
    Ok(())
}

fn create_file_system() -> Box<dyn FileSystem> {
    Box::new(DiskFileSystem)
}

fn create_window(config: &Config) -> Result<Box<dyn Window>> {
    let window = WinitWindow::new(&config.window).context("Failed to create window")?;
    Ok(Box::new(window))
}

fn create_renderer(
    file_system: &dyn FileSystem,
    window: &dyn Window,
    config: &Config,
) -> Result<Renderer> {
    Renderer::new(file_system, window, config).context("Failed to initialize Vulkan")
}
