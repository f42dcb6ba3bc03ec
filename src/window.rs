// Window collaborator
//
// The renderer needs very little from the window system: the instance
// extensions required to present into it, a surface, and its pixel size.
// The main loop additionally polls it for a close request.
//
// winit is driven in "pump" mode so the loop stays a plain
// `while !window.should_close()` instead of an inverted callback flow.

use crate::config::WindowConfig;
use crate::error::{Error, Result};
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::CStr;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window as WinitHandle, WindowAttributes, WindowId},
};

pub trait Window {
    fn should_close(&self) -> bool;

    /// Dispatch pending platform events without blocking.
    fn handle_events(&mut self);

    /// Instance extensions Vulkan must enable to draw into this window.
    fn required_instance_extensions(&self) -> Result<Vec<&'static CStr>>;

    /// Create a presentation surface on `instance`. The caller owns it.
    fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance)
        -> Result<vk::SurfaceKHR>;

    /// Size in pixels.
    fn size(&self) -> (u32, u32);
}

/// Event-handler half of the winit window; receives callbacks while pumping.
struct WindowState {
    attributes: WindowAttributes,
    window: Option<WinitHandle>,
    close_requested: bool,
    error: Option<Error>,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        event_loop.set_control_flow(ControlFlow::Poll);
        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => self.window = Some(window),
            Err(e) => self.error = Some(Error::window(format!("Cannot create window: {e}"))),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let WindowEvent::CloseRequested = event {
            log::info!("Close requested");
            self.close_requested = true;
        }
    }
}

pub struct WinitWindow {
    // Dropped before the event loop.
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl WinitWindow {
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new()
            .map_err(|e| Error::window(format!("Cannot create event loop: {e}")))?;

        // Fixed-size: the swapchain is never rebuilt.
        let attributes = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(false);

        let mut state = WindowState {
            attributes,
            window: None,
            close_requested: false,
            error: None,
        };

        // The window can only be created from inside the event loop, which
        // hands us `resumed` on the first pump.
        while state.window.is_none() {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::ZERO), &mut state)
            {
                return Err(Error::window(format!(
                    "Event loop exited with code {code} before the window was created"
                )));
            }
            if let Some(err) = state.error.take() {
                return Err(err);
            }
        }

        log::info!(
            "Window created: {}x{} ({})",
            config.width,
            config.height,
            config.title
        );
        Ok(Self { state, event_loop })
    }

    fn handle(&self) -> Result<&WinitHandle> {
        self.state
            .window
            .as_ref()
            .ok_or_else(|| Error::window("Window is gone"))
    }
}

impl Window for WinitWindow {
    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn handle_events(&mut self) {
        if let PumpStatus::Exit(_) = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            self.state.close_requested = true;
        }
    }

    fn required_instance_extensions(&self) -> Result<Vec<&'static CStr>> {
        let display = self.handle()?.raw_display_handle();
        let names = ash_window::enumerate_required_extensions(display)
            .map_err(|e| Error::window(format!("Unsupported display for Vulkan: {e}")))?;

        // SAFETY: ash-window hands out pointers to 'static NUL-terminated names.
        Ok(names.iter().map(|&name| unsafe { CStr::from_ptr(name) }).collect())
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        let window = self.handle()?;

        // SAFETY: the handles come from a live window that outlives the
        // renderer holding the surface.
        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )
        }
        .map_err(|e| Error::window(format!("Cannot create surface: {e}")))
    }

    fn size(&self) -> (u32, u32) {
        match &self.state.window {
            Some(window) => {
                let size = window.inner_size();
                (size.width, size.height)
            }
            None => (0, 0),
        }
    }
}
