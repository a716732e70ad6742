// Window + surface + swapchain
//
// The engine owns the render loop, so winit is driven through its
// pump-events API instead of `run_app`: each frame pumps pending events
// without blocking and records what happened for the engine to read.

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use super::swapchain::{choose_surface_format, Swapchain};
use super::{VulkanDevice, WindowEvents};

/// Pumps allowed for the platform to deliver `resumed` and create the window
const WINDOW_CREATE_ATTEMPTS: usize = 100;

/// How long a minimized window waits for events before the loop spins again
const MINIMIZED_POLL: Duration = Duration::from_millis(16);

#[derive(Debug, Clone)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub present_mode: vk::PresentModeKHR,
}

/// Receives winit callbacks during a pump and remembers the outcome
struct WindowHandler {
    attributes: WindowAttributes,
    window: Option<Arc<Window>>,
    creation_error: Option<String>,
    close_requested: bool,
    resized: Option<PhysicalSize<u32>>,
}

impl ApplicationHandler for WindowHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => self.creation_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.close_requested = true,
            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);
                self.resized = Some(size);
            }
            _ => {}
        }
    }
}

pub struct VulkanWindow {
    pub swapchain: Option<Swapchain>,
    pub surface_format: vk::SurfaceFormatKHR,
    pub needs_resize: bool,
    present_mode: vk::PresentModeKHR,
    surface: vk::SurfaceKHR,
    surface_loader: khr::Surface,
    window: Arc<Window>,
    handler: WindowHandler,
    event_loop: EventLoop<()>,
    title: String,
}

impl VulkanWindow {
    pub fn open(device: &Arc<VulkanDevice>, settings: &WindowSettings) -> Result<Self> {
        log::info!(
            "Window: {}x{} ({})",
            settings.width,
            settings.height,
            if settings.fullscreen { "fullscreen" } else { "windowed" }
        );

        let mut attributes = WindowAttributes::default()
            .with_title(&settings.title)
            .with_inner_size(PhysicalSize::new(settings.width, settings.height));
        if settings.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let mut event_loop = EventLoop::new().context("Failed to create event loop")?;
        let mut handler = WindowHandler {
            attributes,
            window: None,
            creation_error: None,
            close_requested: false,
            resized: None,
        };

        for _ in 0..WINDOW_CREATE_ATTEMPTS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut handler)
            {
                anyhow::bail!("Event loop exited with code {code} before the window opened");
            }
            if handler.window.is_some() || handler.creation_error.is_some() {
                break;
            }
        }

        if let Some(e) = handler.creation_error.take() {
            anyhow::bail!("Failed to create window: {e}");
        }
        let window = handler
            .window
            .clone()
            .context("Platform never resumed the application")?;

        let surface = create_surface(device, &window)?;
        let surface_loader = khr::Surface::new(&device.entry, &device.instance);

        match Self::configure(device, surface, &surface_loader, &window, settings) {
            Ok((surface_format, swapchain)) => Ok(Self {
                swapchain,
                surface_format,
                needs_resize: false,
                present_mode: settings.present_mode,
                surface,
                surface_loader,
                window,
                handler,
                event_loop,
                title: settings.title.clone(),
            }),
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                Err(e)
            }
        }
    }

    fn configure(
        device: &Arc<VulkanDevice>,
        surface: vk::SurfaceKHR,
        surface_loader: &khr::Surface,
        window: &Window,
        settings: &WindowSettings,
    ) -> Result<(vk::SurfaceFormatKHR, Option<Swapchain>)> {
        // Verify the GPU supports presenting to this surface
        let supported = unsafe {
            surface_loader.get_physical_device_surface_support(
                device.physical_device,
                device.graphics_queue_family,
                surface,
            )?
        };
        if !supported {
            anyhow::bail!("GPU doesn't support presenting to this surface");
        }

        let surface_format = choose_surface_format(device, surface, surface_loader)?;

        let size = window.inner_size();
        let swapchain = if size.width == 0 || size.height == 0 {
            None
        } else {
            Some(Swapchain::new(
                device.clone(),
                surface,
                surface_loader,
                surface_format,
                settings.present_mode,
                size.width,
                size.height,
            )?)
        };

        Ok((surface_format, swapchain))
    }

    pub fn is_minimized(&self) -> bool {
        let size = self.window.inner_size();
        size.width == 0 || size.height == 0
    }

    pub fn poll(&mut self) -> WindowEvents {
        let timeout = if self.is_minimized() {
            MINIMIZED_POLL
        } else {
            Duration::ZERO
        };

        let status = self.event_loop.pump_app_events(Some(timeout), &mut self.handler);

        if self.handler.resized.take().is_some() {
            self.needs_resize = true;
        }

        WindowEvents {
            close_requested: self.handler.close_requested || matches!(status, PumpStatus::Exit(_)),
            minimized: self.is_minimized(),
        }
    }

    /// Rebuild the swapchain at the window's current size. Leaves no
    /// swapchain while the window is minimized.
    pub fn recreate_swapchain(&mut self, device: &Arc<VulkanDevice>) -> Result<()> {
        device.wait_idle()?;

        // The surface can only have one swapchain at a time
        self.swapchain = None;

        let size = self.window.inner_size();
        if size.width > 0 && size.height > 0 {
            self.swapchain = Some(Swapchain::new(
                device.clone(),
                self.surface,
                &self.surface_loader,
                self.surface_format,
                self.present_mode,
                size.width,
                size.height,
            )?);
        }

        self.needs_resize = false;
        Ok(())
    }

    pub fn show_frame_rate(&self, fps: f32, frame_time_ms: f32) {
        self.window
            .set_title(&format!("{} - {:.0} FPS ({:.2}ms)", self.title, fps, frame_time_ms));
    }

    /// Swapchain and surface must go before the window they belong to.
    pub fn destroy(mut self) {
        self.swapchain = None;
        unsafe { self.surface_loader.destroy_surface(self.surface, None) };
    }
}

/// Create the platform surface for a winit window
fn create_surface(device: &VulkanDevice, window: &Window) -> Result<vk::SurfaceKHR> {
    let window_handle = window
        .window_handle()
        .context("Failed to get window handle")?
        .as_raw();
    let display_handle = window
        .display_handle()
        .context("Failed to get display handle")?
        .as_raw();

    let surface: VkResult<vk::SurfaceKHR> = match (display_handle, window_handle) {
        #[cfg(target_os = "windows")]
        (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(handle)) => {
            let hinstance = handle.hinstance.map(|h| h.get()).unwrap_or(0) as *const std::ffi::c_void;
            let hwnd = handle.hwnd.get() as *const std::ffi::c_void;
            let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                .hinstance(hinstance)
                .hwnd(hwnd);
            let loader = khr::Win32Surface::new(&device.entry, &device.instance);
            unsafe { loader.create_win32_surface(&create_info, None) }
        }

        #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
        (RawDisplayHandle::Xlib(display), RawWindowHandle::Xlib(handle)) => {
            let dpy = display
                .display
                .context("Xlib display handle is null")?
                .as_ptr();
            let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                .dpy(dpy as *mut vk::Display)
                .window(handle.window as vk::Window);
            let loader = khr::XlibSurface::new(&device.entry, &device.instance);
            unsafe { loader.create_xlib_surface(&create_info, None) }
        }

        #[cfg(all(unix, not(target_os = "macos"), not(target_os = "android")))]
        (RawDisplayHandle::Wayland(display), RawWindowHandle::Wayland(handle)) => {
            let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                .display(display.display.as_ptr())
                .surface(handle.surface.as_ptr());
            let loader = khr::WaylandSurface::new(&device.entry, &device.instance);
            unsafe { loader.create_wayland_surface(&create_info, None) }
        }

        _ => anyhow::bail!("Unsupported window handle type"),
    };

    surface.context("Failed to create window surface")
}
