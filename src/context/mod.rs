//! OpenGL context management
//!
//! One glutin display, config and context serve every window; each window
//! gets its own window surface. Everything is created when the first window
//! is attached because WGL needs a window to open its display.

use std::collections::HashMap;
use std::ffi::{c_void, CString};
use std::num::NonZeroU32;

use glutin::config::{Config, ConfigTemplateBuilder, GlConfig};
use glutin::context::{
    ContextApi, ContextAttributesBuilder, NotCurrentGlContext, PossiblyCurrentContext,
    PossiblyCurrentGlContext, Version,
};
use glutin::display::{Display, DisplayApiPreference, GlDisplay};
use glutin::surface::{GlSurface, Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use log::{debug, info, warn};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::error::{Error, Result};
use crate::event::WindowId;

/// OpenGL ES version tried when desktop GL is refused
const GLES_FALLBACK: (u8, u8) = (3, 0);

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value.max(1)).unwrap_or(NonZeroU32::MIN)
}

fn swap_interval(interval: u32) -> SwapInterval {
    match NonZeroU32::new(interval) {
        Some(interval) => SwapInterval::Wait(interval),
        None => SwapInterval::DontWait,
    }
}

fn display_preference(window: RawWindowHandle) -> DisplayApiPreference {
    #[cfg(windows)]
    {
        DisplayApiPreference::Wgl(Some(window))
    }
    #[cfg(not(windows))]
    {
        let _ = window;
        DisplayApiPreference::Egl
    }
}

/// The display-wide GL objects, created with the first window
struct GlState {
    context: PossiblyCurrentContext,
    config: Config,
    display: Display,
}

impl GlState {
    fn create(
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        size: (u32, u32),
        gl_version: (u8, u8),
    ) -> Result<(Self, Surface<WindowSurface>)> {
        let display = unsafe { Display::new(display_handle, display_preference(window_handle))? };

        let template = ConfigTemplateBuilder::new()
            .with_alpha_size(8)
            .with_depth_size(24)
            .with_stencil_size(8)
            .compatible_with_native_window(window_handle)
            .build();

        let config = unsafe { display.find_configs(template)? }
            .reduce(|best, config| {
                // Prefer the least multisampling; the application decides on MSAA
                if config.num_samples() < best.num_samples() {
                    config
                } else {
                    best
                }
            })
            .ok_or_else(|| Error::Context("no matching GL config".into()))?;
        debug!(
            "GL config: color {:?} depth {} stencil {} samples {}",
            config.color_buffer_type(),
            config.depth_size(),
            config.stencil_size(),
            config.num_samples()
        );

        let desktop = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(
                gl_version.0,
                gl_version.1,
            ))))
            .build(Some(window_handle));
        let gles = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::Gles(Some(Version::new(
                GLES_FALLBACK.0,
                GLES_FALLBACK.1,
            ))))
            .build(Some(window_handle));

        let not_current = match unsafe { display.create_context(&config, &desktop) } {
            Ok(context) => {
                info!("Created OpenGL {}.{} context", gl_version.0, gl_version.1);
                context
            }
            Err(e) => {
                warn!(
                    "OpenGL {}.{} unavailable ({}); falling back to OpenGL ES {}.{}",
                    gl_version.0, gl_version.1, e, GLES_FALLBACK.0, GLES_FALLBACK.1
                );
                unsafe { display.create_context(&config, &gles)? }
            }
        };

        let surface = create_surface(&display, &config, window_handle, size)?;
        let context = not_current.make_current(&surface)?;

        Ok((
            Self {
                context,
                config,
                display,
            },
            surface,
        ))
    }
}

fn create_surface(
    display: &Display,
    config: &Config,
    window: RawWindowHandle,
    (width, height): (u32, u32),
) -> Result<Surface<WindowSurface>> {
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        window,
        non_zero(width),
        non_zero(height),
    );
    Ok(unsafe { display.create_window_surface(config, &attrs)? })
}

/// Shared GL context plus one surface per window
pub struct GlContext {
    /// Declared before `state` so surfaces are released first
    surfaces: HashMap<WindowId, Surface<WindowSurface>>,
    state: Option<GlState>,
    current: Option<WindowId>,
    gl_version: (u8, u8),
    swap_interval: u32,
}

impl GlContext {
    /// No GL objects exist until the first [`attach`](Self::attach)
    pub fn new(gl_version: (u8, u8), swap_interval: u32) -> Self {
        Self {
            surfaces: HashMap::new(),
            state: None,
            current: None,
            gl_version,
            swap_interval,
        }
    }

    /// Whether the display and context exist yet
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    pub fn has_surface(&self, id: WindowId) -> bool {
        self.surfaces.contains_key(&id)
    }

    /// Window whose surface is current, if any
    pub fn current(&self) -> Option<WindowId> {
        self.current
    }

    pub fn swap_interval(&self) -> u32 {
        self.swap_interval
    }

    /// Create the window's surface; the first window also creates the
    /// context and leaves it current
    pub fn attach(
        &mut self,
        id: WindowId,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let previous = self.current;
        let surface = match &self.state {
            Some(state) => {
                create_surface(&state.display, &state.config, window_handle, (width, height))?
            }
            None => {
                let (state, surface) = GlState::create(
                    display_handle,
                    window_handle,
                    (width, height),
                    self.gl_version,
                )?;
                self.state = Some(state);
                self.current = Some(id);
                surface
            }
        };

        self.surfaces.insert(id, surface);
        self.apply_swap_interval(id)?;
        if let Some(previous) = previous {
            self.make_current(previous)?;
        }
        debug!("Attached GL surface to {:?} ({}x{})", id, width, height);
        Ok(())
    }

    /// Release the window's surface; the context outlives it
    pub fn detach(&mut self, id: WindowId) {
        if self.surfaces.remove(&id).is_some() {
            debug!("Detached GL surface from {:?}", id);
        }
        if self.current == Some(id) {
            self.current = None;
        }
    }

    fn surface(&self, id: WindowId) -> Result<(&GlState, &Surface<WindowSurface>)> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| Error::Context("no GL context yet".into()))?;
        let surface = self.surfaces.get(&id).ok_or(Error::UnknownWindow(id))?;
        Ok((state, surface))
    }

    /// Bind the shared context to the window's surface
    pub fn make_current(&mut self, id: WindowId) -> Result<()> {
        if self.current == Some(id) {
            return Ok(());
        }
        let (state, surface) = self.surface(id)?;
        state.context.make_current(surface)?;
        self.current = Some(id);
        Ok(())
    }

    pub fn swap_buffers(&mut self, id: WindowId) -> Result<()> {
        self.make_current(id)?;
        let (state, surface) = self.surface(id)?;
        surface.swap_buffers(&state.context)?;
        Ok(())
    }

    fn apply_swap_interval(&mut self, id: WindowId) -> Result<()> {
        self.make_current(id)?;
        let interval = swap_interval(self.swap_interval);
        let (state, surface) = self.surface(id)?;
        if let Err(e) = surface.set_swap_interval(&state.context, interval) {
            warn!("Failed to set swap interval on {:?}: {}", id, e);
        }
        Ok(())
    }

    /// Apply `interval` to every surface and remember it for new ones
    pub fn set_swap_interval(&mut self, interval: u32) -> Result<()> {
        self.swap_interval = interval;
        let previous = self.current;
        let ids: Vec<WindowId> = self.surfaces.keys().copied().collect();
        for id in ids {
            self.apply_swap_interval(id)?;
        }
        if let Some(previous) = previous {
            self.make_current(previous)?;
        }
        Ok(())
    }

    pub fn resize(&mut self, id: WindowId, width: u32, height: u32) -> Result<()> {
        let (state, surface) = self.surface(id)?;
        surface.resize(&state.context, non_zero(width), non_zero(height));
        Ok(())
    }

    /// Address of a GL function; null before the first window
    pub fn get_proc_address(&self, name: &str) -> *const c_void {
        let Some(state) = &self.state else {
            return std::ptr::null();
        };
        match CString::new(name) {
            Ok(name) => state.display.get_proc_address(&name),
            Err(_) => std::ptr::null(),
        }
    }
}

/// What the window manager needs from a GL implementation
pub trait RenderContext {
    fn attach(
        &mut self,
        id: WindowId,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> Result<()>;
    fn detach(&mut self, id: WindowId);
    fn make_current(&mut self, id: WindowId) -> Result<()>;
    fn swap_buffers(&mut self, id: WindowId) -> Result<()>;
    fn set_swap_interval(&mut self, interval: u32) -> Result<()>;
    fn resize(&mut self, id: WindowId, width: u32, height: u32) -> Result<()>;
    fn get_proc_address(&self, name: &str) -> *const c_void;
}

impl RenderContext for GlContext {
    fn attach(
        &mut self,
        id: WindowId,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> Result<()> {
        GlContext::attach(self, id, display_handle, window_handle, width, height)
    }

    fn detach(&mut self, id: WindowId) {
        GlContext::detach(self, id)
    }

    fn make_current(&mut self, id: WindowId) -> Result<()> {
        GlContext::make_current(self, id)
    }

    fn swap_buffers(&mut self, id: WindowId) -> Result<()> {
        GlContext::swap_buffers(self, id)
    }

    fn set_swap_interval(&mut self, interval: u32) -> Result<()> {
        GlContext::set_swap_interval(self, interval)
    }

    fn resize(&mut self, id: WindowId, width: u32, height: u32) -> Result<()> {
        GlContext::resize(self, id, width, height)
    }

    fn get_proc_address(&self, name: &str) -> *const c_void {
        GlContext::get_proc_address(self, name)
    }
}

impl Drop for GlContext {
    fn drop(&mut self) {
        self.surfaces.clear();
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_interval_mapping() {
        assert_eq!(swap_interval(0), SwapInterval::DontWait);
        assert_eq!(
            swap_interval(2),
            SwapInterval::Wait(NonZeroU32::new(2).unwrap())
        );
    }

    #[test]
    fn test_non_zero_clamps() {
        assert_eq!(non_zero(0).get(), 1);
        assert_eq!(non_zero(640).get(), 640);
    }

    #[test]
    fn test_uninitialized_context() {
        let mut context = GlContext::new((3, 3), 1);
        assert!(!context.is_initialized());
        assert!(context.get_proc_address("glClear").is_null());
        assert!(context.make_current(WindowId(0)).is_err());
        assert!(context.swap_buffers(WindowId(0)).is_err());
        assert_eq!(context.current(), None);
    }

    #[test]
    fn test_swap_interval_remembered_without_surfaces() {
        let mut context = GlContext::new((3, 3), 1);
        context.set_swap_interval(0).unwrap();
        assert_eq!(context.swap_interval(), 0);
    }

    #[test]
    fn test_detach_unknown_window() {
        let mut context = GlContext::new((3, 3), 1);
        context.detach(WindowId(3));
        assert!(!context.has_surface(WindowId(3)));
    }
}
