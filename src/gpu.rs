//! Device and surface bootstrap.
//!
//! [`GpuContext`] owns the wgpu objects everything else borrows: the window
//! surface, the logical device, the submission queue, and the live surface
//! configuration. One is created when the window opens and handed by
//! reference to programs, meshes, targets, and scenes; none of those own
//! GPU state beyond what they allocate for themselves.
//!
//! Bringing the stack up can fail (no adapter, device refused), and that
//! failure is a setup error like any other: [`GpuContext::new`] returns
//! [`Error::GpuInit`] rather than panicking, and the host decides whether
//! to bail.

use std::sync::Arc;

use winit::window::Window;

use crate::error::{Error, Result};

/// Owner of the core wgpu objects.
///
/// Fields are public; modules that need raw wgpu access (demos, custom
/// passes) reach through rather than waiting for a wrapper.
pub struct GpuContext {
    /// Presentation surface for the window this context was built from.
    pub surface: wgpu::Surface<'static>,
    /// Logical device; creates buffers, textures, and pipelines.
    pub device: wgpu::Device,
    /// Queue for buffer/texture writes and command submission.
    pub queue: wgpu::Queue,
    /// The configuration the surface currently runs (format, extent,
    /// present mode). Kept in sync by [`resize`](Self::resize).
    pub config: wgpu::SurfaceConfiguration,
}

/// Prefer an sRGB swapchain format; fall back to whatever the surface
/// offers first.
fn preferred_surface_format(formats: &[wgpu::TextureFormat]) -> wgpu::TextureFormat {
    formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| formats.first().copied())
        .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb)
}

impl GpuContext {
    /// Bring up the GPU stack against a window: instance, surface,
    /// adapter, device/queue, and an initial surface configuration
    /// (sRGB format where available, Fifo presentation).
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| Error::GpuInit(format!("surface creation failed: {e}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| Error::GpuInit(format!("no compatible adapter: {e}")))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Proscenium Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|e| Error::GpuInit(format!("device request refused: {e}")))?;

        let caps = surface.get_capabilities(&adapter);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: preferred_surface_format(&caps.formats),
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
        })
    }

    /// Reconfigure the surface for a new window size.
    ///
    /// Zero-sized requests are ignored; minimized windows report 0x0 and
    /// configuring that trips wgpu validation.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Width over height, for camera projections tracking the window.
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_format_prefers_srgb() {
        let formats = [
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8Unorm,
        ];
        assert_eq!(
            preferred_surface_format(&formats),
            wgpu::TextureFormat::Bgra8UnormSrgb
        );
    }

    #[test]
    fn surface_format_falls_back_to_first_offered() {
        let formats = [wgpu::TextureFormat::Rgba16Float, wgpu::TextureFormat::Bgra8Unorm];
        assert_eq!(
            preferred_surface_format(&formats),
            wgpu::TextureFormat::Rgba16Float
        );
    }
}
