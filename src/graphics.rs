//! Device, presentation surface and render targets.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use pollster::block_on;
use winit::window::Window;

use crate::config::Config;
use crate::error::{Error, GraphicsStep, Result};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Capability tier reported by an adapter, ordered from least to most capable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FeatureLevel {
    Sm2,
    Sm4,
    Sm5,
}

impl From<wgpu::ShaderModel> for FeatureLevel {
    fn from(model: wgpu::ShaderModel) -> Self {
        match model {
            wgpu::ShaderModel::Sm2 => FeatureLevel::Sm2,
            wgpu::ShaderModel::Sm4 => FeatureLevel::Sm4,
            wgpu::ShaderModel::Sm5 => FeatureLevel::Sm5,
        }
    }
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureLevel::Sm2 => "9.3",
            FeatureLevel::Sm4 => "10.0",
            FeatureLevel::Sm5 => "11.0",
        };
        f.write_str(name)
    }
}

pub fn check_feature_level(found: FeatureLevel, required: FeatureLevel) -> Result<()> {
    if found < required {
        return Err(Error::UnsupportedHardware { found, required });
    }
    Ok(())
}

/// Picks an uncompressed 8 bit per channel color format, preferring linear ones.
pub fn choose_color_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    use wgpu::TextureFormat::*;

    let eight_bit = |f: &&wgpu::TextureFormat| {
        matches!(f, Rgba8Unorm | Bgra8Unorm | Rgba8UnormSrgb | Bgra8UnormSrgb)
    };
    formats
        .iter()
        .filter(eight_bit)
        .find(|f| !f.is_srgb())
        .or_else(|| formats.iter().find(eight_bit))
        .copied()
}

/// Converts an sRGB encoded color into the space the target expects, alpha fixed at opaque.
pub fn clear_color(rgb: [f32; 3], format: wgpu::TextureFormat) -> wgpu::Color {
    let channel = |c: f32| {
        let c = c.clamp(0.0, 1.0) as f64;
        if format.is_srgb() {
            srgb_to_linear(c)
        } else {
            c
        }
    };
    wgpu::Color {
        r: channel(rgb[0]),
        g: channel(rgb[1]),
        b: channel(rgb[2]),
        a: 1.0,
    }
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

struct DepthTarget {
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
}

impl DepthTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth/stencil target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        if let Some(e) = block_on(device.pop_error_scope()) {
            return Err(Error::graphics(GraphicsStep::DepthTarget, e));
        }

        Ok(Self {
            texture: Some(texture),
            view: Some(view),
        })
    }

    fn release(&mut self) {
        // views go before the texture they were created from
        self.view = None;
        if let Some(texture) = self.texture.take() {
            texture.destroy();
        }
    }
}

/// The color target of the frame being recorded.
struct PendingFrame {
    texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

pub struct GraphicsContext {
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    surface: Option<wgpu::Surface<'static>>,
    config: wgpu::SurfaceConfiguration,
    depth: Option<DepthTarget>,
    frame: Option<PendingFrame>,
    viewport: Viewport,
}

impl GraphicsContext {
    pub fn create(window: &Arc<Window>, width: u32, height: u32, config: &Config) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(Arc::clone(window))
            .map_err(|e| Error::graphics(GraphicsStep::Surface, e))?;

        let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| Error::graphics(GraphicsStep::Adapter, "no compatible hardware adapter"))?;

        let info = adapter.get_info();
        let level = FeatureLevel::from(adapter.get_downlevel_capabilities().shader_model);
        info!(
            "using adapter {} ({:?}), feature level {}",
            info.name, info.backend, level
        );
        check_feature_level(level, config.minimum_feature_level)?;

        let (device, queue) = block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("gui-demo device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
            },
            None,
        ))
        .map_err(|e| Error::graphics(GraphicsStep::Device, e))?;

        let caps = surface.get_capabilities(&adapter);
        let format = choose_color_format(&caps.formats).ok_or_else(|| {
            Error::graphics(
                GraphicsStep::SurfaceFormat,
                format!("no 8 bit color format among {:?}", caps.formats),
            )
        })?;
        debug!("surface format {format:?}");

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: config.present_mode,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        surface.configure(&device, &surface_config);
        if let Some(e) = block_on(device.pop_error_scope()) {
            return Err(Error::graphics(GraphicsStep::Configure, e));
        }

        Self::from_parts(device, queue, Some(surface), surface_config)
    }

    pub(crate) fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface: Option<wgpu::Surface<'static>>,
        config: wgpu::SurfaceConfiguration,
    ) -> Result<Self> {
        let depth = DepthTarget::new(&device, config.width, config.height)?;
        let viewport = Viewport::full(config.width, config.height);

        Ok(Self {
            device: Some(device),
            queue: Some(queue),
            surface,
            config,
            depth: Some(depth),
            frame: None,
            viewport,
        })
    }

    pub fn device(&self) -> Option<&wgpu::Device> {
        self.device.as_ref()
    }

    pub fn queue(&self) -> Option<&wgpu::Queue> {
        self.queue.as_ref()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Rebuilds the surface buffers, the depth/stencil target and the viewport for a new size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            debug!("window minimized, rendering suspended");
            self.config.width = width;
            self.config.height = height;
            return Ok(());
        }
        let (Some(device), Some(surface)) = (self.device.as_ref(), self.surface.as_ref()) else {
            return Ok(());
        };
        debug!("resizing targets to {width}x{height}");

        // the old frame references the old buffers
        self.frame = None;
        self.config.width = width;
        self.config.height = height;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        surface.configure(device, &self.config);
        if let Some(e) = block_on(device.pop_error_scope()) {
            return Err(Error::graphics(GraphicsStep::Configure, e));
        }

        if let Some(mut depth) = self.depth.take() {
            depth.release();
        }
        self.depth = Some(DepthTarget::new(device, width, height)?);
        self.viewport = Viewport::full(width, height);
        Ok(())
    }

    fn acquire(&mut self) -> Result<bool> {
        if self.frame.is_some() {
            return Ok(true);
        }
        if self.config.width == 0 || self.config.height == 0 {
            return Ok(false);
        }
        let (Some(device), Some(surface)) = (self.device.as_ref(), self.surface.as_ref()) else {
            return Ok(false);
        };

        let texture = match surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                warn!("surface lost, reconfiguring");
                surface.configure(device, &self.config);
                return Ok(false);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("dropped frame: surface timeout");
                return Ok(false);
            }
            Err(e) => return Err(Error::graphics(GraphicsStep::Frame, e)),
        };

        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });

        self.frame = Some(PendingFrame {
            texture,
            view,
            encoder,
        });
        Ok(true)
    }

    /// Clears the color target to `color` and the depth/stencil target to `depth` and `stencil`.
    pub fn clear(&mut self, color: wgpu::Color, depth: f32, stencil: u32) -> Result<()> {
        if !self.acquire()? {
            return Ok(());
        }
        let (Some(frame), Some(depth_view)) = (
            self.frame.as_mut(),
            self.depth.as_ref().and_then(|d| d.view.as_ref()),
        ) else {
            return Ok(());
        };

        frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(stencil),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        Ok(())
    }

    /// Opens a pass drawing over the current color target, or `None` when no frame is acquired.
    pub fn overlay_pass(
        &mut self,
    ) -> Option<(&wgpu::Device, &wgpu::Queue, wgpu::RenderPass<'_>)> {
        let device = self.device.as_ref()?;
        let queue = self.queue.as_ref()?;
        let frame = self.frame.as_mut()?;
        let vp = self.viewport;

        let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("overlay"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_viewport(vp.x, vp.y, vp.width, vp.height, vp.min_depth, vp.max_depth);

        Some((device, queue, rpass))
    }

    pub fn present(&mut self) {
        let (Some(queue), Some(frame)) = (self.queue.as_ref(), self.frame.take()) else {
            return;
        };
        queue.submit(Some(frame.encoder.finish()));
        frame.texture.present();
    }

    /// Releases every resource in reverse creation order. Safe to call repeatedly.
    pub fn release(&mut self) {
        self.frame = None;
        if let Some(mut depth) = self.depth.take() {
            depth.release();
        }
        self.surface = None;
        self.queue = None;
        self.device = None;
    }

    pub fn is_released(&self) -> bool {
        self.frame.is_none()
            && self.depth.is_none()
            && self.surface.is_none()
            && self.queue.is_none()
            && self.device.is_none()
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        self.release();
    }
}
