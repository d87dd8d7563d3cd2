//! Drives dear imgui against the window and the graphics context.

mod renderer;

pub use renderer::{Renderer, RendererConfig, RendererError, RendererResult, Texture};

use std::sync::Arc;
use std::time::Instant;

use imgui::{Context, FontConfig, FontSource, MouseCursor, Ui};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use log::{debug, warn};
use pollster::block_on;
use winit::window::Window;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::graphics::GraphicsContext;
use crate::window::{Message, MessageHandler};

/// Fields drop in declaration order: both backends go before the imgui context.
pub struct GuiBridge {
    renderer: Renderer,
    platform: WinitPlatform,
    imgui: Context,
    window: Arc<Window>,
    last_frame: Instant,
    last_cursor: Option<Option<MouseCursor>>,
    frame_started: bool,
}

impl GuiBridge {
    pub fn init(window: &Arc<Window>, graphics: &GraphicsContext, config: &Config) -> Result<Self> {
        let (Some(device), Some(queue)) = (graphics.device(), graphics.queue()) else {
            return Err(Error::GuiInit("graphics context already released".to_string()));
        };

        let mut imgui = Context::create();
        imgui.set_ini_filename(None);
        imgui.style_mut().use_classic_colors();

        let mut platform = WinitPlatform::init(&mut imgui);
        platform.attach_window(imgui.io_mut(), window, HiDpiMode::Default);

        let hidpi_factor = window.scale_factor();
        let font_size = config.font_size.unwrap_or((13.0 * hidpi_factor) as f32);
        imgui.io_mut().font_global_scale = (1.0 / hidpi_factor) as f32;

        imgui.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: font_size,
                ..Default::default()
            }),
        }]);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let renderer = Renderer::new(
            &mut imgui,
            device,
            queue,
            RendererConfig::new(graphics.format()),
        );
        if let Some(e) = block_on(device.pop_error_scope()) {
            return Err(Error::GuiInit(e.to_string()));
        }
        debug!("imgui renderer ready for {:?}", graphics.format());

        Ok(Self {
            renderer,
            platform,
            imgui,
            window: Arc::clone(window),
            last_frame: Instant::now(),
            last_cursor: None,
            frame_started: false,
        })
    }

    /// Begins a frame, declares its widgets with `declare` and updates the cursor.
    pub fn frame(&mut self, declare: impl FnOnce(&Ui)) {
        let now = Instant::now();
        self.imgui.io_mut().update_delta_time(now - self.last_frame);
        self.last_frame = now;

        if let Err(e) = self.platform.prepare_frame(self.imgui.io_mut(), &self.window) {
            warn!("failed to prepare frame: {e}");
        }
        let ui = self.imgui.new_frame();
        self.frame_started = true;

        declare(ui);

        if self.last_cursor != Some(ui.mouse_cursor()) {
            self.last_cursor = Some(ui.mouse_cursor());
            self.platform.prepare_render(ui, &self.window);
        }
    }

    /// Ends the current frame and rasterizes its draw data over the graphics context's target.
    pub fn submit_draw_data(&mut self, graphics: &mut GraphicsContext) -> Result<()> {
        if !std::mem::take(&mut self.frame_started) {
            return Ok(());
        }

        let draw_data = self.imgui.render();
        let Some((device, queue, mut rpass)) = graphics.overlay_pass() else {
            return Ok(());
        };
        self.renderer.render(draw_data, queue, device, &mut rpass)?;
        Ok(())
    }

    pub fn shutdown(self) {
        let GuiBridge {
            renderer,
            platform,
            imgui,
            ..
        } = self;
        drop(renderer);
        drop(platform);
        drop(imgui);
        debug!("imgui shut down");
    }
}

impl MessageHandler for GuiBridge {
    fn handle(&mut self, message: &Message) -> bool {
        if let Message::Event(event) = message {
            self.platform
                .handle_event(self.imgui.io_mut(), &self.window, event);
        }
        // the winit backend never swallows events
        false
    }
}
