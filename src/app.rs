//! The demo application: widget state plus the per-frame update and draw.

use std::sync::Arc;

use imgui::{Condition, SliderFlags, Ui, WindowFlags};
use log::error;
use winit::{event::WindowEvent, window::Window};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame_loop::Frame;
use crate::graphics::{clear_color, GraphicsContext};
use crate::gui::GuiBridge;
use crate::window::{Message, MessageHandler};

pub const SLIDER_MIN: f32 = 0.0;
pub const SLIDER_MAX: f32 = 1.0;

/// Values edited by the widgets, kept within their ranges.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WidgetState {
    value: f32,
    clear_color: [f32; 3],
}

impl WidgetState {
    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value.clamp(SLIDER_MIN, SLIDER_MAX);
    }

    /// What the button does.
    pub fn maximize(&mut self) {
        self.value = SLIDER_MAX;
    }

    pub fn clear_color(&self) -> [f32; 3] {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, color: [f32; 3]) {
        self.clear_color = color.map(|c| c.clamp(0.0, 1.0));
    }
}

const OVERLAY_FLAGS: WindowFlags = WindowFlags::NO_TITLE_BAR
    .union(WindowFlags::NO_RESIZE)
    .union(WindowFlags::NO_MOVE)
    .union(WindowFlags::NO_SCROLLBAR)
    .union(WindowFlags::NO_SAVED_SETTINGS)
    .union(WindowFlags::NO_INPUTS)
    .union(WindowFlags::ALWAYS_AUTO_RESIZE)
    .union(WindowFlags::NO_BACKGROUND);

pub fn declare_widgets(ui: &Ui, state: &mut WidgetState) {
    ui.window("Hello, ImGui").build(|| {
        ui.text("This is some useful text.");

        let mut value = state.value();
        if ui
            .slider_config("float", SLIDER_MIN, SLIDER_MAX)
            .flags(SliderFlags::ALWAYS_CLAMP)
            .build(&mut value)
        {
            state.set_value(value);
        }

        let mut color = state.clear_color();
        if ui.color_edit3("clear color", &mut color) {
            state.set_clear_color(color);
        }

        if ui.button("Button") {
            state.maximize();
        }
    });

    ui.window("TextOverlay")
        .position([0.0, 0.0], Condition::Always)
        .size([0.0, 0.0], Condition::Always)
        .flags(OVERLAY_FLAGS)
        .build(|| {
            ui.text("This text can't move.");
            ui.text(format!("sliderValue: {:.1}", state.value()));
        });
}

pub struct App {
    widgets: WidgetState,
    gui: Option<GuiBridge>,
    graphics: GraphicsContext,
    /// a failure seen while handling a message, reported by the next update
    fault: Option<Error>,
}

impl App {
    pub fn new(window: &Arc<Window>, config: &Config) -> Result<Self> {
        let size = window.inner_size();
        let graphics = GraphicsContext::create(window, size.width, size.height, config)?;
        let gui = GuiBridge::init(window, &graphics, config)?;

        Ok(Self {
            widgets: WidgetState::default(),
            gui: Some(gui),
            graphics,
            fault: None,
        })
    }
}

impl MessageHandler for App {
    fn handle(&mut self, message: &Message) -> bool {
        if let Some(gui) = self.gui.as_mut() {
            if gui.handle(message) {
                return true;
            }
        }

        if let Some(WindowEvent::Resized(size)) = message.window_event() {
            if let Err(e) = self.graphics.resize(size.width, size.height) {
                error!("{e}");
                self.fault = Some(e);
            }
        }
        false
    }
}

impl Frame for App {
    fn update(&mut self) -> Result<()> {
        if let Some(e) = self.fault.take() {
            return Err(e);
        }
        let Some(gui) = self.gui.as_mut() else {
            return Ok(());
        };

        let widgets = &mut self.widgets;
        gui.frame(|ui| declare_widgets(ui, widgets));
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let Some(gui) = self.gui.as_mut() else {
            return Ok(());
        };

        let color = clear_color(self.widgets.clear_color(), self.graphics.format());
        self.graphics.clear(color, 1.0, 0)?;
        gui.submit_draw_data(&mut self.graphics)?;
        self.graphics.present();
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(gui) = self.gui.take() {
            gui.shutdown();
        }
        self.graphics.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_stays_in_range() {
        let mut state = WidgetState::default();
        assert_eq!(state.value(), 0.0);

        state.set_value(0.25);
        assert_eq!(state.value(), 0.25);
        state.set_value(3.0);
        assert_eq!(state.value(), 1.0);
        state.set_value(-0.5);
        assert_eq!(state.value(), 0.0);
    }

    #[test]
    fn button_sets_value_to_maximum() {
        let mut state = WidgetState::default();
        state.set_value(0.3);
        state.maximize();
        assert_eq!(state.value(), 1.0);
    }

    #[test]
    fn clear_color_channels_stay_in_range() {
        let mut state = WidgetState::default();
        assert_eq!(state.clear_color(), [0.0, 0.0, 0.0]);

        state.set_clear_color([0.2, 1.5, -0.1]);
        assert_eq!(state.clear_color(), [0.2, 1.0, 0.0]);

        let c = clear_color(state.clear_color(), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn widgets_render_without_input() {
        let mut imgui = imgui::Context::create();
        imgui.set_ini_filename(None);
        imgui.io_mut().display_size = [1280.0, 720.0];
        imgui.fonts().build_rgba32_texture();

        let mut state = WidgetState::default();
        for frame in 0..3 {
            let ui = imgui.new_frame();
            declare_widgets(ui, &mut state);
            let draw_data = imgui.render();
            // new windows stay hidden on their first frame while imgui measures them
            if frame == 0 {
                assert_eq!(draw_data.draw_lists_count(), 0);
            } else {
                assert!(draw_data.draw_lists_count() >= 2);
            }
        }
        assert_eq!(state, WidgetState::default());
    }
}
