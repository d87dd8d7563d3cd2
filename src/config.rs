use crate::graphics::FeatureLevel;

/// use `Default::default` if you don't need anything specific.
#[derive(Clone, Debug)]
pub struct Config {
    /// name of the window
    pub window_title: String,
    /// width of the window's client area in physical pixels
    pub width: u32,
    /// height of the window's client area in physical pixels
    pub height: u32,
    /// font size, scaled by the window's DPI factor when unset
    pub font_size: Option<f32>,
    /// `AutoNoVsync` presents without waiting for vertical sync
    pub present_mode: wgpu::PresentMode,
    /// adapters reporting a lower feature level are rejected
    pub minimum_feature_level: FeatureLevel,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_title: "ImGui Example".to_string(),
            width: 1280,
            height: 720,
            font_size: None,
            present_mode: wgpu::PresentMode::AutoNoVsync,
            minimum_feature_level: FeatureLevel::Sm5,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}
