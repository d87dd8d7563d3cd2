use std::fmt;

use crate::graphics::FeatureLevel;
use crate::gui::RendererError;

pub type Result<T> = std::result::Result<T, Error>;

/// The creation step of the graphics context that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphicsStep {
    Surface,
    Adapter,
    Device,
    SurfaceFormat,
    Configure,
    DepthTarget,
    Frame,
}

impl fmt::Display for GraphicsStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GraphicsStep::Surface => "create surface",
            GraphicsStep::Adapter => "request adapter",
            GraphicsStep::Device => "request device",
            GraphicsStep::SurfaceFormat => "choose surface format",
            GraphicsStep::Configure => "configure surface",
            GraphicsStep::DepthTarget => "create depth/stencil target",
            GraphicsStep::Frame => "acquire frame",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug)]
pub enum Error {
    WindowCreation(String),
    UnsupportedHardware {
        found: FeatureLevel,
        required: FeatureLevel,
    },
    GraphicsResource {
        step: GraphicsStep,
        message: String,
    },
    GuiInit(String),
    Render(RendererError),
}

impl Error {
    pub(crate) fn graphics(step: GraphicsStep, message: impl fmt::Display) -> Self {
        Error::GraphicsResource {
            step,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::WindowCreation(message) => write!(f, "window creation failed: {message}"),
            Error::UnsupportedHardware { found, required } => write!(
                f,
                "graphics feature level {found} unsupported, {required} or better is required"
            ),
            Error::GraphicsResource { step, message } => write!(f, "{step} failed: {message}"),
            Error::GuiInit(message) => write!(f, "imgui initialization failed: {message}"),
            Error::Render(e) => write!(f, "rendering failed: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<RendererError> for Error {
    fn from(e: RendererError) -> Self {
        Error::Render(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_step() {
        let e = Error::graphics(GraphicsStep::DepthTarget, "out of memory");
        assert_eq!(
            e.to_string(),
            "create depth/stencil target failed: out of memory"
        );

        let e = Error::UnsupportedHardware {
            found: FeatureLevel::Sm4,
            required: FeatureLevel::Sm5,
        };
        assert_eq!(
            e.to_string(),
            "graphics feature level 10.0 unsupported, 11.0 or better is required"
        );
    }
}
