/*!
A dear imgui demo window rendered with wgpu.

The program is split the way it runs: a [`window::WindowHost`] owns the OS
window and its message queue, a [`graphics::GraphicsContext`] owns the device,
surface and render targets, a [`gui::GuiBridge`] drives imgui against both and
the [`frame_loop::FrameLoop`] alternates between draining messages and
rendering [`app::App`] frames.

```no_run
use gui_demo::{app::App, config::Config, frame_loop, window::WindowHost};

fn main() -> gui_demo::Result<()> {
    let config = Config::default();
    let host = WindowHost::create(&config)?;
    let code = frame_loop::launch(host, |host| App::new(host.window(), &config))?;
    std::process::exit(code);
}
```
*/

pub mod app;
pub mod config;
pub mod dialog;
pub mod error;
pub mod frame_loop;
pub mod graphics;
pub mod gui;
pub mod window;

pub use error::{Error, GraphicsStep, Result};
