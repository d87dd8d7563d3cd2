//! Alternates between draining window messages and rendering frames.

use log::info;

use crate::error::Result;
use crate::window::{Message, MessageHandler, MessageSource};

/// One update/draw cycle of the application.
pub trait Frame {
    /// Declares the frame's widgets and applies their changes to the application state.
    fn update(&mut self) -> Result<()>;

    /// Clears the targets, renders the widgets and presents.
    fn draw(&mut self) -> Result<()>;
}

/// What one iteration of the loop did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// A message was pending and has been dispatched.
    Drained,
    /// The queue was empty and a frame was rendered.
    Rendered,
    /// A quit message was retrieved.
    Exit(i32),
}

pub struct FrameLoop<S> {
    source: S,
    frames: u64,
}

impl<S: MessageSource> FrameLoop<S> {
    pub fn new(source: S) -> Self {
        Self { source, frames: 0 }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn step<A>(&mut self, app: &mut A) -> Result<Step>
    where
        A: MessageHandler + Frame,
    {
        match self.source.pump_one() {
            Some(Message::Quit(code)) => Ok(Step::Exit(code)),
            Some(message) => {
                self.source.dispatch(message, app);
                Ok(Step::Drained)
            }
            None => {
                app.update()?;
                app.draw()?;
                self.frames += 1;
                Ok(Step::Rendered)
            }
        }
    }

    /// Runs until a quit message arrives and returns its payload.
    pub fn run<A>(mut self, app: &mut A) -> Result<i32>
    where
        A: MessageHandler + Frame,
    {
        loop {
            if let Step::Exit(code) = self.step(app)? {
                info!("exiting with code {code} after {} frames", self.frames);
                return Ok(code);
            }
        }
    }
}

/// Builds the application from `source` and runs the frame loop.
///
/// `build` runs before the first message is pumped, so a startup failure
/// returns without ever touching the message queue.
pub fn launch<S, A, F>(source: S, build: F) -> Result<i32>
where
    S: MessageSource,
    A: MessageHandler + Frame,
    F: FnOnce(&S) -> Result<A>,
{
    let mut app = build(&source)?;
    FrameLoop::new(source).run(&mut app)
}
