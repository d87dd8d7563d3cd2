//! The OS window and its message queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::EventLoop,
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowBuilder},
};

use crate::config::Config;
use crate::error::{Error, Result};

/// A queued window message.
#[derive(Debug)]
pub enum Message {
    Event(Event<()>),
    /// Ends the frame loop; the payload becomes the process exit code.
    Quit(i32),
}

impl Message {
    pub fn window_event(&self) -> Option<&WindowEvent> {
        match self {
            Message::Event(Event::WindowEvent { event, .. }) => Some(event),
            _ => None,
        }
    }
}

/// Something that consumes window messages.
pub trait MessageHandler {
    /// Returns `true` if the message was consumed and needs no further handling.
    fn handle(&mut self, message: &Message) -> bool;
}

/// A non-blocking queue of window messages.
pub trait MessageSource {
    /// Retrieves the next queued message without waiting for one.
    fn pump_one(&mut self) -> Option<Message>;

    /// Routes a message to `handler`, falling back to default handling.
    fn dispatch(&mut self, message: Message, handler: &mut dyn MessageHandler);
}

pub struct WindowHost {
    event_loop: EventLoop<()>,
    window: Arc<Window>,
    queue: VecDeque<Message>,
}

impl WindowHost {
    pub fn create(config: &Config) -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|e| Error::WindowCreation(e.to_string()))?;

        let window = WindowBuilder::new()
            .with_title(&config.window_title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(&event_loop)
            .map_err(|e| Error::WindowCreation(e.to_string()))?;
        window.set_visible(true);

        let size = window.inner_size();
        info!(
            "created window \"{}\" ({}x{})",
            config.window_title, size.width, size.height
        );

        Ok(Self {
            event_loop,
            window: Arc::new(window),
            queue: VecDeque::new(),
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn post_quit(&mut self, code: i32) {
        self.queue.push_back(Message::Quit(code));
    }

    fn poll(&mut self) {
        let queue = &mut self.queue;
        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, _| match event {
                // the frame loop renders whenever the queue is empty
                Event::WindowEvent {
                    event: WindowEvent::RedrawRequested,
                    ..
                } => {}
                Event::WindowEvent { .. } => queue.push_back(Message::Event(event)),
                _ => {}
            });

        if let PumpStatus::Exit(code) = status {
            debug!("event loop exited with status {code}");
            self.queue.push_back(Message::Quit(code));
        }
    }
}

impl MessageSource for WindowHost {
    fn pump_one(&mut self) -> Option<Message> {
        if self.queue.is_empty() {
            self.poll();
        }
        self.queue.pop_front()
    }

    fn dispatch(&mut self, message: Message, handler: &mut dyn MessageHandler) {
        if handler.handle(&message) {
            return;
        }

        match message.window_event() {
            Some(WindowEvent::CloseRequested) | Some(WindowEvent::Destroyed) => {
                debug!("window closed");
                self.post_quit(0);
            }
            _ => {}
        }
    }
}
