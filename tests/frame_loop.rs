use std::collections::VecDeque;

use gui_demo::frame_loop::{launch, Frame, FrameLoop, Step};
use gui_demo::graphics::{check_feature_level, FeatureLevel};
use gui_demo::window::{Message, MessageHandler, MessageSource};
use gui_demo::{Error, GraphicsStep, Result};
use winit::event::Event;

/// What the mock source hands out when asked for a message.
enum Slot {
    Empty,
    Message(Message),
}

#[derive(Default)]
struct MockSource {
    script: VecDeque<Slot>,
    pumps: usize,
    dispatched: usize,
}

impl MockSource {
    fn idle(mut self, iterations: usize) -> Self {
        self.script.extend((0..iterations).map(|_| Slot::Empty));
        self
    }

    fn message(mut self, message: Message) -> Self {
        self.script.push_back(Slot::Message(message));
        self
    }
}

impl MessageSource for MockSource {
    fn pump_one(&mut self) -> Option<Message> {
        self.pumps += 1;
        match self.script.pop_front() {
            Some(Slot::Message(message)) => Some(message),
            Some(Slot::Empty) | None => None,
        }
    }

    fn dispatch(&mut self, message: Message, handler: &mut dyn MessageHandler) {
        self.dispatched += 1;
        handler.handle(&message);
    }
}

#[derive(Default)]
struct MockApp {
    updates: usize,
    draws: usize,
    handled: usize,
    /// `handled` at the time of every draw
    handled_at_draw: Vec<usize>,
}

impl MessageHandler for MockApp {
    fn handle(&mut self, _message: &Message) -> bool {
        self.handled += 1;
        false
    }
}

impl Frame for MockApp {
    fn update(&mut self) -> Result<()> {
        self.updates += 1;
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        assert_eq!(self.updates, self.draws + 1, "draw without update");
        self.draws += 1;
        self.handled_at_draw.push(self.handled);
        Ok(())
    }
}

#[test]
fn renders_every_idle_iteration() {
    let mut frame_loop = FrameLoop::new(MockSource::default().idle(100));
    let mut app = MockApp::default();

    for _ in 0..100 {
        assert_eq!(frame_loop.step(&mut app).unwrap(), Step::Rendered);
    }

    assert_eq!(app.updates, 100);
    assert_eq!(app.draws, 100);
    assert_eq!(frame_loop.frames(), 100);
    assert_eq!(frame_loop.source().pumps, 100);
}

#[test]
fn quit_after_three_frames_stops_drawing() {
    let source = MockSource::default()
        .idle(3)
        .message(Message::Quit(7))
        .idle(5);
    let mut app = MockApp::default();

    let code = FrameLoop::new(source).run(&mut app).unwrap();

    assert_eq!(code, 7);
    assert_eq!(app.draws, 3);
    assert_eq!(app.updates, 3);
    assert_eq!(app.handled, 0);
}

#[test]
fn pending_messages_are_drained_before_rendering() {
    let source = MockSource::default()
        .message(Message::Event(Event::Resumed))
        .message(Message::Event(Event::Suspended))
        .idle(1)
        .message(Message::Event(Event::Resumed))
        .idle(1)
        .message(Message::Quit(0));
    let mut frame_loop = FrameLoop::new(source);
    let mut app = MockApp::default();

    let steps: Vec<Step> = (0..6).map(|_| frame_loop.step(&mut app).unwrap()).collect();

    assert_eq!(
        steps,
        vec![
            Step::Drained,
            Step::Drained,
            Step::Rendered,
            Step::Drained,
            Step::Rendered,
            Step::Exit(0),
        ]
    );
    assert_eq!(app.handled_at_draw, vec![2, 3]);
    assert_eq!(frame_loop.source().dispatched, 3);
}

#[test]
fn quit_message_is_not_dispatched() {
    let source = MockSource::default().message(Message::Quit(0));
    let mut frame_loop = FrameLoop::new(source);
    let mut app = MockApp::default();

    assert_eq!(frame_loop.step(&mut app).unwrap(), Step::Exit(0));
    assert_eq!(frame_loop.source().dispatched, 0);
    assert_eq!(app.handled, 0);
}

struct FailingApp;

impl MessageHandler for FailingApp {
    fn handle(&mut self, _message: &Message) -> bool {
        false
    }
}

impl Frame for FailingApp {
    fn update(&mut self) -> Result<()> {
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        Err(Error::GraphicsResource {
            step: GraphicsStep::Frame,
            message: "out of memory".to_string(),
        })
    }
}

#[test]
fn draw_failure_ends_the_loop() {
    let source = MockSource::default().idle(10);
    let result = FrameLoop::new(source).run(&mut FailingApp);

    assert!(matches!(
        result,
        Err(Error::GraphicsResource {
            step: GraphicsStep::Frame,
            ..
        })
    ));
}

/// Counts pumps on a source shared with the test.
struct CountingSource<'a> {
    pumps: &'a std::cell::Cell<usize>,
}

impl MessageSource for CountingSource<'_> {
    fn pump_one(&mut self) -> Option<Message> {
        self.pumps.set(self.pumps.get() + 1);
        Some(Message::Quit(0))
    }

    fn dispatch(&mut self, _message: Message, _handler: &mut dyn MessageHandler) {}
}

#[test]
fn unsupported_hardware_aborts_before_pumping() {
    let pumps = std::cell::Cell::new(0);
    let source = CountingSource { pumps: &pumps };

    let result = launch(source, |_| -> Result<MockApp> {
        check_feature_level(FeatureLevel::Sm4, FeatureLevel::Sm5)?;
        Ok(MockApp::default())
    });

    assert!(matches!(
        result,
        Err(Error::UnsupportedHardware {
            found: FeatureLevel::Sm4,
            required: FeatureLevel::Sm5,
        })
    ));
    assert_eq!(pumps.get(), 0);
}

#[test]
fn launch_returns_the_quit_payload() {
    let source = MockSource::default().idle(2).message(Message::Quit(3));
    let code = launch(source, |_| Ok(MockApp::default())).unwrap();
    assert_eq!(code, 3);
}
