use gui_demo::{app::App, config::Config, dialog, frame_loop, window::WindowHost};

fn run(config: &Config) -> gui_demo::Result<i32> {
    let host = WindowHost::create(config)?;
    frame_loop::launch(host, |host| App::new(host.window(), config))
}

fn main() {
    env_logger::init();

    let config = Config::default();
    let code = match run(&config) {
        Ok(code) => code,
        Err(e) => {
            dialog::report_fatal(&config.window_title, &e);
            1
        }
    };
    std::process::exit(code);
}
