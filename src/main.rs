use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cubist_xr::options::{parse_args, usage};
use cubist_xr::{App, Invocation};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("[cubist] fatal: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let options = match parse_args(env::args().skip(1))? {
        Invocation::Run(options) => options,
        Invocation::Help => {
            println!("{}", usage());
            return Ok(());
        }
    };

    let quit = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&quit);
    ctrlc::set_handler(move || {
        log::info!("[cubist] interrupt received, shutting down");
        handler_flag.store(true, Ordering::Relaxed);
    })?;

    // The runtime can ask for a full teardown and restart (session loss,
    // runtime loss). Everything session-scoped lives inside App, so a
    // restart is just a fresh one.
    loop {
        let mut app = App::new(options.clone());
        let summary = app.run(&quit)?;
        log::info!("[cubist] session over, {} frames rendered", summary.frames_rendered);
        if !summary.restart_requested || quit.load(Ordering::Relaxed) {
            return Ok(());
        }
        log::info!("[cubist] runtime requested restart");
    }
}
