use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use std::{env, process, thread};

use rustychat::config::Config;
use rustychat::log::{LogLevel, LogSink, Logger, LoggerHandle, QueueLogSink};
use rustychat::server::{Multiplexer, ServerConfig, ServerStats};

const OBSERVER_TICK: Duration = Duration::from_millis(200);

static SHUTDOWN_FLAG: std::sync::LazyLock<Arc<AtomicBool>> =
    std::sync::LazyLock::new(|| Arc::new(AtomicBool::new(false)));

fn main() {
    // --- Parse CLI args ----------------------------------------------------
    //
    //   chat_server                 -> defaults (0.0.0.0, any free port)
    //   chat_server chat.conf       -> [Server] / [Logging] from the file
    let args: Vec<String> = env::args().collect();
    let config = match args.len() {
        1 => Config::empty(),
        2 => Config::load(&args[1]).unwrap_or_else(|e| fail(&e)),
        _ => {
            eprintln!("Usage:");
            eprintln!("  {}            # listen on 0.0.0.0, OS-assigned port", args[0]);
            eprintln!("  {} [CONFIG]   # e.g. chat.conf", args[0]);
            process::exit(1);
        }
    };
    let server_cfg = ServerConfig::from_config(&config).unwrap_or_else(|e| fail(&e));

    // --- Logging -----------------------------------------------------------
    let logger = Logger::start_server(1024, &config);
    let file_log = logger.handle();
    let queue = Arc::new(QueueLogSink::new());

    let mut mux = Multiplexer::bind(&server_cfg, queue.clone()).unwrap_or_else(|e| fail(&e));
    println!("chat_server listening on port {}", mux.bound_port());
    eprintln!("[chat_server] logging to {}", logger.file_path().display());

    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::flag;
    for sig in [SIGINT, SIGTERM] {
        if let Err(e) = flag::register(sig, Arc::clone(&SHUTDOWN_FLAG)) {
            file_log.log(
                LogLevel::Warn,
                &format!("cannot install handler for signal {sig}: {e}"),
                module_path!(),
            );
        }
    }

    // --- Observer: log queue + counters, off the event loop ----------------
    let observer_done = Arc::new(AtomicBool::new(false));
    let observer = {
        let done = Arc::clone(&observer_done);
        let stats = mux.stats();
        thread::Builder::new()
            .name("stats-observer".into())
            .spawn(move || observe(&queue, &file_log, &stats, &done))
    };

    // --- Event loop (blocks until SIGINT/SIGTERM) --------------------------
    mux.run(&SHUTDOWN_FLAG);

    observer_done.store(true, Ordering::SeqCst);
    match observer {
        Ok(handle) => {
            let _ = handle.join();
        }
        Err(e) => eprintln!("[chat_server] observer thread failed to start: {e}"),
    }
    eprintln!("[chat_server] stopped");
}

/// Forward queued loop events to stderr and the log file; report counter changes.
fn observe(queue: &QueueLogSink, file_log: &LoggerHandle, stats: &ServerStats, done: &AtomicBool) {
    let mut last = (usize::MAX, u64::MAX);
    loop {
        let stopping = done.load(Ordering::SeqCst);
        for msg in queue.drain() {
            eprintln!("[{}] {}", msg.level, msg.text);
            let _ = file_log.try_forward(msg);
        }

        let now = (stats.connected(), stats.frames_relayed());
        if now != last {
            let _ = file_log.try_log(
                LogLevel::Info,
                format!("stats: {} connected, {} frames relayed", now.0, now.1),
                module_path!(),
            );
            last = now;
        }

        if stopping {
            break;
        }
        thread::sleep(OBSERVER_TICK);
    }
}

fn fail(e: &dyn std::fmt::Display) -> ! {
    eprintln!("[chat_server] {e}");
    process::exit(1);
}
