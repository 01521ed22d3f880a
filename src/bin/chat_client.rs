use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use std::{env, process, thread};

use rustychat::client::{ChatEvent, ClientConfig, ClientSession};
use rustychat::config::Config;
use rustychat::log::{LogSink, Logger};

/// How often queued events are rendered while waiting for input.
const RENDER_TICK: Duration = Duration::from_millis(100);
const EXIT_COMMAND: &str = "exit";

fn main() {
    // --- Parse CLI args ----------------------------------------------------
    //
    //   chat_client                          -> 127.0.0.1:5000 as "anonymous"
    //   chat_client chat.conf                -> [Client] / [Logging] from the file
    //   chat_client 127.0.0.1:5000 Alice     -> explicit address and username
    //   chat_client chat.conf 10.0.0.2:5000 Alice
    let args: Vec<String> = env::args().collect();
    let (config, overrides) = match args.len() {
        1 => (Config::empty(), None),
        2 => (load(&args[1]), None),
        3 => (Config::empty(), Some((&args[1], &args[2]))),
        4 => (load(&args[1]), Some((&args[2], &args[3]))),
        _ => {
            eprintln!("Usage:");
            eprintln!("  {}                           # 127.0.0.1:5000", args[0]);
            eprintln!("  {} [CONFIG]                  # e.g. chat.conf", args[0]);
            eprintln!("  {} [ADDR] [USERNAME]         # e.g. 127.0.0.1:5000 Alice", args[0]);
            eprintln!("  {} [CONFIG] [ADDR] [USERNAME]", args[0]);
            process::exit(1);
        }
    };

    let mut client_cfg = ClientConfig::from_config(&config).unwrap_or_else(|e| fail(&e));
    if let Some((addr, username)) = overrides {
        client_cfg.server_addr = addr.clone();
        client_cfg.username = username.clone();
    }

    let logger = Logger::start_client(1024, &config);
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    let session = ClientSession::connect(&client_cfg, log_sink).unwrap_or_else(|e| {
        fail(&format!(
            "cannot connect to {} as {}: {e}",
            client_cfg.server_addr, client_cfg.username
        ))
    });
    println!(
        "Connected to {} as {}. Type '{}' to quit.",
        session.server_addr(),
        session.username(),
        EXIT_COMMAND
    );

    // Stdin is read on its own thread so incoming lines render while idle.
    let (tx, rx) = mpsc::channel::<String>();
    let _ = thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

    loop {
        match rx.recv_timeout(RENDER_TICK) {
            Ok(line) => {
                let line = line.trim_end_matches(['\r', '\n']);
                if line == EXIT_COMMAND {
                    println!("Exiting...");
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                if let Err(e) = session.send(line) {
                    eprintln!("[system] message not sent: {e}");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        render_pending(&session);
    }
    render_pending(&session);
}

fn render_pending(session: &ClientSession) {
    let mut out = io::stdout().lock();
    session.drain_with(|ev| {
        let _ = match &ev {
            ChatEvent::Message(_) => writeln!(out, "{ev}"),
            ChatEvent::System(_) => writeln!(out, "\x1b[2m{ev}\x1b[0m"),
        };
    });
    let _ = out.flush();
}

fn load(path: &str) -> Config {
    Config::load(path).unwrap_or_else(|e| fail(&e))
}

fn fail(e: &dyn std::fmt::Display) -> ! {
    eprintln!("[chat_client] {e}");
    process::exit(1);
}
