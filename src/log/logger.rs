use crate::{
    config::Config,
    log::{log_level::LogLevel, log_msg::LogMsg, logger_handle::LoggerHandle},
};

use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, TrySendError},
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

/// Flush to disk every 100 lines if debugging/tracing (to see crashes near real-time).
#[cfg(feature = "log-debug")]
const FLUSH_BATCH_SIZE: u32 = 100;

/// Flush to disk every 1000 lines in production/default (to save I/O & CPU).
#[cfg(not(feature = "log-debug"))]
const FLUSH_BATCH_SIZE: u32 = 1_000;

/// Warn/Error lines are flushed immediately regardless of the batch.
const URGENT: LogLevel = LogLevel::Warn;

/// Bounded, non-blocking logger that writes to a per-process log file.
///
/// Producers call [`LoggerHandle::try_log`] (or use the `sink_*!` macros on a
/// handle); a `logger-worker` thread drains the bounded channel and appends
/// `[LEVEL] ts_ms target | text` lines to the file.
pub struct Logger {
    handle: LoggerHandle,
    _thread: Option<thread::JoinHandle<()>>,
    file_path: PathBuf,
}

impl Logger {
    /// Logger for the chat client, named by `[Logging] client_log_filename`.
    #[must_use]
    pub fn start_client(cap: usize, config: &Config) -> Self {
        Self::start("client_log_filename", "chat_client", cap, config)
    }

    /// Logger for the chat server, named by `[Logging] server_log_filename`.
    #[must_use]
    pub fn start_server(cap: usize, config: &Config) -> Self {
        Self::start("server_log_filename", "chat_server", cap, config)
    }

    fn start(fn_key: &str, fallback_name: &str, cap: usize, config: &Config) -> Self {
        let app_name = config
            .get_non_empty("Logging", fn_key)
            .unwrap_or(fallback_name);

        match config.get_non_empty("Logging", "log_path") {
            Some(dir) => Self::start_in_dir(expand_path(dir), Some(app_name), cap),
            None => Self::start_default(Some(app_name), cap),
        }
    }

    /// Starts the logger in a `logs/` directory next to the executable.
    ///
    /// # Example Filename
    /// `target/debug/logs/chat_server-20251102_023045-pid1234.log`
    #[must_use]
    pub fn start_default(app_name: Option<&str>, cap: usize) -> Self {
        let base = exe_dir_fallback_cwd().join("logs");
        Self::start_in_dir(base, app_name, cap)
    }

    /// Starts the logger in a specific directory, creating it if missing.
    ///
    /// # Arguments
    ///
    /// * `dir` - The directory where the log file will be created.
    /// * `app_name` - Optional prefix for the log filename.
    /// * `cap` - Capacity of the log channel; overflow is dropped, never blocks.
    pub fn start_in_dir<D: AsRef<Path>>(dir: D, app_name: Option<&str>, cap: usize) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let _ = fs::create_dir_all(&dir);

        let ts = timestamp_for_filename();
        let pid = std::process::id();
        let fname = match app_name {
            Some(name) => format!("{name}-{ts}-pid{pid}.log"),
            None => format!("{ts}-pid{pid}.log"),
        };
        let file_path = dir.join(&fname);

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap.max(1));
        let worker_path = file_path.clone();

        let _thread = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || write_loop(&worker_path, &rx))
            .ok();

        Self {
            handle: LoggerHandle { tx },
            _thread,
            file_path,
        }
    }

    /// Attempts to enqueue a log message without blocking the current thread.
    ///
    /// If the channel is full the message is **dropped** and an error is returned.
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), TrySendError<LogMsg>> {
        self.handle.try_log(level, text, target)
    }

    /// Returns a cloneable handle to the logger sink.
    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    /// Returns the path of the active log file.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Worker body: target file, then a temp-dir fallback, then a sink. Never panics.
fn write_loop(path: &Path, rx: &mpsc::Receiver<LogMsg>) {
    let writer: Box<dyn Write + Send> = match open_append(path) {
        Ok(f) => Box::new(f),
        Err(_) => match open_append(&std::env::temp_dir().join("rustychat-fallback.log")) {
            Ok(f) => Box::new(f),
            Err(_) => Box::new(io::sink()),
        },
    };
    let mut out = BufWriter::new(writer);
    let mut lines_written: u32 = 0;

    while let Ok(m) = rx.recv() {
        let _ = writeln!(out, "[{}] {} {} | {}", m.level, m.ts_ms, m.target, m.text);
        lines_written = lines_written.wrapping_add(1);

        if m.level >= URGENT || lines_written.is_multiple_of(FLUSH_BATCH_SIZE) {
            let _ = out.flush();
        }
    }

    let _ = out.flush();
}

fn open_append(path: &Path) -> io::Result<fs::File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Directory of the running executable, or the current directory on error.
fn exe_dir_fallback_cwd() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// `YYYYMMDD_HHMMSS` in UTC, without pulling in a date crate.
fn timestamp_for_filename() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    match civil_from_unix(secs) {
        Some((y, mo, d, h, mi, s)) => format!("{y:04}{mo:02}{d:02}_{h:02}{mi:02}{s:02}"),
        None => format!("unix_{secs}"),
    }
}

/// Unix seconds to (year, month, day, hour, minute, second), proleptic Gregorian UTC.
#[allow(clippy::many_single_char_names)]
fn civil_from_unix(secs: u64) -> Option<(i32, u32, u32, u32, u32, u32)> {
    let sec = (secs % 60) as u32;
    let min = ((secs / 60) % 60) as u32;
    let hour = ((secs / 3_600) % 24) as u32;
    let days = i128::from(secs / 86_400);

    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe + era * 400 + i128::from(m <= 2);

    Some((
        i32::try_from(y).ok()?,
        u32::try_from(m).ok()?,
        u32::try_from(d).ok()?,
        hour,
        min,
        sec,
    ))
}

/// Expands a leading `~` to the user's home directory.
fn expand_path(path_str: &str) -> PathBuf {
    let home = || {
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from)
    };
    if path_str == "~" {
        if let Some(h) = home() {
            return h;
        }
    }
    if let Some(rest) = path_str
        .strip_prefix("~/")
        .or_else(|| path_str.strip_prefix("~\\"))
    {
        if let Some(h) = home() {
            return h.join(rest);
        }
    }
    PathBuf::from(path_str)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn civil_date_known_points() {
        assert_eq!(civil_from_unix(0), Some((1970, 1, 1, 0, 0, 0)));
        // 2009-02-13 23:31:30 UTC
        assert_eq!(
            civil_from_unix(1_234_567_890),
            Some((2009, 2, 13, 23, 31, 30))
        );
        // leap day
        assert_eq!(civil_from_unix(951_782_400), Some((2000, 2, 29, 0, 0, 0)));
    }

    #[test]
    fn relative_paths_are_untouched() {
        assert_eq!(expand_path("logs/x"), PathBuf::from("logs/x"));
    }

    #[test]
    fn writes_lines_to_file() {
        let dir = std::env::temp_dir().join(format!("rustychat-logger-{}", std::process::id()));
        let logger = Logger::start_in_dir(&dir, Some("unit"), 16);
        logger
            .try_log(LogLevel::Error, "listener died", "tests")
            .unwrap();
        let path = logger.file_path().to_path_buf();
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("unit-")
        );

        // Error lines are flushed immediately by the worker.
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut contents = String::new();
        while Instant::now() < deadline {
            contents = fs::read_to_string(&path).unwrap_or_default();
            if contents.contains("listener died") {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(contents.contains("[ERROR]"), "got: {contents:?}");
        let _ = fs::remove_dir_all(&dir);
    }
}
