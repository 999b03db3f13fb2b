//! `env_logger` setup that mirrors every record to stderr and a log file.
//!
//! Each CLI command gets its own folder, and every run its own file:
//! `logs/<command>/<YYYY-mm-dd_HH-MM-SS>.log`.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Formats a log line as `<timestamp> - <target> - <LEVEL> - <message>`.
pub fn format_line(
    timestamp: &chrono::DateTime<chrono::Local>,
    target: &str,
    level: log::Level,
    message: &std::fmt::Arguments<'_>,
) -> String {
    format!(
        "{} - {} - {} - {}",
        timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        target,
        level,
        message
    )
}

/// Path of the log file for one run of `command`.
pub fn log_file_path(logs_dir: &Path, command: &str, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    logs_dir
        .join(command)
        .join(format!("{}.log", now.format("%Y-%m-%d_%H-%M-%S")))
}

/// Writer that duplicates every write into stderr and a file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Initialise logging for `command`.
///
/// Falls back to stderr-only logging when the log file cannot be created.
/// Returns the log file path when one is in use.
pub fn init(logs_dir: &Path, command: &str) -> Option<PathBuf> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{}",
            format_line(
                &chrono::Local::now(),
                record.target(),
                record.level(),
                record.args()
            )
        )
    });

    let path = log_file_path(logs_dir, command, chrono::Local::now());
    let file = path
        .parent()
        .map(std::fs::create_dir_all)
        .transpose()
        .and_then(|_| File::create(&path));

    let used = match file {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
            Some(path)
        }
        Err(e) => {
            eprintln!("could not open log file {} ({e}); logging to stderr only", path.display());
            None
        }
    };

    builder.init();
    used
}
