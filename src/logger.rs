//! One sink for all activity: timestamped lines on stdout, teed into an
//! append-mode file when the operator asks for one.

use chrono::Local;
use log::{Level, LevelFilter, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

struct Sink {
    file: Option<Mutex<File>>,
}

impl log::Log for Sink {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Info
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let tag = match record.level() {
            Level::Error | Level::Warn => '!',
            _ => '*',
        };
        let line = format!(
            "[{}] [{}] {}",
            Local::now().format("%H:%M:%S"),
            tag,
            record.args()
        );

        println!("{}", line);

        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = writeln!(file, "{}", line);
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
    }
}

/// Installs the process-wide logger, before the first log line.
///
/// Opening the log file is the only thing that can fail here, and the caller
/// treats that as a startup error.
pub fn init(logfile: Option<&Path>) -> io::Result<()> {
    let file = match logfile {
        Some(path) => Some(Mutex::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    log::set_boxed_logger(Box::new(Sink { file }))
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    log::set_max_level(LevelFilter::Info);

    Ok(())
}
