//! Log sink initialization.
//!
//! Timestamped, leveled text lines through `tracing`. When a log file is
//! configured the sink rotates by byte ceiling, shifting older files to
//! numeric suffixes (`openblit.log.1`, `.2`, …).

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use crate::settings::{LogLevel, Settings};

pub const DEFAULT_MAX_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: u32 = 3;

const TIMESTAMP_FORMAT: &str = "[%Y-%m-%d %H:%M:%S%.3f]";

/// A log file that rotates once it crosses a byte ceiling.
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    max_files: u32,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn create(path: &Path, max_bytes: u64, max_files: u32) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes: max_bytes.max(1),
            max_files: max_files.max(1),
            file,
            written: 0,
        })
    }

    fn suffixed(&self, index: u32) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    /// Shift `base` -> `.1` -> `.2` … dropping the oldest, then reopen.
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        let _ = std::fs::remove_file(self.suffixed(self.max_files));
        for i in (1..self.max_files).rev() {
            let _ = std::fs::rename(self.suffixed(i), self.suffixed(i + 1));
        }
        let _ = std::fs::rename(&self.path, self.suffixed(1));

        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written >= self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Cloneable handle usable as a `tracing` writer.
#[derive(Clone)]
pub struct RotatingWriter(Arc<Mutex<RotatingFile>>);

impl RotatingWriter {
    pub fn create(path: &Path, max_bytes: u64, max_files: u32) -> io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(RotatingFile::create(
            path, max_bytes, max_files,
        )?))))
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.0.lock() {
            Ok(mut file) => file.write(buf),
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.0.lock() {
            Ok(mut file) => file.flush(),
            Err(_) => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RotatingWriter {
    type Writer = RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn filter_for(level: LogLevel) -> EnvFilter {
    let directive = match level {
        LogLevel::Off => "off",
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };
    EnvFilter::new(directive)
}

/// Install the global subscriber from the resolved settings. Safe to call
/// more than once; later calls are ignored.
pub fn init(settings: &Settings) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_for(settings.log_level))
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    if let Some(path) = &settings.log_file {
        match RotatingWriter::create(path, DEFAULT_MAX_BYTES, DEFAULT_MAX_FILES) {
            Ok(writer) => {
                let _ = builder.with_writer(writer).try_init();
                return;
            }
            Err(err) => {
                eprintln!("openblit: cannot open log file {}: {err}", path.display());
            }
        }
    }
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("openblit-log-test-{}-{name}", std::process::id()));
        p
    }

    #[test]
    fn rotation_shifts_suffixes() {
        let path = scratch_path("rotate.log");
        let _ = std::fs::remove_file(&path);

        // Tiny ceiling: every line after the first triggers a rotation.
        let mut file = RotatingFile::create(&path, 8, 2).unwrap();
        file.write_all(b"first line\n").unwrap();
        file.write_all(b"second line\n").unwrap();
        file.write_all(b"third line\n").unwrap();
        file.flush().unwrap();

        let current = std::fs::read_to_string(&path).unwrap();
        assert_eq!(current, "third line\n");
        let one = std::fs::read_to_string(file.suffixed(1)).unwrap();
        assert_eq!(one, "second line\n");
        let two = std::fs::read_to_string(file.suffixed(2)).unwrap();
        assert_eq!(two, "first line\n");

        for p in [path.clone(), file.suffixed(1), file.suffixed(2)] {
            let _ = std::fs::remove_file(p);
        }
    }

    #[test]
    fn oldest_file_is_dropped() {
        let path = scratch_path("drop.log");
        let _ = std::fs::remove_file(&path);

        let mut file = RotatingFile::create(&path, 4, 1).unwrap();
        file.write_all(b"aaaaa\n").unwrap();
        file.write_all(b"bbbbb\n").unwrap();
        file.write_all(b"ccccc\n").unwrap();

        // With a single archived file, only `.1` survives.
        assert!(file.suffixed(1).exists());
        assert!(!file.suffixed(2).exists());

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(file.suffixed(1));
    }
}
