//! Log file writers
//!
//! With a log directory configured every run writes JSON logs to two files:
//! a per-run file named after the start time and a shared file that rotates
//! by size. Both writers plug into `tracing-subscriber` via [`MakeWriter`].
//!
//! [`MakeWriter`]: tracing_subscriber::fmt::MakeWriter

use chrono::NaiveDateTime;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared log file, appended to by every run
pub const GENERAL_LOG_FILE: &str = "pricing_pipeline.log";

/// Maximum size of the shared log file before rotation (10MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated copies of the shared log file kept on disk
pub const DEFAULT_MAX_FILES: usize = 5;

/// Per-run log file path, e.g. `pricing_run_20240501_020000.log`
pub fn run_log_path(dir: &Path, started_at: NaiveDateTime) -> PathBuf {
    dir.join(format!("pricing_run_{}.log", started_at.format("%Y%m%d_%H%M%S")))
}

fn lock<T>(mutex: &Mutex<T>) -> io::Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

// ============================================================================
// Per-run file
// ============================================================================

/// Appends to a single file for the lifetime of one run
#[derive(Debug, Clone)]
pub struct RunLogWriter {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl RunLogWriter {
    pub fn create(dir: &Path, started_at: NaiveDateTime) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = run_log_path(dir, started_at);
        let file = open_append(&path)?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Write for RunLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.file)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        lock(&self.file)?.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for RunLogWriter {
    type Writer = RunLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

// ============================================================================
// Shared rotating file
// ============================================================================

/// A size-based rolling file writer
///
/// Once the file would exceed `max_size` it is renamed with a numeric
/// suffix (`.1` newest) and a fresh file is opened; at most `max_files`
/// rotated copies are kept.
#[derive(Debug, Clone)]
pub struct SizeBasedRollingWriter {
    inner: Arc<Mutex<RollingState>>,
}

#[derive(Debug)]
struct RollingState {
    base_path: PathBuf,
    file: Option<File>,
    current_size: u64,
    max_size: u64,
    max_files: usize,
}

impl SizeBasedRollingWriter {
    pub fn new(path: impl AsRef<Path>, max_size: u64, max_files: usize) -> io::Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if let Some(parent) = base_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let current_size = fs::metadata(&base_path).map(|m| m.len()).unwrap_or(0);
        let file = open_append(&base_path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(RollingState {
                base_path,
                file: Some(file),
                current_size,
                max_size,
                max_files,
            })),
        })
    }

    /// Shared log file inside `dir` with the default limits
    pub fn in_dir(dir: &Path) -> io::Result<Self> {
        Self::new(dir.join(GENERAL_LOG_FILE), DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_FILES)
    }
}

impl RollingState {
    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;

        // Shift app.log.N-1 -> app.log.N, dropping the oldest
        for i in (1..=self.max_files).rev() {
            let from = self.rotated_path(i);
            if !from.exists() {
                continue;
            }
            if i == self.max_files {
                fs::remove_file(&from)?;
            } else {
                fs::rename(&from, self.rotated_path(i + 1))?;
            }
        }

        if self.max_files > 0 && self.base_path.exists() {
            fs::rename(&self.base_path, self.rotated_path(1))?;
        } else if self.base_path.exists() {
            fs::remove_file(&self.base_path)?;
        }

        self.file = Some(open_append(&self.base_path)?);
        self.current_size = 0;
        Ok(())
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        let mut name = self.base_path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }
}

impl Write for SizeBasedRollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = lock(&self.inner)?;

        if state.current_size > 0 && state.current_size + buf.len() as u64 > state.max_size {
            state.rotate()?;
        }

        let file = state
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file not open"))?;
        let written = file.write(buf)?;
        state.current_size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock(&self.inner)?.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SizeBasedRollingWriter {
    type Writer = SizeBasedRollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
