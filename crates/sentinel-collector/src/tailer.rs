//! Rotation-aware tailing of a single log file.
//!
//! A [`FileTailer`] owns its file handle and yields each newly appended
//! line exactly once, following the file across rotations and truncations
//! by watching the inode and size at every EOF.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use sentinel_core::SentinelError;

/// Default cap on bytes read from one file in a single poll pass.
pub const DEFAULT_MAX_READ_BYTES: u64 = 1024 * 1024;

/// Route an I/O failure to the right log level: transient conditions are
/// expected while a file is missing or mid-rotation, so the tailer idles
/// at debug instead of warning on every poll.
fn log_io(err: &SentinelError) {
    if err.is_transient() {
        debug!(error = %err, "tailer idling");
    } else {
        warn!(error = %err, "tailer error");
    }
}

/// Tails a single file, handling rotation by monitoring the inode.
///
/// The tailer is restartable: [`FileTailer::close`] releases the handle and
/// a later [`FileTailer::poll`] reopens it. A missing file is never fatal;
/// the tailer idles and retries on the next poll.
pub struct FileTailer {
    path: PathBuf,
    start_at_end: bool,
    max_read_bytes: u64,
    file: Option<File>,
    inode: u64,
    offset: u64,
    /// Bytes of a line whose terminator has not arrived yet
    partial: Vec<u8>,
    /// Whether a file has ever been opened; later opens never seek to end
    opened_before: bool,
}

impl FileTailer {
    /// Create a tailer for `path`. With `start_at_end`, the first open
    /// seeks to EOF so only lines appended afterwards are emitted.
    pub fn new(path: impl Into<PathBuf>, start_at_end: bool) -> Self {
        Self {
            path: path.into(),
            start_at_end,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            file: None,
            inode: 0,
            offset: 0,
            partial: Vec::new(),
            opened_before: false,
        }
    }

    /// Cap the bytes read per poll pass.
    pub fn with_max_read_bytes(mut self, max: u64) -> Self {
        self.max_read_bytes = max.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain newly appended complete lines into `out`, stripped of
    /// surrounding whitespace. Returns the number of lines appended.
    pub fn poll(&mut self, out: &mut Vec<String>) -> usize {
        let before = out.len();

        if self.file.is_none() && !self.open() {
            return 0;
        }

        let mut budget = self.max_read_bytes;
        loop {
            let read = self.read_some(out, &mut budget);
            if budget == 0 {
                // Hit the per-pass cap; the rest stays on disk for the
                // next poll.
                break;
            }
            if read > 0 {
                continue;
            }

            // EOF: run the rotation protocol.
            match std::fs::metadata(&self.path) {
                Ok(meta) if meta.ino() != self.inode || meta.len() < self.offset => {
                    info!(path = %self.path.display(), "file rotated, reopening");
                    self.flush_partial(out);
                    self.close();
                    if !self.open() {
                        break;
                    }
                }
                Ok(_) => break,
                Err(_) => {
                    // Deleted or moved with no replacement yet; retry on
                    // the next poll.
                    debug!(path = %self.path.display(), "file missing at EOF");
                    self.flush_partial(out);
                    self.close();
                    break;
                }
            }
        }

        out.len() - before
    }

    /// Release the file handle. The tailer can be polled again afterwards.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Open the file and record its inode and starting offset.
    /// Returns false when the file cannot be opened.
    ///
    /// A reopen of the same inode resumes at the recorded offset so no
    /// line is emitted twice; a new inode (rotation, recreation) is read
    /// from the start.
    fn open(&mut self) -> bool {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return false,
            Err(e) => {
                log_io(&SentinelError::io("opening log file", &self.path, e));
                return false;
            }
        };

        let meta = match file.metadata() {
            Ok(m) => m,
            Err(e) => {
                log_io(&SentinelError::io("statting log file", &self.path, e));
                return false;
            }
        };

        let resume =
            self.opened_before && meta.ino() == self.inode && meta.len() >= self.offset;
        if !resume {
            self.offset = if self.start_at_end && !self.opened_before {
                meta.len()
            } else {
                0
            };
            self.partial.clear();
        }

        self.inode = meta.ino();
        self.opened_before = true;

        if self.offset > 0 {
            if let Err(e) = file.seek(SeekFrom::Start(self.offset)) {
                log_io(&SentinelError::io("seeking in log file", &self.path, e));
                return false;
            }
        }

        self.file = Some(file);
        true
    }

    /// Read one chunk from the handle, splitting complete lines into `out`.
    /// Returns the number of bytes consumed (0 at EOF).
    fn read_some(&mut self, out: &mut Vec<String>, budget: &mut u64) -> usize {
        let Some(file) = self.file.as_mut() else {
            return 0;
        };

        let want = (*budget).min(8192) as usize;
        let mut buf = vec![0u8; want];
        let n = match file.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                log_io(&SentinelError::io("reading log file", &self.path, e));
                return 0;
            }
        };
        if n == 0 {
            return 0;
        }

        self.offset += n as u64;
        *budget -= n as u64;
        self.partial.extend_from_slice(&buf[..n]);

        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            push_stripped(&line, out);
        }

        n
    }

    /// Emit a buffered non-terminated fragment. Called before the handle is
    /// dropped on rotation so no bytes are lost.
    fn flush_partial(&mut self, out: &mut Vec<String>) {
        if self.partial.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.partial);
        push_stripped(&line, out);
    }
}

fn push_stripped(raw: &[u8], out: &mut Vec<String>) {
    let text = String::from_utf8_lossy(raw);
    let stripped = text.trim();
    if !stripped.is_empty() {
        out.push(stripped.to_string());
    }
}
