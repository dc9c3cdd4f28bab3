use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Remembered read position for one tailed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailCursor {
    /// Byte offset of the first byte not yet returned to the caller.
    pub offset: u64,
}

/// Incremental reader returning only the lines appended to a file since the
/// previous poll.
///
/// One cursor is kept per path and created lazily on the first poll. The tailer
/// is a single consumer: two tailers polling the same file each see every line.
#[derive(Debug, Default)]
pub struct LogTailer {
    cursors: HashMap<PathBuf, TailCursor>,
}

impl LogTailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the complete lines appended to `path` since the last poll.
    ///
    /// A trailing line without a newline is left for a later poll, since the
    /// writer may still be in the middle of it. A missing file yields no lines.
    /// If the file shrank below the remembered offset it is assumed to have been
    /// truncated or rotated: a warning is logged and reading restarts at zero.
    pub fn poll(&mut self, path: &Path) -> io::Result<Vec<String>> {
        self.read_new(path, false)
    }

    /// Like [`poll`](Self::poll), but also returns a trailing unterminated line.
    ///
    /// Use this once the writer is known to have exited.
    pub fn poll_to_end(&mut self, path: &Path) -> io::Result<Vec<String>> {
        self.read_new(path, true)
    }

    /// The cursor for `path`, if it has been polled before.
    pub fn cursor(&self, path: &Path) -> Option<TailCursor> {
        self.cursors.get(path).copied()
    }

    /// Forgets every cursor, so the next poll of each file starts from the beginning.
    pub fn reset(&mut self) {
        self.cursors.clear();
    }

    fn read_new(&mut self, path: &Path, include_partial: bool) -> io::Result<Vec<String>> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let cursor = self.cursors.entry(path.to_path_buf()).or_default();
        let len = file.metadata()?.len();
        if len < cursor.offset {
            warn!(
                "{:?} shrank from {} to {} bytes; assuming truncation and re-reading from the start.",
                path, cursor.offset, len
            );
            cursor.offset = 0;
        }
        if len == cursor.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(cursor.offset))?;
        let mut buffer = Vec::with_capacity((len - cursor.offset) as usize);
        file.read_to_end(&mut buffer)?;

        let consumed = if include_partial {
            buffer.len()
        } else {
            match buffer.iter().rposition(|&b| b == b'\n') {
                Some(pos) => pos + 1,
                None => 0,
            }
        };
        cursor.offset += consumed as u64;

        let text = String::from_utf8_lossy(&buffer[..consumed]);
        let lines: Vec<String> = text
            .lines()
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        trace!("Read {} new line(s) from {:?}", lines.len(), path);
        Ok(lines)
    }
}
