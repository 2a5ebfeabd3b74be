use crate::cursor::ByteCursor;
use crate::provider::EnhancedDataProvider;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

const TEMP_FILE_PREFIX: &str = "fuzzdata-";

/// Errors raised while backing fuzz data with a scratch file.
#[derive(Error, Debug)]
pub enum ScratchError {
    #[error("Failed to {action} scratch file: {source}")]
    Io {
        action: &'static str,
        #[source]
        source: io::Error,
    },
}

impl ScratchError {
    pub(crate) fn io(action: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| ScratchError::Io { action, source }
    }
}

/// Selects how much data a scratch resource draws and how it is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchOptions {
    /// `false` draws a random-length slice, `true` drains the cursor.
    pub all_data: bool,
    /// `true` yields raw bytes, `false` yields decoded text.
    pub as_bytes: bool,
}

impl Default for ScratchOptions {
    fn default() -> Self {
        Self {
            all_data: false,
            as_bytes: true,
        }
    }
}

/// Data consumed from a cursor to populate a scratch resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    Bytes(Vec<u8>),
    Text(String),
}

impl FileData {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileData::Bytes(bytes) => bytes,
            FileData::Text(text) => text.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileData::Bytes(bytes) => bytes,
            FileData::Text(text) => text.into_bytes(),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FileData::Text(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Binary,
    Text,
}

/// A seekable in-memory stream pre-populated with fuzz data.
///
/// After [`MemoryFile::close`] (or drop) the buffer is released and every read,
/// write or seek fails. Text-mode files only accept UTF-8 writes.
#[derive(Debug)]
pub struct MemoryFile {
    mode: FileMode,
    buffer: Option<Cursor<Vec<u8>>>,
}

impl MemoryFile {
    pub fn new(data: FileData) -> Self {
        let mode = if data.is_text() {
            FileMode::Text
        } else {
            FileMode::Binary
        };
        Self {
            mode,
            buffer: Some(Cursor::new(data.into_bytes())),
        }
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.is_none()
    }

    pub fn close(&mut self) {
        self.buffer = None;
    }

    /// Current contents, independent of the stream position.
    pub fn contents(&self) -> io::Result<&[u8]> {
        self.open_buffer().map(|buf| buf.get_ref().as_slice())
    }

    fn open_buffer(&self) -> io::Result<&Cursor<Vec<u8>>> {
        self.buffer.as_ref().ok_or_else(closed_error)
    }

    fn open_buffer_mut(&mut self) -> io::Result<&mut Cursor<Vec<u8>>> {
        self.buffer.as_mut().ok_or_else(closed_error)
    }
}

fn closed_error() -> io::Error {
    io::Error::other("I/O operation on closed memory file")
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.open_buffer_mut()?.read(buf)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.mode == FileMode::Text && std::str::from_utf8(buf).is_err() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "text memory file only accepts UTF-8",
            ));
        }
        self.open_buffer_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.open_buffer_mut().map(|_| ())
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.open_buffer_mut()?.seek(pos)
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        self.close();
    }
}

/// A named temporary file holding fuzz data. Removed from disk on drop.
#[derive(Debug)]
pub struct TempScratchFile {
    file: NamedTempFile,
}

impl TempScratchFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Closes and removes the file, reporting removal failures.
    pub fn close(self) -> Result<(), ScratchError> {
        self.file.close().map_err(ScratchError::io("remove"))
    }
}

impl<C: ByteCursor> EnhancedDataProvider<C> {
    /// Draws data for a scratch resource according to `options`.
    pub fn consume_file_data(&mut self, options: ScratchOptions) -> FileData {
        match (options.all_data, options.as_bytes) {
            (true, true) => FileData::Bytes(self.consume_remaining_bytes()),
            (true, false) => FileData::Text(self.consume_remaining_string()),
            (false, true) => FileData::Bytes(self.consume_random_bytes()),
            (false, false) => FileData::Text(self.consume_random_string()),
        }
    }

    /// Returns an in-memory file positioned at its start. Dropping it closes it.
    pub fn consume_memory_file(&mut self, options: ScratchOptions) -> MemoryFile {
        MemoryFile::new(self.consume_file_data(options))
    }

    /// Runs `f` with an in-memory file; the file is closed when `f` returns or
    /// unwinds.
    pub fn with_memory_file<R>(
        &mut self,
        options: ScratchOptions,
        f: impl FnOnce(&mut MemoryFile) -> R,
    ) -> R {
        let mut file = self.consume_memory_file(options);
        f(&mut file)
    }

    /// Writes fuzz data to a new temporary file named with `suffix`, flushed
    /// and rewound. The data is consumed before the file is created.
    pub fn consume_temporary_file(
        &mut self,
        suffix: &str,
        options: ScratchOptions,
    ) -> Result<TempScratchFile, ScratchError> {
        let data = self.consume_file_data(options);

        let mut file = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(suffix)
            .tempfile()
            .map_err(ScratchError::io("create"))?;
        file.write_all(data.as_bytes())
            .map_err(ScratchError::io("write"))?;
        file.flush().map_err(ScratchError::io("flush"))?;
        file.rewind().map_err(ScratchError::io("rewind"))?;

        debug!(
            path = %file.path().display(),
            len = data.as_bytes().len(),
            "created temporary scratch file"
        );
        Ok(TempScratchFile { file })
    }

    /// Runs `f` with the path of a temporary file holding fuzz data. The file
    /// is removed when `f` returns or unwinds.
    ///
    /// Only creating and populating the file can fail. A failed removal after
    /// `f` returns (for example because `f` already deleted the file) is logged
    /// and `f`'s result is still returned.
    pub fn with_temporary_file<R>(
        &mut self,
        suffix: &str,
        options: ScratchOptions,
        f: impl FnOnce(&Path) -> R,
    ) -> Result<R, ScratchError> {
        let scratch = self.consume_temporary_file(suffix, options)?;
        let result = f(scratch.path());
        if let Err(e) = scratch.close() {
            debug!(error = %e, "temporary scratch file removal failed");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::test_utils::ScriptedCursor;
    use arbitrary::Unstructured;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::path::PathBuf;

    fn provider(payload: &[u8], ints: &[usize]) -> EnhancedDataProvider<ScriptedCursor> {
        EnhancedDataProvider::new(ScriptedCursor::with_payload(payload).ints(ints))
    }

    #[test]
    fn scratch_options_default_to_random_bytes() {
        let options = ScratchOptions::default();
        assert!(!options.all_data);
        assert!(options.as_bytes);
    }

    #[test]
    fn file_data_selection_follows_options() {
        let mut p = provider(b"abcdef", &[2]);
        assert_eq!(
            p.consume_file_data(ScratchOptions::default()),
            FileData::Bytes(b"ab".to_vec())
        );
        let text = ScratchOptions {
            all_data: true,
            as_bytes: false,
        };
        assert_eq!(
            p.consume_file_data(text),
            FileData::Text("cdef".to_string())
        );
        assert_eq!(p.remaining_bytes(), 0);
    }

    #[test]
    fn memory_file_starts_at_beginning_with_consumed_data() {
        let mut p = provider(b"payload", &[]);
        let options = ScratchOptions {
            all_data: true,
            as_bytes: true,
        };
        let read_back = p.with_memory_file(options, |file| {
            assert_eq!(file.mode(), FileMode::Binary);
            let mut out = Vec::new();
            file.read_to_end(&mut out).unwrap();
            out
        });
        assert_eq!(read_back, b"payload".to_vec());
    }

    #[test]
    fn text_memory_file_rejects_invalid_utf8_writes() {
        let mut p = provider(b"abc", &[]);
        let mut file = p.consume_memory_file(ScratchOptions {
            all_data: true,
            as_bytes: false,
        });
        assert_eq!(file.mode(), FileMode::Text);
        file.seek(SeekFrom::End(0)).unwrap();
        let err = file.write(&[0xFF, 0xFE]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        file.write_all("é".as_bytes()).unwrap();
        assert_eq!(file.contents().unwrap(), "abcé".as_bytes());
    }

    #[test]
    fn closed_memory_file_rejects_io() {
        let mut p = provider(b"data", &[4]);
        let mut file = p.consume_memory_file(ScratchOptions::default());
        assert!(!file.is_closed());
        file.close();
        assert!(file.is_closed());

        let mut buf = [0u8; 4];
        assert!(file.read(&mut buf).is_err(), "read after close must fail");
        assert!(file.write(b"x").is_err(), "write after close must fail");
        assert!(file.seek(SeekFrom::Start(0)).is_err());
        assert!(file.contents().is_err());
    }

    #[test]
    fn memory_file_on_exhausted_cursor_is_empty() {
        let mut p = EnhancedDataProvider::new(Unstructured::new(&[]));
        let len = p.with_memory_file(ScratchOptions::default(), |file| {
            file.contents().map(<[u8]>::len).unwrap()
        });
        assert_eq!(len, 0);
    }

    #[test]
    fn temporary_file_holds_data_and_is_removed_after_scope() {
        let mut p = provider(b"on disk", &[]);
        let options = ScratchOptions {
            all_data: true,
            as_bytes: true,
        };
        let mut seen_path = PathBuf::new();
        let contents = p
            .with_temporary_file(".bin", options, |path| {
                seen_path = path.to_path_buf();
                std::fs::read(path).unwrap()
            })
            .unwrap();

        assert_eq!(contents, b"on disk".to_vec());
        assert!(
            seen_path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(TEMP_FILE_PREFIX) && n.ends_with(".bin")),
            "Unexpected temp file name {seen_path:?}"
        );
        assert!(!seen_path.exists(), "Temp file should be removed");
    }

    #[test]
    fn temporary_file_is_removed_when_scope_panics() {
        let mut p = provider(b"crash me", &[]);
        let mut seen_path = PathBuf::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            p.with_temporary_file(".txt", ScratchOptions::default(), |path| {
                seen_path = path.to_path_buf();
                if path.exists() {
                    panic!("harness failure inside scope");
                }
            })
        }));

        assert!(result.is_err(), "Panic should propagate to the caller");
        assert!(!seen_path.as_os_str().is_empty());
        assert!(!seen_path.exists(), "Temp file should be removed on unwind");
    }

    #[test]
    fn temporary_file_result_survives_failed_removal() {
        let mut p = provider(b"gone early", &[]);
        let mut seen_path = PathBuf::new();
        let result = p.with_temporary_file(".bin", ScratchOptions::default(), |path| {
            seen_path = path.to_path_buf();
            std::fs::remove_file(path).unwrap();
            42
        });

        assert_eq!(
            result.unwrap(),
            42,
            "Closure result must be returned even when the file was already removed"
        );
        assert!(!seen_path.exists());
    }

    #[test]
    fn memory_file_scope_panic_propagates() {
        let mut p = provider(b"boom", &[]);
        let options = ScratchOptions {
            all_data: true,
            as_bytes: true,
        };
        let result = catch_unwind(AssertUnwindSafe(|| {
            p.with_memory_file(options, |file| {
                if !file.is_closed() {
                    panic!("harness failure inside memory file scope");
                }
            })
        }));

        assert!(result.is_err(), "Panic should propagate to the caller");
        assert_eq!(p.remaining_bytes(), 0, "Data was consumed before the scope ran");
    }

    #[test]
    fn temporary_file_guard_removes_on_drop() {
        let mut p = provider(b"guarded", &[3]);
        let scratch = p
            .consume_temporary_file(".dat", ScratchOptions::default())
            .unwrap();
        let path = scratch.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"gua".to_vec());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn text_temporary_file_writes_decoded_text() {
        let mut p = provider(&[b'h', b'i', 0xFF], &[]);
        let options = ScratchOptions {
            all_data: true,
            as_bytes: false,
        };
        let text = p
            .with_temporary_file(".txt", options, |path| {
                std::fs::read_to_string(path).unwrap()
            })
            .unwrap();
        assert_eq!(text, "hi\u{FFFD}");
    }
}
