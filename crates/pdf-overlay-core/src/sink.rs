//! In-memory byte sinks for serialized documents.

use std::io;
use std::path::Path;

/// Append-only, growable accumulator for serialized document bytes.
///
/// Engines write into it through [`io::Write`]. The session only hands it to
/// the caller, as a [`SavedDocument`], once serialization has fully succeeded.
#[derive(Debug, Default)]
pub struct FileSink {
    buf: Vec<u8>,
}

impl FileSink {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Seal the sink into a finished document.
    pub fn finish(self) -> SavedDocument {
        SavedDocument { bytes: self.buf }
    }
}

impl io::Write for FileSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serialized document bytes owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDocument {
    bytes: Vec<u8>,
}

impl SavedDocument {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    /// Write the bytes to `path`, replacing any existing file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, &self.bytes)
    }
}

impl AsRef<[u8]> for SavedDocument {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sink_appends() {
        let mut sink = FileSink::new();
        assert!(sink.is_empty());
        sink.write_all(b"%PDF-").unwrap();
        sink.write_all(b"1.7").unwrap();
        assert_eq!(sink.len(), 8);

        let saved = sink.finish();
        assert_eq!(saved.as_bytes(), b"%PDF-1.7");
        assert_eq!(saved.into_vec(), b"%PDF-1.7".to_vec());
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");

        let mut sink = FileSink::new();
        sink.write_all(b"bytes").unwrap();
        sink.finish().write_to(&path).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
    }
}
