use crate::error::ProtocolError;
use std::io::BufRead;

/// Reads newline-terminated, whitespace-trimmed lines from the host.
///
/// One reader must own the stream for the whole run: its buffer may hold
/// lines that the next call returns.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Returns the next line without its delimiter or surrounding whitespace.
    ///
    /// A final line that is not newline-terminated is reported as
    /// [`ProtocolError::UnexpectedEof`] carrying the text that was read.
    /// Bytes that are not UTF-8 are replaced with U+FFFD instead of failing.
    pub fn read_line(&mut self) -> Result<String, ProtocolError> {
        self.buf.clear();
        self.inner
            .read_until(b'\n', &mut self.buf)
            .map_err(ProtocolError::Read)?;

        let text = String::from_utf8_lossy(&self.buf).trim().to_string();
        if !self.buf.ends_with(b"\n") {
            return Err(ProtocolError::UnexpectedEof { partial: text });
        }
        tracing::trace!(line = %text, "read line");
        Ok(text)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
