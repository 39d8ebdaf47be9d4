use crate::error::ProtocolError;
use std::io::Write;

pub const RETURN_TOKEN: &str = "RETURN";
pub const ECHO_TOKEN: &str = "ECHO";

/// Writes `RETURN`/`ECHO` frames to the host.
///
/// Frames are `<TOKEN>  <value>` with two spaces; hosts in the field match
/// on that exact byte sequence. Every frame is flushed as soon as it is written.
#[derive(Debug)]
pub struct OutputWriter<W> {
    inner: W,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_return(&mut self, value: &str) -> Result<(), ProtocolError> {
        self.write_frame(RETURN_TOKEN, value)
    }

    pub fn write_echo(&mut self, value: &str) -> Result<(), ProtocolError> {
        self.write_frame(ECHO_TOKEN, value)
    }

    fn write_frame(&mut self, token: &str, value: &str) -> Result<(), ProtocolError> {
        writeln!(self.inner, "{token}  {value}").map_err(ProtocolError::Write)?;
        self.inner.flush().map_err(ProtocolError::Write)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// One line of plugin output as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Return(&'a str),
    Echo(&'a str),
    /// Anything else the plugin printed.
    Other(&'a str),
}

impl<'a> Frame<'a> {
    /// Classifies a line by its case-insensitive `RETURN `/`ECHO ` prefix.
    ///
    /// The prefix must be followed by at least one byte. Leading whitespace
    /// of the value is dropped, which absorbs the writer's double space.
    pub fn parse(line: &'a str) -> Self {
        if let Some(value) = strip_token(line, RETURN_TOKEN) {
            Frame::Return(value)
        } else if let Some(value) = strip_token(line, ECHO_TOKEN) {
            Frame::Echo(value)
        } else {
            Frame::Other(line)
        }
    }
}

fn strip_token<'a>(line: &'a str, token: &str) -> Option<&'a str> {
    let prefix_len = token.len() + 1;
    if line.len() <= prefix_len {
        return None;
    }
    let prefix = line.get(..prefix_len)?;
    let (head, sep) = prefix.split_at(token.len());
    if head.eq_ignore_ascii_case(token) && sep == " " {
        Some(line[prefix_len..].trim_start())
    } else {
        None
    }
}
