use crate::hooks::HookKind;
use std::fmt;
use thiserror::Error;

/// Error type hooks may return; anything implementing `Error` converts with `?`.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

pub type HookResult = Result<(), HookError>;

/// Failures raised by the plugin side of the protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The stream closed before a newline; `partial` holds the trimmed text read so far.
    #[error("input ended before a complete line (read {partial:?})")]
    UnexpectedEof { partial: String },
    #[error("failed to read from host: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write to host: {0}")]
    Write(#[source] std::io::Error),
    #[error("unknown plugin hook {0:?}")]
    UnknownHook(String),
    #[error("{hook} hook failed: {source}")]
    Hook { hook: HookKind, source: HookError },
}

impl ProtocolError {
    pub fn is_eof(&self) -> bool {
        matches!(self, ProtocolError::UnexpectedEof { .. })
    }
}

/// A decode failure together with the fields that were read before it.
///
/// Fields after the failing line keep their default (empty) values.
#[derive(Debug)]
pub struct DecodeError<P> {
    pub partial: P,
    pub source: ProtocolError,
}

impl<P> DecodeError<P> {
    pub fn into_parts(self) -> (P, ProtocolError) {
        (self.partial, self.source)
    }
}

impl<P> fmt::Display for DecodeError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode hook parameters: {}", self.source)
    }
}

impl<P: fmt::Debug> std::error::Error for DecodeError<P> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
