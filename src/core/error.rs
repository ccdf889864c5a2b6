// Queue error kinds plus a builder-style error carrying path/offset context.
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use libc::{EACCES, EPERM};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Config,
    Busy,
    Permission,
    Corrupt,
    Io,
    Encode,
    Decode,
    Full,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    offset: Option<u64>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            offset: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// The explicit message, or a stock description of the kind.
    pub fn describe(&self) -> &str {
        self.message.as_deref().unwrap_or(match self.kind {
            ErrorKind::Internal => "internal error",
            ErrorKind::Usage => "usage error",
            ErrorKind::Config => "invalid queue configuration",
            ErrorKind::Busy => "queue is in use",
            ErrorKind::Permission => "permission denied",
            ErrorKind::Corrupt => "corrupt queue files",
            ErrorKind::Io => "i/o error",
            ErrorKind::Encode => "failed to encode item",
            ErrorKind::Decode => "failed to decode item",
            ErrorKind::Full => "queue is full",
        })
    }

    /// Messages of the whole `source()` chain, outermost first.
    pub fn causes(&self) -> Vec<String> {
        std::iter::successors(StdError::source(self), |cause: &&(dyn StdError + 'static)| (*cause).source())
            .map(ToString::to_string)
            .collect()
    }

    /// `{"error": {...}}` envelope; absent context fields are omitted.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("kind".to_string(), json!(format!("{:?}", self.kind)));
        body.insert("message".to_string(), json!(self.describe()));
        if let Some(hint) = &self.hint {
            body.insert("hint".to_string(), json!(hint));
        }
        if let Some(path) = &self.path {
            body.insert("path".to_string(), json!(path.display().to_string()));
        }
        if let Some(offset) = self.offset {
            body.insert("offset".to_string(), json!(offset));
        }
        let causes = self.causes();
        if !causes.is_empty() {
            body.insert("causes".to_string(), json!(causes));
        }
        json!({ "error": body })
    }

    /// Multi-line human rendering for terminals.
    pub fn to_text(&self) -> String {
        let mut out = format!("error: {}", self.describe());
        if let Some(hint) = &self.hint {
            out.push_str(&format!("\nhint: {hint}"));
        }
        if let Some(path) = &self.path {
            out.push_str(&format!("\npath: {}", path.display()));
        }
        if let Some(offset) = self.offset {
            out.push_str(&format!("\noffset: {offset}"));
        }
        for cause in self.causes() {
            out.push_str(&format!("\ncaused by: {cause}"));
        }
        out
    }

    /// Wraps an I/O failure on `path`, classifying permission errors separately.
    pub(crate) fn io(path: &Path, err: io::Error) -> Self {
        Error::new(io_error_kind(&err)).with_path(path).with_source(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset: {offset})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Config => 3,
        ErrorKind::Busy => 4,
        ErrorKind::Permission => 5,
        ErrorKind::Corrupt => 6,
        ErrorKind::Io => 7,
        ErrorKind::Encode => 8,
        ErrorKind::Decode => 9,
        ErrorKind::Full => 10,
    }
}

pub(crate) fn io_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}
