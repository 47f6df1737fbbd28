use thiserror::Error;

#[derive(Debug, Error)]
pub enum PbgzfError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid block header at offset {offset}: {reason}")]
    InvalidHeader { offset: u64, reason: &'static str },
    #[error("short read at offset {offset} (expected {expected} bytes, got {actual})")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    #[error("short write (expected {expected} bytes, wrote {actual})")]
    ShortWrite { expected: usize, actual: usize },
    #[error(
        "checksum mismatch in block at offset {offset} (expected {expected:#010x}, actual {actual:#010x})"
    )]
    ChecksumMismatch {
        offset: u64,
        expected: u32,
        actual: u32,
    },
    #[error(
        "uncompressed length mismatch in block at offset {offset} (expected {expected}, actual {actual})"
    )]
    LengthMismatch {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    #[error("inflate error: {0}")]
    Inflate(String),
    #[error("deflate error: {0}")]
    Deflate(String),
    #[error("input reduction failed: {length} bytes cannot fit a single block")]
    InputReductionFailed { length: usize },
    #[error("invalid usage: {0}")]
    Usage(&'static str),
    #[error("invalid seek to {position:#x}: {reason}")]
    InvalidSeek { position: u64, reason: &'static str },
    #[error("pipeline previously failed and was torn down")]
    PipelineFailed,
    #[error("thread error: {0}")]
    Thread(String),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<PbgzfError>,
    },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl PbgzfError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for malformed or corrupt data and truncated transfers.
    pub fn is_protocol(&self) -> bool {
        match self {
            Self::InvalidHeader { .. }
            | Self::ShortRead { .. }
            | Self::ShortWrite { .. }
            | Self::ChecksumMismatch { .. }
            | Self::LengthMismatch { .. }
            | Self::Inflate(_)
            | Self::Deflate(_)
            | Self::InputReductionFailed { .. } => true,
            Self::Context { source, .. } => source.is_protocol(),
            _ => false,
        }
    }

    /// True for caller mistakes that leave the stream untouched.
    pub fn is_usage(&self) -> bool {
        match self {
            Self::Usage(_) | Self::InvalidSeek { .. } => true,
            Self::Context { source, .. } => source.is_usage(),
            _ => false,
        }
    }
}

impl From<PbgzfError> for std::io::Error {
    fn from(error: PbgzfError) -> Self {
        use std::io::ErrorKind;

        let kind = if error.is_protocol() {
            ErrorKind::InvalidData
        } else if error.is_usage() {
            ErrorKind::InvalidInput
        } else {
            ErrorKind::Other
        };
        match error {
            PbgzfError::Io(inner) => inner,
            other => std::io::Error::new(kind, other),
        }
    }
}
