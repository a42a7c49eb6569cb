use crate::auxiliary::AuxOp;
use crate::foreign::ForeignOp;
use std::path::PathBuf;

/// Errors from reading or writing document files.
///
/// Decoding itself never fails; only the byte source or sink can.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("could not read document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write document {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the auxiliary registry and the kinds registered in it.
#[derive(Debug, thiserror::Error)]
pub enum AuxError {
    #[error("auxiliary '{0}' is already registered")]
    DuplicateName(String),
    #[error("registry is sealed")]
    Sealed,
    #[error("no auxiliary registered as '{0}'")]
    UnknownName(String),
    #[error("blob is not a {expected}")]
    TypeMismatch { expected: &'static str },
    #[error("auxiliary does not support {0}")]
    Unsupported(AuxOp),
    #[error(transparent)]
    Foreign(#[from] ForeignError),
}

/// Failures crossing the foreign-call boundary.
#[derive(Debug, thiserror::Error)]
pub enum ForeignError {
    #[error("foreign {op} raised: {message}")]
    Raised { op: ForeignOp, message: String },
    #[error("foreign {op} returned {found}, expected {expected}")]
    BadReturn {
        op: ForeignOp,
        expected: &'static str,
        found: &'static str,
    },
}
