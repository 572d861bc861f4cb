use std::{error, fmt};

/// A type-erased error, used for transport and credential failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A configuration mistake found while building a client, creating a stub
/// or loading descriptors.
///
/// Failures of an individual call are reported as a [`Status`](crate::Status)
/// instead.
#[derive(Debug)]
pub struct Error {
    inner: BoxError,
}

impl Error {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Error {
            inner: message.into().into(),
        }
    }

    pub(crate) fn from_source(source: impl Into<BoxError>) -> Self {
        Error {
            inner: source.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.inner.source()
    }
}
