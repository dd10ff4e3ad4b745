use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

/// Failures that stop the HTTP server itself. Per-connection problems never
/// surface here; the hub closes the affected socket instead.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: WebErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebErrorKind {
    /// The configured interface/port could not be parsed or bound.
    Bind,
    /// The accept loop ended with an I/O error.
    Serve,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.error_kind {
            WebErrorKind::Bind => "failed to bind listener",
            WebErrorKind::Serve => "server error",
        };
        match &self.source {
            Some(source) => write!(f, "{what}: {source}"),
            None => write!(f, "{what}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

impl Error {
    pub(crate) fn bind(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            source: Some(source.into()),
            error_kind: WebErrorKind::Bind,
        }
    }

    pub(crate) fn serve(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            source: Some(source.into()),
            error_kind: WebErrorKind::Serve,
        }
    }
}
