use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProxyError>;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("No ?url= found")]
    MissingUrl,
    #[error("Invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Could not determine the file type")]
    UnknownFileType,
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("Invalid value {value:?} for parameter {name}")]
    InvalidParameter { name: &'static str, value: String },
    #[error("Unknown format {0}")]
    UnknownFormat(String),
    #[error("Could not fetch file: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("Upstream answered with status {0}")]
    UpstreamStatus(u16),
    #[error("File of {length} bytes is over the {limit} byte limit")]
    TooLarge { length: u64, limit: u64 },
    #[error("Sheet {index} not found, the file has {count} sheet(s)")]
    SheetNotFound { index: usize, count: usize },
    #[error("Parsing error: {0}")]
    Parse(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("IO error: {0}")]
    Io(io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProxyError {
    /// Short headline shown to API consumers.
    pub fn title(&self) -> String {
        match self {
            ProxyError::MissingUrl => "No ?url= found".into(),
            ProxyError::InvalidUrl(_) => "Invalid URL".into(),
            ProxyError::UnsupportedScheme(_) => {
                "Only http and https are allowed".into()
            }
            ProxyError::UnknownFileType => {
                "Could not determine the file type".into()
            }
            ProxyError::UnsupportedFileType(_) => {
                "Unsupported file type".into()
            }
            ProxyError::InvalidParameter { name, .. } => {
                format!("Invalid {} parameter", name)
            }
            ProxyError::UnknownFormat(_) => "Unknown format".into(),
            ProxyError::Unreachable(_) | ProxyError::UpstreamStatus(_) => {
                "Could not fetch file".into()
            }
            ProxyError::TooLarge { .. } => {
                "The requested file is too big to proxy".into()
            }
            ProxyError::SheetNotFound { .. } => "Sheet not found".into(),
            ProxyError::Parse(_) => "Could not parse file".into(),
            ProxyError::InvalidArgument(_)
            | ProxyError::Io(_)
            | ProxyError::Json(_) => "Internal error".into(),
        }
    }

    /// Longer explanation shown to API consumers.
    pub fn message(&self) -> String {
        match self {
            ProxyError::MissingUrl => "Please read the API format docs".into(),
            ProxyError::InvalidUrl(e) => format!("The url is malformed: {}", e),
            ProxyError::UnsupportedScheme(scheme) => {
                format!("We do not support {} URLs", scheme)
            }
            ProxyError::UnknownFileType | ProxyError::UnsupportedFileType(_) => {
                "Please ensure URLs have a .csv, .xls or .xlsx extension".into()
            }
            ProxyError::InvalidParameter { name, value } => {
                format!("{:?} is not a valid value for {}", value, name)
            }
            ProxyError::UnknownFormat(format) => format!(
                "Format {:?} is not supported, use json or jsonp",
                format
            ),
            ProxyError::Unreachable(_) => {
                "Is the URL correct? Does the server exist?".into()
            }
            ProxyError::UpstreamStatus(status) => {
                format!("The server answered with HTTP status {}", status)
            }
            ProxyError::TooLarge { length, limit } => format!(
                "Sorry, but your file is at least {} bytes, over our {} byte \
                 limit. If we proxy large files we'll use up all our bandwidth",
                length, limit
            ),
            ProxyError::SheetNotFound { index, count } => format!(
                "Sheet {} was requested but the file only has {} sheet(s)",
                index, count
            ),
            other => other.to_string(),
        }
    }
}

impl From<io::Error> for ProxyError {
    fn from(err: io::Error) -> Self {
        from_io(err)
    }
}

impl From<ProxyError> for io::Error {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::Io(e) => e,
            invalid @ ProxyError::InvalidArgument(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, invalid)
            }
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

/// Recovers a `ProxyError` that travelled through a `std::io` boundary,
/// e.g. a source failure surfacing from inside a parser.
pub fn from_io(err: io::Error) -> ProxyError {
    let wraps_proxy_error = err
        .get_ref()
        .map(|inner| inner.is::<ProxyError>())
        .unwrap_or(false);
    if wraps_proxy_error {
        if let Some(inner) = err.into_inner() {
            if let Ok(proxy_error) = inner.downcast::<ProxyError>() {
                return *proxy_error;
            }
        }
        return ProxyError::Parse("lost upstream error".into());
    }
    ProxyError::Io(err)
}
