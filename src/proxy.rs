use std::collections::HashMap;
use std::sync::OnceLock;

use crate::config::ProxyConfig;
use crate::fetch::Fetcher;
use crate::request::{Output, RequestContext};
use crate::response::{self, Envelope, ErrorBody, Header, Rendered};
use crate::stream::BufferedChunkStream;
use crate::table::read_table;
use crate::{ProxyError, Result};

/// Answer to one proxied request, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub rendered: Rendered,
    /// Set when `rendered` describes a failure.
    pub error: Option<ErrorKind>,
}

/// Coarse failure classes, for callers that map them to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    TooLarge,
    Upstream,
    Unprocessable,
    Internal,
}

impl From<&ProxyError> for ErrorKind {
    fn from(err: &ProxyError) -> Self {
        match err {
            ProxyError::MissingUrl
            | ProxyError::InvalidUrl(_)
            | ProxyError::UnsupportedScheme(_)
            | ProxyError::UnknownFileType
            | ProxyError::UnsupportedFileType(_)
            | ProxyError::InvalidParameter { .. }
            | ProxyError::UnknownFormat(_)
            | ProxyError::SheetNotFound { .. } => ErrorKind::BadRequest,
            ProxyError::TooLarge { .. } => ErrorKind::TooLarge,
            ProxyError::Unreachable(_) | ProxyError::UpstreamStatus(_) => {
                ErrorKind::Upstream
            }
            ProxyError::Parse(_) => ErrorKind::Unprocessable,
            ProxyError::InvalidArgument(_)
            | ProxyError::Io(_)
            | ProxyError::Json(_) => ErrorKind::Internal,
        }
    }
}

/// Fetches remote tabular files and relays them as JSON.
///
/// All methods block on network I/O.
#[derive(Debug, Clone)]
pub struct DataProxy {
    config: ProxyConfig,
    fetcher: OnceLock<Fetcher>,
}

impl DataProxy {
    pub fn new(config: ProxyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            fetcher: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// The HTTP client shared by every request.
    ///
    /// Built on first use rather than in `new`: the blocking client must
    /// not be created on an async executor thread, and `new` usually runs
    /// on one.
    pub fn fetcher(&self) -> Result<&Fetcher> {
        if let Some(fetcher) = self.fetcher.get() {
            return Ok(fetcher);
        }
        let fetcher = Fetcher::new(&self.config)?;
        Ok(self.fetcher.get_or_init(|| fetcher))
    }

    pub fn fetch_table(&self, ctx: &RequestContext) -> Result<Envelope> {
        let fetcher = self.fetcher()?;

        let advertised = fetcher.content_length(&ctx.url)?;
        if let Some(length) = advertised {
            if length > self.config.max_length {
                log::info!(
                    "Refusing {}: {} bytes over the {} byte limit",
                    ctx.url,
                    length,
                    self.config.max_length
                );
                return Err(ProxyError::TooLarge {
                    length,
                    limit: self.config.max_length,
                });
            }
        }

        let mut stream = BufferedChunkStream::new(fetcher.open(&ctx.url)?);
        let table = read_table(&mut stream, ctx.file_type, ctx.sheet)?;
        log::debug!(
            "Read {} rows from {} using {} chunks ({} bytes)",
            table.rows.len(),
            ctx.url,
            stream.chunks_pulled(),
            stream.materialized_len()
        );

        Ok(Envelope {
            header: Header {
                url: ctx.url.to_string(),
                length: advertised.unwrap_or_else(|| stream.materialized_len()),
                sheet_name: table.sheet_name,
                sheet_number: ctx.sheet,
            },
            response: table.rows,
        })
    }

    /// Runs a whole request: validation, fetch, parse and rendering.
    /// Failures are rendered as error bodies in the requested format.
    pub fn respond(&self, query: &HashMap<String, String>) -> Reply {
        // resolved first so that even a bad url is answered the way the
        // caller can read it
        let output = Output::from_query(query).unwrap_or_default();

        let result = RequestContext::from_query(query).and_then(|ctx| {
            let envelope = self.fetch_table(&ctx)?;
            response::render(&envelope, ctx.indent, &ctx.output)
        });

        match result {
            Ok(rendered) => Reply {
                rendered,
                error: None,
            },
            Err(err) => {
                log::warn!("{}: {}", err.title(), err);
                self.error_reply(&err, &output)
            }
        }
    }

    fn error_reply(&self, err: &ProxyError, output: &Output) -> Reply {
        error_reply(ErrorBody::from(err), ErrorKind::from(err), output)
    }
}

/// Renders `body` in the caller's format, falling back to a fixed JSON
/// error when even that fails.
pub fn error_reply(body: ErrorBody, kind: ErrorKind, output: &Output) -> Reply {
    let rendered =
        response::render(&body, None, output).unwrap_or_else(|_| Rendered {
            content_type: response::JSON_CONTENT_TYPE,
            body: String::from(FALLBACK_ERROR),
        });
    Reply {
        rendered,
        error: Some(kind),
    }
}

const FALLBACK_ERROR: &str =
    r#"{"error":{"title":"Internal error","msg":"The answer could not be rendered"}}"#;
