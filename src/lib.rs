//! Relays remote CSV and spreadsheet files as JSON or JSONP.
//!
//! The upstream body is never downloaded blindly: it is wrapped in a
//! [`BufferedChunkStream`], which pulls chunks only when the parser asks for
//! bytes it has not seen yet, and the byte budget is enforced as chunks
//! arrive.

pub mod config;
pub mod errors;
pub mod fetch;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;
pub mod stream;
pub mod table;

pub use config::{ProxyConfig, ServerConfig};
pub use errors::{ProxyError, Result};
pub use proxy::DataProxy;
pub use request::{FileType, Output, RequestContext};
pub use stream::{BufferedChunkStream, ChunkSource};
