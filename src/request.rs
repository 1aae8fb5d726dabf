use std::collections::HashMap;
use std::fmt;

use url::Url;

use crate::{ProxyError, Result};

pub const DEFAULT_CALLBACK: &str = "callback";
/// Widest indentation we render; output grows with it for every nested line.
pub const MAX_INDENT: usize = 16;

/// Tabular formats we know how to turn into rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Csv,
    Xls,
    Xlsx,
}

impl FileType {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(FileType::Csv),
            "xls" => Some(FileType::Xls),
            "xlsx" => Some(FileType::Xlsx),
            _ => None,
        }
    }

    /// Detects the type from the last dotted segment of the url path.
    pub fn from_url(url: &Url) -> Result<Self> {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default();
        let (_, extension) =
            name.rsplit_once('.').ok_or(ProxyError::UnknownFileType)?;
        if extension.is_empty() {
            return Err(ProxyError::UnknownFileType);
        }
        Self::from_extension(extension)
            .ok_or_else(|| ProxyError::UnsupportedFileType(extension.into()))
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileType::Csv => "csv",
            FileType::Xls => "xls",
            FileType::Xlsx => "xlsx",
        })
    }
}

/// How the answer is wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Json,
    Jsonp { callback: String },
}

impl Default for Output {
    fn default() -> Self {
        Output::Jsonp {
            callback: DEFAULT_CALLBACK.to_string(),
        }
    }
}

impl Output {
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self> {
        match query.get("format").map(String::as_str) {
            None | Some("") | Some("jsonp") => {
                let callback = match query.get("callback") {
                    Some(callback) if !callback.is_empty() => callback.clone(),
                    _ => DEFAULT_CALLBACK.to_string(),
                };
                if !is_callback_name(&callback) {
                    return Err(ProxyError::InvalidParameter {
                        name: "callback",
                        value: callback,
                    });
                }
                Ok(Output::Jsonp { callback })
            }
            Some("json") => Ok(Output::Json),
            Some(other) => Err(ProxyError::UnknownFormat(other.to_string())),
        }
    }

    pub fn is_jsonp(&self) -> bool {
        matches!(self, Output::Jsonp { .. })
    }
}

/// A dotted path of JavaScript identifiers, e.g. `jQuery.cb_12`.
fn is_callback_name(name: &str) -> bool {
    name.split('.').all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || "_$".contains(first) => {
                chars.all(|c| c.is_ascii_alphanumeric() || "_$".contains(c))
            }
            _ => false,
        }
    })
}

/// Everything one proxied request asks for, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub url: Url,
    pub file_type: FileType,
    pub sheet: usize,
    pub indent: Option<usize>,
    pub output: Output,
}

impl RequestContext {
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self> {
        let raw_url = query
            .get("url")
            .filter(|url| !url.is_empty())
            .ok_or(ProxyError::MissingUrl)?;
        let url = Url::parse(raw_url)?;
        let file_type = FileType::from_url(&url)?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ProxyError::UnsupportedScheme(other.into())),
        }

        let sheet = parse_number(query, "sheet")?.unwrap_or(0);
        let indent = parse_number(query, "indent")?;
        if let Some(width) = indent.filter(|width| *width > MAX_INDENT) {
            return Err(ProxyError::InvalidParameter {
                name: "indent",
                value: width.to_string(),
            });
        }
        let output = Output::from_query(query)?;

        Ok(Self {
            url,
            file_type,
            sheet,
            indent,
            output,
        })
    }
}

fn parse_number(
    query: &HashMap<String, String>,
    name: &'static str,
) -> Result<Option<usize>> {
    match query.get(name) {
        None => Ok(None),
        Some(value) => value.trim().parse().map(Some).map_err(|_| {
            ProxyError::InvalidParameter {
                name,
                value: value.clone(),
            }
        }),
    }
}
