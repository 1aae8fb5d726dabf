use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};

use crate::request::Output;
use crate::{ProxyError, Result};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const JSONP_CONTENT_TYPE: &str = "application/javascript";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub url: String,
    pub length: u64,
    pub sheet_name: String,
    pub sheet_number: usize,
}

/// Successful answer: where the rows came from, then the rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    pub response: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub title: String,
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

impl From<&ProxyError> for ErrorBody {
    fn from(err: &ProxyError) -> Self {
        ErrorBody {
            error: ErrorDetail {
                title: err.title(),
                msg: err.message(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content_type: &'static str,
    pub body: String,
}

pub fn to_json<T: Serialize>(value: &T, indent: Option<usize>) -> Result<String> {
    match indent {
        None => Ok(serde_json::to_string(value)?),
        Some(width) => {
            let spaces = vec![b' '; width];
            let mut out = Vec::new();
            let formatter = PrettyFormatter::with_indent(&spaces);
            let mut serializer = Serializer::with_formatter(&mut out, formatter);
            value.serialize(&mut serializer)?;
            String::from_utf8(out)
                .map_err(|e| ProxyError::Parse(e.to_string()))
        }
    }
}

pub fn render<T: Serialize>(
    value: &T,
    indent: Option<usize>,
    output: &Output,
) -> Result<Rendered> {
    let json = to_json(value, indent)?;
    Ok(match output {
        Output::Json => Rendered {
            content_type: JSON_CONTENT_TYPE,
            body: json,
        },
        Output::Jsonp { callback } => Rendered {
            content_type: JSONP_CONTENT_TYPE,
            body: format!("{}({})", callback, json),
        },
    })
}
