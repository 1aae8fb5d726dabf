//! Outbound HTTP: size probing and the chunked body source.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderValue, CONTENT_LENGTH, USER_AGENT};
use url::Url;

use crate::config::ProxyConfig;
use crate::stream::ChunkSource;
use crate::{ProxyError, Result};

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    chunk_size: usize,
    max_length: u64,
}

impl Fetcher {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        config.validate()?;

        let mut header = reqwest::header::HeaderMap::new();
        if let Ok(agent) = HeaderValue::from_str(&config.user_agent) {
            header.insert(USER_AGENT, agent);
        }
        let client = Client::builder()
            .default_headers(header)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            chunk_size: config.chunk_size,
            max_length: config.max_length,
        })
    }

    /// Asks the server how large the file is without downloading it.
    pub fn content_length(&self, url: &Url) -> Result<Option<u64>> {
        let response = self.client.head(url.as_str()).send()?;
        let response = check_status(response)?;
        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());

        log::debug!("The file at {} has length {:?}", url, length);
        Ok(length)
    }

    /// Starts the download; the body is pulled lazily through the source.
    pub fn open(&self, url: &Url) -> Result<HttpChunkSource> {
        let response = self.client.get(url.as_str()).send()?;
        let response = check_status(response)?;
        Ok(HttpChunkSource::new(
            response,
            self.chunk_size,
            self.max_length,
        ))
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        log::warn!("{} answered with status {}", response.url(), status);
        Err(ProxyError::UpstreamStatus(status.as_u16()))
    }
}

/// Pulls an HTTP body in chunks of at most `chunk_size` bytes.
///
/// Fails with [`ProxyError::TooLarge`] as soon as more than `limit` bytes
/// have arrived, whatever the server advertised beforehand.
pub struct HttpChunkSource<R: Read = Response> {
    body: R,
    chunk_size: usize,
    limit: u64,
    received: u64,
    done: bool,
}

impl<R: Read> HttpChunkSource<R> {
    pub fn new(body: R, chunk_size: usize, limit: u64) -> Self {
        Self {
            body,
            chunk_size,
            limit,
            received: 0,
            done: false,
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

impl<R: Read> ChunkSource for HttpChunkSource<R> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }

        let mut chunk = Vec::with_capacity(self.chunk_size);
        (&mut self.body)
            .take(self.chunk_size as u64)
            .read_to_end(&mut chunk)?;
        if chunk.is_empty() {
            self.done = true;
            return Ok(None);
        }

        self.received += chunk.len() as u64;
        if self.received > self.limit {
            self.done = true;
            return Err(ProxyError::TooLarge {
                length: self.received,
                limit: self.limit,
            });
        }
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::BufferedChunkStream;
    use std::io::Cursor;

    #[test]
    fn body_is_split_into_chunks() {
        let mut source =
            HttpChunkSource::new(Cursor::new(b"ABCDEFGHIJ".to_vec()), 4, 100);

        let mut chunks = Vec::new();
        while let Some(chunk) = source.next_chunk().unwrap() {
            chunks.push(chunk);
        }
        assert_eq!(
            chunks,
            vec![b"ABCD".to_vec(), b"EFGH".to_vec(), b"IJ".to_vec()]
        );
        assert_eq!(source.received(), 10);
        assert!(source.next_chunk().unwrap().is_none());
    }

    #[test]
    fn exceeding_the_limit_fails() {
        let mut source =
            HttpChunkSource::new(Cursor::new(vec![b'x'; 12]), 5, 10);

        assert!(source.next_chunk().unwrap().is_some());
        assert!(source.next_chunk().unwrap().is_some());
        let err = source.next_chunk().unwrap_err();
        assert!(matches!(
            err,
            ProxyError::TooLarge {
                length: 12,
                limit: 10
            }
        ));
        assert!(source.next_chunk().unwrap().is_none());
    }

    #[test]
    fn limit_is_enforced_through_the_stream() {
        let source = HttpChunkSource::new(Cursor::new(vec![b'x'; 64]), 16, 40);
        let mut stream = BufferedChunkStream::new(source);

        assert_eq!(stream.read(Some(20)).unwrap().len(), 20);
        let err = stream.read(None).unwrap_err();
        assert!(matches!(err, ProxyError::TooLarge { .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ProxyConfig {
            chunk_size: 0,
            ..ProxyConfig::default()
        };
        assert!(Fetcher::new(&config).is_err());
    }
}
