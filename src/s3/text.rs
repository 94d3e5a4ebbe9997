//! Text operations over prefix-scoped objects.
//!
//! [`Text::read`] and [`Text::write`] work on whole UTF-8 bodies.
//! [`Text::stream_lines`] and [`Text::stream_csv`] pull the response body
//! incrementally instead of loading it into memory; both sequences are
//! single-pass and finite, and re-reading requires a fresh call.

use std::collections::BTreeMap;

use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use super::S3;
use crate::error::CloudError;

/// Text accessor borrowed from an [`S3`] client.
#[derive(Clone, Copy, Debug)]
pub struct Text<'a> {
    store: &'a S3,
}

impl<'a> Text<'a> {
    pub(super) fn new(store: &'a S3) -> Self {
        Self { store }
    }

    /// Downloads the object at the resolved key and decodes it as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::RemoteNotFound`] when the key does not exist and
    /// [`CloudError::Decode`] when the body is not valid UTF-8.
    pub async fn read(&self, cloud: &str) -> Result<String, CloudError> {
        let key = self.store.key_for(cloud);
        let body = self.fetch(&key, "read").await?;
        let bytes = body
            .collect()
            .await
            .map_err(|err| CloudError::RemoteIo {
                operation: "read",
                target: key.clone(),
                message: err.to_string(),
            })?
            .to_vec();
        String::from_utf8(bytes).map_err(|err| CloudError::Decode {
            key,
            message: err.to_string(),
        })
    }

    /// Encodes `content` as UTF-8 and uploads it as the object body,
    /// overwriting any existing object at the resolved key.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::RemoteIo`] when the provider rejects the write
    /// or [`CloudError::Authentication`] when the credentials are rejected.
    pub async fn write(&self, content: &str, cloud: &str) -> Result<(), CloudError> {
        let key = self.store.key_for(cloud);
        debug!(bucket = %self.store.bucket, key = %key, "writing text object");
        self.store
            .client
            .put_object()
            .bucket(&self.store.bucket)
            .key(&key)
            .body(ByteStream::from(content.as_bytes().to_vec()))
            .send()
            .await
            .map_err(|err| super::map_sdk_error("write", &key, err))?;
        Ok(())
    }

    /// Opens a lazy, single-pass line sequence over the object at the
    /// resolved key.
    ///
    /// Lines are split on `\n` only; a final line without a trailing
    /// terminator is yielded exactly once. The sequence is not restartable —
    /// call `stream_lines` again to read from the start.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::RemoteNotFound`] when the key does not exist.
    /// Decoding failures surface from [`Lines::next_line`] as the affected
    /// line is reached.
    pub async fn stream_lines(&self, cloud: &str) -> Result<Lines, CloudError> {
        let key = self.store.key_for(cloud);
        let body = self.fetch(&key, "stream_lines").await?;
        Ok(Lines::new(key, body))
    }

    /// Opens a lazy row sequence over a CSV object at the resolved key.
    ///
    /// The first line is the header; each later line parses as one record
    /// and is returned as a column-to-value map. Records spanning physical
    /// lines (quoted embedded newlines) are not supported.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::RemoteNotFound`] when the key does not exist.
    /// Parse failures surface from [`CsvRows::next_row`].
    pub async fn stream_csv(&self, cloud: &str, delimiter: u8) -> Result<CsvRows, CloudError> {
        let lines = self.stream_lines(cloud).await?;
        Ok(CsvRows::new(lines, delimiter))
    }

    async fn fetch(&self, key: &str, operation: &'static str) -> Result<ByteStream, CloudError> {
        debug!(bucket = %self.store.bucket, key = %key, "fetching text object");
        let response = self
            .store
            .client
            .get_object()
            .bucket(&self.store.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| super::map_sdk_error(operation, key, err))?;
        Ok(response.body)
    }
}

/// Lazy, single-pass sequence of text lines read from a remote object.
///
/// Splitting happens on the byte level: a `\n` byte never occurs inside a
/// multi-byte UTF-8 sequence, so each buffered line decodes independently.
#[derive(Debug)]
pub struct Lines {
    key: String,
    body: ByteStream,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl Lines {
    fn new(key: String, body: ByteStream) -> Self {
        Self {
            key,
            body,
            buffer: Vec::new(),
            exhausted: false,
        }
    }

    /// Returns the next line, or `None` once the object is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::RemoteIo`] when reading the body fails mid-way
    /// and [`CloudError::Decode`] when a line is not valid UTF-8.
    pub async fn next_line(&mut self) -> Result<Option<String>, CloudError> {
        loop {
            if let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=position).collect();
                line.pop();
                return self.decode(line).map(Some);
            }
            if self.exhausted {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let rest = std::mem::take(&mut self.buffer);
                return self.decode(rest).map(Some);
            }
            match self.body.try_next().await {
                Ok(Some(chunk)) => self.buffer.extend_from_slice(&chunk),
                Ok(None) => self.exhausted = true,
                Err(err) => {
                    return Err(CloudError::RemoteIo {
                        operation: "stream_lines",
                        target: self.key.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<String, CloudError> {
        String::from_utf8(bytes).map_err(|err| CloudError::Decode {
            key: self.key.clone(),
            message: err.to_string(),
        })
    }
}

/// Lazy, single-pass sequence of CSV rows read from a remote object.
#[derive(Debug)]
pub struct CsvRows {
    lines: Lines,
    delimiter: u8,
    headers: Option<Vec<String>>,
}

impl CsvRows {
    fn new(lines: Lines, delimiter: u8) -> Self {
        Self {
            lines,
            delimiter,
            headers: None,
        }
    }

    /// Returns the next row as a column-to-value map, or `None` once the
    /// object is exhausted. Blank lines are skipped, as is an object with no
    /// header line at all.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Decode`] when a line fails to parse or its
    /// field count does not match the header.
    pub async fn next_row(&mut self) -> Result<Option<BTreeMap<String, String>>, CloudError> {
        if self.headers.is_none() {
            let Some(header_line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            self.headers = Some(self.parse_record(&header_line)?);
        }
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            let fields = self.parse_record(&line)?;
            if fields.is_empty() {
                continue;
            }
            let Some(headers) = &self.headers else {
                return Ok(None);
            };
            if fields.len() != headers.len() {
                return Err(CloudError::Decode {
                    key: self.lines.key.clone(),
                    message: format!(
                        "csv row has {} fields but the header has {}",
                        fields.len(),
                        headers.len()
                    ),
                });
            }
            return Ok(Some(headers.iter().cloned().zip(fields).collect()));
        }
    }

    fn parse_record(&self, line: &str) -> Result<Vec<String>, CloudError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .from_reader(line.as_bytes());
        match reader.records().next() {
            Some(Ok(record)) => Ok(record.iter().map(str::to_owned).collect()),
            Some(Err(err)) => Err(CloudError::Decode {
                key: self.lines.key.clone(),
                message: err.to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }
}
