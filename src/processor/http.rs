//! Streaming HTTP(S) item processor.
//!
//! Fetches the item's source URL and writes the body to
//! `output_root/<group folder>/<rendered template>.<ext>`. Transcoding and
//! tagging are left to richer processors.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{ItemProcessor, ProcessError, ProcessRequest, ProgressReporter};
use crate::item::WorkItem;
use crate::naming::{render_template, sanitize_filename};
use crate::user_agent;

/// HTTP connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout, sized for large media files.
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Extension used when the URL path carries none.
const FALLBACK_EXTENSION: &str = "bin";

/// Processor that streams plain HTTP(S) sources to disk.
///
/// Create once and reuse; the inner client pools connections.
#[derive(Debug, Clone)]
pub struct HttpItemProcessor {
    client: Client,
}

impl Default for HttpItemProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpItemProcessor {
    /// Creates a processor with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ItemProcessor for HttpItemProcessor {
    #[instrument(skip_all, fields(id = %request.item.id))]
    async fn process(
        &self,
        request: ProcessRequest<'_>,
        cancel: CancellationToken,
        progress: ProgressReporter,
    ) -> Result<PathBuf, ProcessError> {
        let url = source_url(request.item)?;
        let directory = match &request.hints.group_folder {
            Some(folder) => request.output_root.join(sanitize_filename(folder)),
            None => request.output_root.to_path_buf(),
        };
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| ProcessError::io(&directory, e))?;

        let file_name = format!(
            "{}.{}",
            render_template(&request.hints.naming_template, request.item),
            extension_from_url(&url)
        );
        let file_path = directory.join(file_name);
        debug!(url = %url, path = %file_path.display(), quality = request.quality, "fetching");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProcessError::Cancelled),
            response = self.client.get(url.as_str()).send() => {
                response.map_err(|e| ProcessError::network(url.as_str(), e))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ProcessError::http_status(url.as_str(), status.as_u16()));
        }

        let content_length = response.content_length().filter(|len| *len > 0);
        let file = File::create(&file_path)
            .await
            .map_err(|e| ProcessError::io(&file_path, e))?;
        let mut writer = BufWriter::new(file);

        let streamed = stream_body(
            response,
            &mut writer,
            &file_path,
            url.as_str(),
            content_length,
            &cancel,
            &progress,
        )
        .await;

        match streamed {
            Ok(bytes) => {
                progress.report(1.0);
                info!(bytes, path = %file_path.display(), "item saved");
                Ok(file_path)
            }
            Err(error) => {
                drop(writer);
                remove_partial(&file_path).await;
                Err(error)
            }
        }
    }
}

async fn stream_body(
    response: reqwest::Response,
    writer: &mut BufWriter<File>,
    file_path: &Path,
    url: &str,
    content_length: Option<u64>,
    cancel: &CancellationToken,
    progress: &ProgressReporter,
) -> Result<u64, ProcessError> {
    let mut stream = response.bytes_stream();
    let mut received: u64 = 0;

    loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ProcessError::Cancelled),
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk.map_err(|e| ProcessError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| ProcessError::io(file_path, e))?;
        received += chunk.len() as u64;

        if let Some(total) = content_length {
            #[allow(clippy::cast_precision_loss)]
            progress.report(received as f64 / total as f64);
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| ProcessError::io(file_path, e))?;
    Ok(received)
}

async fn remove_partial(path: &Path) {
    if let Err(error) = tokio::fs::remove_file(path).await
        && error.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %error, "failed to remove partial file");
    }
}

/// Picks the URL to fetch: the explicit source URL, else an identifier that
/// is itself an HTTP(S) URL.
fn source_url(item: &WorkItem) -> Result<Url, ProcessError> {
    let raw = item.source_url.as_deref().unwrap_or(&item.id);
    let url = Url::parse(raw)
        .map_err(|e| ProcessError::invalid_source(&item.id, format!("not a URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProcessError::invalid_source(
            &item.id,
            format!("unsupported scheme '{other}'"),
        )),
    }
}

fn extension_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_source_url_prefers_explicit_source() {
        let item = WorkItem::new("vid-1", "Song").with_source_url("https://cdn.example.com/a.mp3");
        assert_eq!(source_url(&item).unwrap().as_str(), "https://cdn.example.com/a.mp3");
    }

    #[test]
    fn test_source_url_falls_back_to_url_identifier() {
        let item = WorkItem::new("https://cdn.example.com/b.ogg", "Song");
        assert_eq!(source_url(&item).unwrap().host_str(), Some("cdn.example.com"));
    }

    #[test]
    fn test_source_url_rejects_plain_identifier() {
        let item = WorkItem::new("dQw4w9WgXcQ", "Song");
        assert!(matches!(
            source_url(&item),
            Err(ProcessError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_source_url_rejects_non_http_scheme() {
        let item = WorkItem::new("x", "Song").with_source_url("ftp://example.com/a.mp3");
        let error = source_url(&item).unwrap_err();
        assert!(error.to_string().contains("unsupported scheme 'ftp'"));
    }

    #[test]
    fn test_extension_from_url() {
        let url = Url::parse("https://example.com/media/Track.MP3?sig=1").unwrap();
        assert_eq!(extension_from_url(&url), "mp3");

        let url = Url::parse("https://example.com/stream").unwrap();
        assert_eq!(extension_from_url(&url), FALLBACK_EXTENSION);

        let url = Url::parse("https://example.com/file.not-an-ext").unwrap();
        assert_eq!(extension_from_url(&url), FALLBACK_EXTENSION);
    }
}
