//! Direct URL resolver - one plain media URL becomes one work item.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{MediaResolver, ResolveError};
use crate::item::WorkItem;

/// A resolver that turns an absolute HTTP(S) URL into a single item.
///
/// The item identifier is the URL itself; the title is the decoded last path
/// segment without its extension, falling back to the host.
#[derive(Debug)]
pub struct DirectResolver;

impl DirectResolver {
    /// Creates a new `DirectResolver`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for DirectResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaResolver for DirectResolver {
    fn name(&self) -> &'static str {
        "direct"
    }

    #[tracing::instrument(skip(self, cancel), fields(resolver = "direct"))]
    async fn resolve(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkItem>, ResolveError> {
        if cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }

        let input = input.trim();
        let url = Url::parse(input)
            .map_err(|e| ResolveError::invalid_input(input, format!("not a URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ResolveError::invalid_input(
                input,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        let title = title_from_url(&url);
        Ok(vec![WorkItem::new(input, title).with_source_url(url.as_str())])
    }
}

fn title_from_url(url: &Url) -> String {
    let from_path = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
        .map(|segment| {
            urlencoding::decode(segment)
                .map_or_else(|_| segment.to_string(), |decoded| decoded.into_owned())
        })
        .map(|segment| match segment.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => segment,
        })
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty());

    from_path.unwrap_or_else(|| url.host_str().unwrap_or_default().to_string())
}
