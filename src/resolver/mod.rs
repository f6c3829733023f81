//! Metadata/listing contract: turn user input into ordered work items.
//!
//! A [`MediaResolver`] expands one input (a video URL, a playlist URL, ...)
//! into the [`WorkItem`]s it names, in order. [`DirectResolver`] is the
//! reference implementation for plain media URLs.
//!
//! # Example
//!
//! ```
//! use mixtape_core::resolver::{DirectResolver, MediaResolver};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let items = DirectResolver::new()
//!     .resolve("https://example.com/song.mp3", &CancellationToken::new())
//!     .await?;
//! assert_eq!(items[0].title, "song");
//! # Ok(())
//! # }
//! ```

mod direct;
mod error;

pub use direct::DirectResolver;
pub use error::ResolveError;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::item::WorkItem;

/// Expands one input into the ordered list of items it names.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Resolves `input` into work items.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidInput`] for input this resolver cannot
    /// parse, [`ResolveError::ResolutionFailed`] when listing fails and
    /// [`ResolveError::Cancelled`] when `cancel` fires first.
    async fn resolve(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkItem>, ResolveError>;
}
