//! Work items and the output hints derived from them.
//!
//! A [`WorkItem`] is one media entry to fetch. Its identity fields are owned by
//! the caller and never modified by the orchestrator; only side state such as
//! retry attempt counters is tracked elsewhere, keyed by [`WorkItem::id`].

use serde::{Deserialize, Serialize};

/// Naming template used for items that belong to a group (playlist-like).
pub const GROUP_TEMPLATE: &str = "{track} - {artist} - {title}";

/// Naming template used for standalone items.
pub const SINGLE_TEMPLATE: &str = "{artist} - {title}";

/// One unit of work: a single media entry with a stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable key, unique within a run.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Performer or channel name, used by naming templates.
    #[serde(default)]
    pub artist: Option<String>,
    /// Grouping key (playlist title) this item belongs to.
    #[serde(default)]
    pub group: Option<String>,
    /// 1-based ordinal position within the group.
    #[serde(default)]
    pub position: Option<u32>,
    /// Number of entries in the group.
    #[serde(default)]
    pub group_size: Option<u32>,
    /// Explicit target subfolder, overriding the grouping key.
    #[serde(default)]
    pub folder_hint: Option<String>,
    /// Explicit naming template, overriding the derived one.
    #[serde(default)]
    pub template_hint: Option<String>,
    /// Where the processor fetches the media from.
    #[serde(default)]
    pub source_url: Option<String>,
}

impl WorkItem {
    /// Creates a standalone item with only identity fields set.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: None,
            group: None,
            position: None,
            group_size: None,
            folder_hint: None,
            template_hint: None,
            source_url: None,
        }
    }

    /// Sets the performer name.
    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Places the item in a group at the given 1-based position.
    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>, position: u32, group_size: u32) -> Self {
        self.group = Some(group.into());
        self.position = Some(position);
        self.group_size = Some(group_size);
        self
    }

    /// Sets the source URL.
    #[must_use]
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Returns true when the item is part of a group.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.group.is_some()
    }
}

/// Output-organizing hints handed to the item processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputHints {
    /// Subfolder below the output root, if any.
    pub group_folder: Option<String>,
    /// Filename template with `{track}`, `{artist}` and `{title}` placeholders.
    pub naming_template: String,
}

impl OutputHints {
    /// Derives hints purely from the item's own fields.
    #[must_use]
    pub fn for_item(item: &WorkItem) -> Self {
        let group_folder = item
            .folder_hint
            .clone()
            .or_else(|| item.group.clone())
            .filter(|folder| !folder.trim().is_empty());
        let naming_template = item.template_hint.clone().unwrap_or_else(|| {
            if item.is_grouped() {
                GROUP_TEMPLATE.to_string()
            } else {
                SINGLE_TEMPLATE.to_string()
            }
        });
        Self {
            group_folder,
            naming_template,
        }
    }
}
