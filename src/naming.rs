//! Name cleaning, filename sanitization and naming-template rendering.

use std::sync::LazyLock;

use regex::Regex;

use crate::item::WorkItem;

/// Maximum length (in characters) of a sanitized filename component.
pub const MAX_FILENAME_CHARS: usize = 200;

/// Decorations stripped from the end of titles and channel names.
const TRAILING_DECORATIONS: [&str; 7] = [
    " - Topic",
    " - Official Audio",
    " - Official Video",
    "(Official Music Video)",
    "(Official Audio)",
    "[Official Music Video]",
    "[Official Audio]",
];

const LEADING_ALBUM_PREFIX: &str = "Album - ";

/// Trailing "- topic" / "(topic)" channel marker.
#[allow(clippy::expect_used)]
static TRAILING_TOPIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[-(\[]\s*topic\s*[)\]]?\s*$").expect("topic regex is valid") // Static pattern, safe to panic
});

/// Trailing "- official ..." / "(official ...)" marker.
#[allow(clippy::expect_used)]
static TRAILING_OFFICIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[-(\[]\s*official.*[)\]]?\s*$").expect("official regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    let split = value.len().checked_sub(suffix.len())?;
    let tail = value.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &value[..split])
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

/// Removes channel decorations ("- Topic", "(Official Audio)", ...) and
/// collapses whitespace.
#[must_use]
pub fn clean_name(name: &str) -> String {
    let mut cleaned = name.trim().to_string();
    if cleaned.is_empty() {
        return cleaned;
    }

    for decoration in TRAILING_DECORATIONS {
        if let Some(stripped) = strip_suffix_ignore_case(&cleaned, decoration) {
            cleaned = stripped.trim().to_string();
        }
    }
    if let Some(stripped) = strip_prefix_ignore_case(&cleaned, LEADING_ALBUM_PREFIX) {
        cleaned = stripped.trim().to_string();
    }

    let cleaned = TRAILING_TOPIC.replace(&cleaned, "");
    let cleaned = TRAILING_OFFICIAL.replace(cleaned.trim(), "");
    WHITESPACE_RUN
        .replace_all(cleaned.trim(), " ")
        .trim()
        .to_string()
}

/// Cleans `name` and replaces characters that are invalid in file names.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = clean_name(name);
    let replaced: String = cleaned
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_FILENAME_CHARS)
        .collect();
    replaced.trim().to_string()
}

/// Renders a naming template for `item`.
///
/// `{artist}` and `{title}` are sanitized; `{track}` becomes the zero-padded
/// group position, or disappears together with its separator when the item
/// has no position.
#[must_use]
pub fn render_template(template: &str, item: &WorkItem) -> String {
    let artist = item
        .artist
        .as_deref()
        .map(sanitize_filename)
        .filter(|artist| !artist.is_empty())
        .unwrap_or_else(|| "Unknown Artist".to_string());
    let title = sanitize_filename(&item.title);

    let mut rendered = template
        .replace("{artist}", &artist)
        .replace("{title}", &title);

    match item.position {
        Some(position) => {
            rendered = rendered.replace("{track}", &format!("{position:02}"));
        }
        None => {
            rendered = rendered
                .replace("{track} - ", "")
                .replace(" - {track}", "")
                .replace("{track}", "");
        }
    }

    let rendered = rendered.trim().trim_matches('-').trim().to_string();
    if rendered.is_empty() {
        sanitize_filename(&item.id)
    } else {
        rendered
    }
}
