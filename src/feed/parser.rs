use chrono::{DateTime, Utc};
use feed_rs::parser;
use sha2::{Digest, Sha256};

/// One entry of a parsed feed, in the shape the pipeline consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    /// Identifier used for deduplication: the link when present.
    pub id: String,
    pub title: String,
    pub link: Option<String>,
    pub author: Option<String>,
    /// Full-content bodies (`content:encoded`, Atom `<content>`), possibly HTML.
    pub content_parts: Vec<String>,
    /// Summary/description, possibly HTML.
    pub description: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl RawEntry {
    /// Creates an entry identified by its link. Handy for tests and sources
    /// that do not go through [`parse_feed`].
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        let link = link.into();
        Self {
            id: link.clone(),
            title: title.into(),
            link: Some(link),
            author: None,
            content_parts: Vec::new(),
            description: None,
            published: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_content(mut self, body: impl Into<String>) -> Self {
        self.content_parts.push(body.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Inline content: the content parts joined with a space, or the
    /// description when there are none. Empty when the entry carries neither.
    pub fn inline_content(&self) -> String {
        let joined = self
            .content_parts
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let joined = joined.trim();

        if !joined.is_empty() {
            return joined.to_string();
        }

        self.description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    }
}

/// Parses RSS or Atom bytes into entries, preserving document order.
///
/// Feeds conventionally list their newest entries first; the order is kept
/// untouched because the seen-article scan relies on it.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawEntry>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty());
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());
            let author = entry
                .authors
                .iter()
                .map(|p| p.name.trim())
                .find(|name| !name.is_empty())
                .map(str::to_string);
            let content_parts = entry
                .content
                .and_then(|c| c.body)
                .filter(|body| !body.trim().is_empty())
                .into_iter()
                .collect();
            let description = entry.summary.map(|s| s.content);
            let published = entry.published.or(entry.updated);

            let id = entry_identifier(link.as_deref(), &entry.id, &title, published);

            RawEntry {
                id,
                title,
                link,
                author,
                content_parts,
                description,
                published,
            }
        })
        .collect();

    Ok(entries)
}

/// Picks the deduplication identifier: the link, else the feed's own entry
/// id, else a digest of title and publication time.
fn entry_identifier(
    link: Option<&str>,
    feed_id: &str,
    title: &str,
    published: Option<DateTime<Utc>>,
) -> String {
    if let Some(link) = link {
        return link.to_string();
    }

    let feed_id = feed_id.trim();
    if !feed_id.is_empty() {
        return feed_id.to_string();
    }

    let input = format!(
        "{}|{}",
        title,
        published.map(|p| p.timestamp().to_string()).unwrap_or_default()
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
