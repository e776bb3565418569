// ABOUTME: Renders cached bookmarks as an Atom 1.0 feed document
// ABOUTME: Fixed XML template with escaped text and RFC 3339 timestamps

use crate::{Bookmark, Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};

pub const DEFAULT_FEED_TITLE: &str = "Instapaper";
pub const DEFAULT_FEED_ID: &str = "https://www.instapaper.com/u";

/// Renderer collaborator of the sync run.
pub trait FeedRenderer {
    fn render(&self, bookmarks: &[Bookmark]) -> Result<Vec<u8>>;
}

pub struct AtomFeed {
    pub title: String,
    pub id: String,
    clock: fn() -> DateTime<Utc>,
}

impl Default for AtomFeed {
    fn default() -> Self {
        AtomFeed {
            title: DEFAULT_FEED_TITLE.into(),
            id: DEFAULT_FEED_ID.into(),
            clock: Utc::now,
        }
    }
}

impl AtomFeed {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    fn entry(bookmark: &Bookmark) -> Result<String> {
        let updated = DateTime::<Utc>::from_timestamp(bookmark.time, 0).ok_or_else(|| {
            Error::Feed(format!(
                "bookmark {} has an out-of-range time {}",
                bookmark.id, bookmark.time
            ))
        })?;

        Ok(format!(
            "  <entry>\n    <title>{}</title>\n    <link href=\"{}\"/>\n    <id>{}</id>\n    <updated>{}</updated>\n    <summary type=\"html\">{}</summary>\n  </entry>\n",
            encode_text(&bookmark.title),
            encode_double_quoted_attribute(&bookmark.url),
            bookmark.id,
            rfc3339(updated),
            encode_text(&bookmark.text),
        ))
    }
}

impl FeedRenderer for AtomFeed {
    fn render(&self, bookmarks: &[Bookmark]) -> Result<Vec<u8>> {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
        out.push_str(&format!("  <title>{}</title>\n", encode_text(&self.title)));
        out.push_str(&format!("  <id>{}</id>\n", encode_text(&self.id)));
        out.push_str(&format!("  <updated>{}</updated>\n", rfc3339((self.clock)())));

        for bookmark in bookmarks {
            out.push_str(&Self::entry(bookmark)?);
        }

        out.push_str("</feed>\n");
        Ok(out.into_bytes())
    }
}

fn rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
