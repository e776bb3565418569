// ABOUTME: Incremental sync of Instapaper bookmarks into the local cache
// ABOUTME: Fetches only unknown ids, fails fast, and renders the merged feed

use crate::{
    api::BookmarkSource,
    error::ResultExt,
    feed::FeedRenderer,
    storage::{write_atomic, BookmarkStore},
    Bookmark, RemoteItem, Result,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{info, warn};

/// Result of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub new_count: usize,
    /// Known bookmarks followed by the new ones. Empty when nothing was new.
    pub bookmarks: Vec<Bookmark>,
}

impl SyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.new_count == 0
    }
}

/// Reconciles the local cache with the remote bookmark list.
///
/// The pass is not atomic across bookmarks: each one is stored as soon as
/// its text arrives, so a failure part-way leaves a prefix of the new
/// bookmarks cached. Those ids are excluded on the next run.
pub struct SyncEngine<'a, S, St> {
    source: &'a S,
    store: &'a mut St,
    show_progress: bool,
}

impl<'a, S: BookmarkSource, St: BookmarkStore> SyncEngine<'a, S, St> {
    pub fn new(source: &'a S, store: &'a mut St) -> Self {
        SyncEngine {
            source,
            store,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn load_known(&self) -> Result<Vec<Bookmark>> {
        self.store.load().context("loading cached bookmarks")
    }

    pub fn sync(&mut self, known: Vec<Bookmark>) -> Result<SyncOutcome> {
        let exclude_ids: Vec<u64> = known.iter().map(|b| b.id).collect();

        let items = self
            .source
            .list_items(&exclude_ids)
            .context("listing bookmarks")?;

        let mut fresh = new_bookmarks(items, &exclude_ids);
        if fresh.is_empty() {
            info!("No new bookmarks");
            return Ok(SyncOutcome {
                new_count: 0,
                bookmarks: Vec::new(),
            });
        }

        let pb = self.progress_bar(fresh.len());
        for bookmark in fresh.iter_mut() {
            let id = bookmark.id;
            bookmark.text = self
                .source
                .fetch_item_text(id)
                .with_context(|| format!("fetching text of bookmark {}", id))?;

            self.store
                .store(bookmark)
                .with_context(|| format!("writing bookmark {}", id))?;
            pb.inc(1);
        }
        pb.finish_and_clear();

        let new_count = fresh.len();
        info!(new_count, known = known.len(), "fetched new bookmarks");

        let mut bookmarks = known;
        bookmarks.extend(fresh);
        Ok(SyncOutcome {
            new_count,
            bookmarks,
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("[{bar:40}] {pos}/{len} bookmarks") {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}

/// Keeps bookmark entries in API order, dropping user/error/other kinds and
/// any id already known.
fn new_bookmarks(items: Vec<RemoteItem>, known_ids: &[u64]) -> Vec<Bookmark> {
    let mut fresh: Vec<Bookmark> = Vec::new();
    for item in items {
        match item {
            RemoteItem::Bookmark(remote) => {
                let id = remote.bookmark_id;
                if known_ids.contains(&id) || fresh.iter().any(|b| b.id == id) {
                    continue;
                }
                fresh.push(Bookmark::from(remote));
            }
            RemoteItem::Error {
                error_code,
                message,
            } => {
                warn!(error_code, %message, "ignoring error entry in bookmark list");
            }
            RemoteItem::User { .. } | RemoteItem::Other => {}
        }
    }
    fresh
}

/// One full run: load the cache, sync, and write the feed when anything is new.
///
/// Returns the number of new bookmarks. Zero means nothing was rendered or written.
pub fn run<S, St, R>(
    source: &S,
    store: &mut St,
    renderer: &R,
    feed_path: &Path,
    show_progress: bool,
) -> Result<usize>
where
    S: BookmarkSource,
    St: BookmarkStore,
    R: FeedRenderer,
{
    let mut engine = SyncEngine::new(source, store).with_progress(show_progress);
    let known = engine.load_known()?;
    let outcome = engine.sync(known).context("sync")?;

    if outcome.is_noop() {
        return Ok(0);
    }

    let feed = renderer
        .render(&outcome.bookmarks)
        .context("building feed")?;
    write_atomic(feed_path, &feed, 0o644)
        .with_context(|| format!("writing feed to {}", feed_path.display()))?;

    info!(
        path = %feed_path.display(),
        entries = outcome.bookmarks.len(),
        "feed written"
    );
    Ok(outcome.new_count)
}
