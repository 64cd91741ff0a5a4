// Fetch Cursor Controller.
//
// Drives a paged API: issue a page with the previous page's cursor, stop on
// the iteration budget, on an empty cursor, or when the API hands back the
// cursor that was just used (some APIs return a stable "bottom" marker
// instead of nothing). Cursors live for one loop and are never persisted.

use async_trait::async_trait;
use futures::Stream;
use tracing::debug;

use crate::error::Result;
use crate::pacer::Pacer;

/// Why a cursor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// `max_iterations` pages were issued.
    Exhausted,
    /// The last page carried no continuation token.
    NoCursor,
    /// The last page returned the cursor it was requested with.
    Cycle,
}

/// Pure cursor bookkeeping for one loop.
#[derive(Debug, Clone)]
pub struct CursorState {
    max_iterations: u32,
    issued: u32,
    cursor: Option<String>,
    stop: Option<Stop>,
}

impl CursorState {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            max_iterations,
            issued: 0,
            cursor: None,
            stop: (max_iterations == 0).then_some(Stop::Exhausted),
        }
    }

    /// Cursor to send with the next request. `None` on the first request.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn issued(&self) -> u32 {
        self.issued
    }

    pub fn stop(&self) -> Option<Stop> {
        self.stop
    }

    pub fn is_finished(&self) -> bool {
        self.stop.is_some()
    }

    /// Record that a page was issued with `cursor()` and returned `next`.
    pub fn advance(&mut self, next: Option<String>) -> Option<Stop> {
        self.issued += 1;
        let next = next.filter(|c| !c.is_empty());

        self.stop = match next {
            None => Some(Stop::NoCursor),
            Some(ref c) if self.cursor.as_deref() == Some(c.as_str()) => Some(Stop::Cycle),
            Some(_) if self.issued >= self.max_iterations => Some(Stop::Exhausted),
            Some(_) => None,
        };
        self.cursor = next;
        self.stop
    }
}

/// One paged endpoint with a fixed query; the cursor is the only thing that varies.
#[async_trait]
pub trait PageSource: Send {
    type Page: Send;

    /// Issue one page request. Errors are page-level and end the loop.
    async fn issue(&mut self, cursor: Option<&str>) -> Result<Self::Page>;

    /// Continuation token carried by `page`, if any.
    fn next_cursor(&self, page: &Self::Page) -> Option<String>;
}

/// Lazily iterate the pages of `source`.
///
/// Every request goes through `pacer.wait()`; the pacer lets the first one
/// through immediately. A page is yielded before the next request is made, so
/// dropping the stream stops the loop without another request.
pub fn paginate<'a, S>(
    pacer: &'a Pacer,
    max_iterations: u32,
    mut source: S,
) -> impl Stream<Item = Result<S::Page>> + Send + 'a
where
    S: PageSource + 'a,
{
    async_stream::try_stream! {
        let mut state = CursorState::new(max_iterations);
        while !state.is_finished() {
            pacer.wait().await;
            let cursor = state.cursor().map(str::to_string);
            let page = source.issue(cursor.as_deref()).await?;
            let next = source.next_cursor(&page);
            if let Some(stop) = state.advance(next) {
                debug!(?stop, pages = state.issued(), "cursor loop finished");
            }
            yield page;
        }
    }
}
