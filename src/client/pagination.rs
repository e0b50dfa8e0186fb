//! Cursor-based pagination over list endpoints
//!
//! List responses carry an `items` array and a `nextLink` URI; an empty
//! `nextLink` marks the last page. A [`Paginator`] resets the request's
//! cursor, then dispatches once per page, following `nextLink` until it is
//! empty, and hands out the items lazily as a [`Stream`].

use std::collections::VecDeque;

use futures::stream::{self, Stream, TryStreamExt};
use log::debug;
use tokio_util::sync::CancellationToken;

use super::request::ApiRequest;
use super::vone::VOneClient;
use crate::error::Result;

/// A request whose responses carry a continuation cursor
pub trait PaginatedRequest: ApiRequest {
    /// Decoded response of one page
    type Page;

    /// Cursor left by the last page; empty when exhausted.
    fn next_link(&self) -> &str;

    /// Forget any cursor so the next dispatch fetches page 1.
    fn reset_pagination(&mut self);

    /// Move the last decoded page out, advancing the cursor to its next link.
    fn take_page(&mut self) -> Option<Self::Page>;
}

/// Lazy single-pass walk over every page of a list request.
///
/// Build a new paginator to restart from the first page.
pub struct Paginator<'a, R, F> {
    client: &'a VOneClient,
    request: &'a mut R,
    project: F,
}

struct WalkState<'a, R, F, T> {
    client: &'a VOneClient,
    request: &'a mut R,
    project: F,
    ctx: &'a CancellationToken,
    buffer: VecDeque<T>,
    page: usize,
    done: bool,
}

impl<'a, R, F, T> Paginator<'a, R, F>
where
    R: PaginatedRequest,
    F: FnMut(R::Page) -> Vec<T>,
{
    /// Walk `request` from its first page, projecting each page into items.
    pub fn new(client: &'a VOneClient, request: &'a mut R, project: F) -> Self {
        request.reset_pagination();
        Self {
            client,
            request,
            project,
        }
    }

    /// Stream of items in server order.
    ///
    /// A failed page yields one `Err` and ends the stream. Dropping the
    /// stream stops further dispatches.
    pub fn into_stream(self, ctx: &'a CancellationToken) -> impl Stream<Item = Result<T>> + 'a
    where
        R: 'a,
        F: 'a,
        T: 'a,
    {
        let state = WalkState {
            client: self.client,
            request: self.request,
            project: self.project,
            ctx,
            buffer: VecDeque::new(),
            page: 0,
            done: false,
        };

        stream::unfold(state, |mut st| async move {
            loop {
                if let Some(item) = st.buffer.pop_front() {
                    return Some((Ok(item), st));
                }
                if st.done {
                    return None;
                }

                st.page += 1;
                if let Err(err) = st.client.execute(st.ctx, &mut *st.request).await {
                    debug!("Page {} failed: {}", st.page, err);
                    st.done = true;
                    return Some((Err(err), st));
                }

                let page = st.request.take_page();
                st.done = st.request.next_link().is_empty();
                if let Some(page) = page {
                    st.buffer.extend((st.project)(page));
                }
                debug!(
                    "Page {}: {} items, more: {}",
                    st.page,
                    st.buffer.len(),
                    !st.done
                );
            }
        })
    }

    /// Drain every page into a vector, stopping at the first error.
    pub async fn collect_all(self, ctx: &'a CancellationToken) -> Result<Vec<T>>
    where
        R: 'a,
        F: 'a,
        T: 'a,
    {
        self.into_stream(ctx).try_collect().await
    }
}
