//! Page-by-page listing shared by every collection endpoint.
//!
//! REST listings are cursored by page number, GraphQL connections by an
//! opaque `endCursor`; both are expressed as a [`Page`] whose `next` is the
//! cursor of the following page, or `None` on the last one.

use std::future::Future;

use futures_util::stream::{self, Stream, TryStreamExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T, C> {
    pub items: Vec<T>,
    pub next: Option<C>,
}

impl<T, C> Page<T, C> {
    pub fn last(items: Vec<T>) -> Self {
        Page { items, next: None }
    }

    pub fn with_next(items: Vec<T>, next: C) -> Self {
        Page {
            items,
            next: Some(next),
        }
    }
}

/// Lazily fetches pages starting at `first`, yielding each page's items.
///
/// Nothing is requested until the stream is polled. Calling `paginate` again
/// with the same arguments restarts from the first page.
pub fn paginate<T, C, E, F, Fut>(first: C, mut fetch: F) -> impl Stream<Item = Result<Vec<T>, E>>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<Page<T, C>, E>>,
{
    stream::try_unfold(Some(first), move |cursor| {
        let request = cursor.map(&mut fetch);
        async move {
            match request {
                None => Ok(None),
                Some(request) => {
                    let page = request.await?;
                    Ok(Some((page.items, page.next)))
                }
            }
        }
    })
}

/// Fetches every page and flattens the items in arrival order.
///
/// The first failing page aborts the listing; items from earlier pages are
/// dropped.
pub async fn collect_all<T, C, E, F, Fut>(first: C, fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<Page<T, C>, E>>,
{
    paginate(first, fetch).try_concat().await
}
