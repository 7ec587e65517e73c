use async_trait::async_trait;

use super::cursor::{CompositeCursor, SubCursor, CURSOR_SEPARATOR};
use super::{FeedError, FeedItem, FeedPage, FeedSource, FetchParams};

/// Serves a private and a public source as one paginated feed
///
/// Both sides are fetched concurrently with the shared limit. Within a page
/// private items come first, then public ones; this is a placement rule, not a
/// chronological interleave. Errors from either side propagate; wrap a side in
/// [`BestEffort`](super::BestEffort) to degrade instead.
#[derive(Debug, Clone)]
pub struct FeedMerger<P, Q> {
    private: P,
    public: Q,
}

impl<P: FeedSource, Q: FeedSource> FeedMerger<P, Q> {
    pub fn new(private: P, public: Q) -> Self {
        Self { private, public }
    }

    pub fn private(&self) -> &P {
        &self.private
    }

    pub fn public(&self) -> &Q {
        &self.public
    }
}

async fn fetch_side<S: FeedSource>(
    source: &S,
    cursor: &SubCursor,
    limit: usize,
) -> Result<(Vec<FeedItem>, SubCursor), FeedError> {
    if cursor.is_exhausted() {
        return Ok((Vec::new(), SubCursor::Exhausted));
    }
    let page = source
        .fetch(FetchParams {
            cursor: cursor.as_request(),
            limit,
        })
        .await?;
    if let Some(next) = &page.cursor {
        if next.contains(CURSOR_SEPARATOR) {
            return Err(FeedError::InvalidCursor(format!(
                "sub-cursor {:?} contains {:?}",
                next, CURSOR_SEPARATOR
            )));
        }
    }
    Ok((page.items, SubCursor::next(page.cursor)))
}

#[async_trait]
impl<P: FeedSource, Q: FeedSource> FeedSource for FeedMerger<P, Q> {
    /// Private side first, public as the fallback
    // NOTE: the private-first order is kept as observed; surfacing the newest
    //  visible item may want the two compared instead, pending product input
    async fn peek_latest(&self) -> Result<Option<FeedItem>, FeedError> {
        match self.private.peek_latest().await {
            Ok(Some(item)) => return Ok(Some(item)),
            Ok(None) => {}
            Err(e) => tracing::debug!("private peek failed, falling back to public: {}", e),
        }
        self.public.peek_latest().await
    }

    async fn fetch(&self, params: FetchParams) -> Result<FeedPage, FeedError> {
        let cursor = CompositeCursor::parse(params.cursor.as_deref());

        let (private, public) = futures::join!(
            fetch_side(&self.private, &cursor.private, params.limit),
            fetch_side(&self.public, &cursor.public, params.limit),
        );
        let (mut items, private_next) = private?;
        let (public_items, public_next) = public?;
        items.extend(public_items);

        let next = CompositeCursor {
            private: private_next,
            public: public_next,
        };
        tracing::debug!(
            "merged page of {} items, next cursor {}",
            items.len(),
            next
        );
        Ok(FeedPage {
            cursor: Some(next.to_string()),
            items,
        })
    }
}
