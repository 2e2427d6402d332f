//! Post queries and mutations on top of [`QueryCache`].

use educamais_client::{
    ApiClient, Error, ListPostsQuery, Paginated, Post, PostInput, PostsApi, Result,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use crate::cache::{CacheStats, QueryCache};
use crate::config::QueryConfig;
use crate::entry::EntryState;

/// Page size used by the infinite feed.
pub const FEED_PAGE_SIZE: u32 = 10;

/// Cache key for post queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PostKey {
    /// One page of the list endpoint.
    List {
        page: u32,
        limit: u32,
        query: Option<String>,
    },
    /// The chained feed for a search term.
    Infinite { query: Option<String> },
    /// A single post.
    Detail(u64),
}

impl PostKey {
    pub fn list(page: u32, limit: u32, query: Option<&str>) -> Self {
        let ListPostsQuery { page, limit, query } = ListPostsQuery::new(page, limit, query);
        PostKey::List { page, limit, query }
    }

    pub fn infinite(query: Option<&str>) -> Self {
        PostKey::Infinite {
            query: ListPostsQuery::new(1, FEED_PAGE_SIZE, query).query,
        }
    }

    /// True for every key holding list data.
    pub fn is_list(&self) -> bool {
        matches!(self, PostKey::List { .. } | PostKey::Infinite { .. })
    }
}

/// Pages loaded so far by an [`InfinitePosts`] feed.
pub type PageSet = Vec<Paginated<Post>>;

/// Cached access to posts.
///
/// Reads go through per-shape caches keyed by [`PostKey`]. Mutations call
/// the API and invalidate affected keys before returning, so the next read
/// of a list refetches.
#[derive(Debug, Clone)]
pub struct PostQueries {
    posts: PostsApi,
    lists: QueryCache<PostKey, Paginated<Post>, Error>,
    feeds: QueryCache<PostKey, PageSet, Error>,
    details: QueryCache<PostKey, Post, Error>,
}

impl PostQueries {
    pub fn new(client: &ApiClient, config: QueryConfig) -> Self {
        Self {
            posts: client.posts(),
            lists: QueryCache::new(config.clone()),
            feeds: QueryCache::new(config.clone()),
            details: QueryCache::new(config),
        }
    }

    /// One page of posts.
    pub async fn list(
        &self,
        page: u32,
        limit: u32,
        query: Option<&str>,
    ) -> Result<Paginated<Post>> {
        let key = PostKey::list(page, limit, query);
        let request = ListPostsQuery::new(page, limit, query);
        let posts = self.posts.clone();
        self.lists
            .fetch(key, move || {
                let posts = posts.clone();
                let request = request.clone();
                async move { posts.list_with_query(&request).await }
            })
            .await
    }

    /// A single post.
    pub async fn detail(&self, id: u64) -> Result<Post> {
        let posts = self.posts.clone();
        self.details
            .fetch(PostKey::Detail(id), move || {
                let posts = posts.clone();
                async move { posts.get(id).await }
            })
            .await
    }

    /// The chained feed for `query`.
    pub fn infinite(&self, query: Option<&str>) -> InfinitePosts {
        InfinitePosts {
            posts: self.posts.clone(),
            cache: self.feeds.clone(),
            key: PostKey::infinite(query),
            request: ListPostsQuery::new(1, FEED_PAGE_SIZE, query),
        }
    }

    pub async fn create(&self, input: &PostInput) -> Result<Post> {
        let post = self.posts.create(input).await?;
        self.invalidate_lists();
        Ok(post)
    }

    pub async fn update(&self, id: u64, input: &PostInput) -> Result<Post> {
        let post = self.posts.update(id, input).await?;
        self.invalidate_lists();
        self.details.invalidate(|k| *k == PostKey::Detail(id));
        Ok(post)
    }

    pub async fn remove(&self, id: u64) -> Result<()> {
        self.posts.remove(id).await?;
        self.invalidate_lists();
        self.details.remove(&PostKey::Detail(id));
        Ok(())
    }

    /// Mark every list and feed key stale.
    pub fn invalidate_lists(&self) -> usize {
        let count =
            self.lists.invalidate(PostKey::is_list) + self.feeds.invalidate(PostKey::is_list);
        debug!(count, "Invalidated post lists");
        count
    }

    /// Cached state of `key`.
    pub fn state(&self, key: &PostKey) -> EntryState {
        match key {
            PostKey::List { .. } => self.lists.state(key),
            PostKey::Infinite { .. } => self.feeds.state(key),
            PostKey::Detail(_) => self.details.state(key),
        }
    }

    /// Combined counters across all post caches.
    pub fn stats(&self) -> CacheStats {
        [self.lists.stats(), self.feeds.stats(), self.details.stats()]
            .into_iter()
            .fold(CacheStats::default(), |acc, s| CacheStats {
                entries: acc.entries + s.entries,
                hits: acc.hits + s.hits,
                stale_hits: acc.stale_hits + s.stale_hits,
                misses: acc.misses + s.misses,
                fetches: acc.fetches + s.fetches,
                failures: acc.failures + s.failures,
            })
    }

    pub fn clear(&self) {
        self.lists.clear();
        self.feeds.clear();
        self.details.clear();
    }
}

/// A feed that loads pages one after another.
///
/// The whole page set is cached under [`PostKey::Infinite`], so
/// invalidating lists restarts the chain from page 1.
#[derive(Debug, Clone)]
pub struct InfinitePosts {
    posts: PostsApi,
    cache: QueryCache<PostKey, PageSet, Error>,
    key: PostKey,
    request: ListPostsQuery,
}

impl InfinitePosts {
    pub fn key(&self) -> &PostKey {
        &self.key
    }

    /// Load the feed, fetching the first page if nothing is cached.
    pub async fn load(&self) -> Result<PageSet> {
        self.cache.fetch(self.key.clone(), self.first_page()).await
    }

    /// Load the first page again, dropping later pages.
    pub async fn restart(&self) -> Result<PageSet> {
        self.cache.refetch(self.key.clone(), self.first_page()).await
    }

    /// Load the next page. Returns `false` when there is none.
    ///
    /// An empty, expired, failed or invalidated feed starts over at page 1.
    /// The page is fetched as the feed's in-flight fetch, so concurrent
    /// calls send one request and an invalidation while it runs is kept.
    pub async fn fetch_next_page(&self) -> Result<bool> {
        let posts = self.posts.clone();
        let request = self.request.clone();

        let step = self
            .cache
            .extend(self.key.clone(), move |current| {
                let (base, page) = match current {
                    Some(pages) => (pages.clone(), next_page(pages, request.limit)?),
                    None => (PageSet::new(), 1),
                };
                debug!(page, "Loading feed page");
                let request = ListPostsQuery { page, ..request };
                Some(move || {
                    let posts = posts.clone();
                    let request = request.clone();
                    let mut pages = base.clone();
                    async move {
                        pages.push(posts.list_with_query(&request).await?);
                        Ok(pages)
                    }
                })
            })
            .await;

        match step {
            Some(result) => result.map(|_| true),
            None => Ok(false),
        }
    }

    /// Whether another page can be loaded.
    pub fn has_next_page(&self) -> bool {
        self.cache
            .peek(&self.key)
            .is_some_and(|pages| next_page(&pages, self.request.limit).is_some())
    }

    /// Every loaded post, in page order.
    pub fn posts(&self) -> Vec<Post> {
        self.cache
            .peek(&self.key)
            .map(|pages| pages.into_iter().flat_map(|p| p.data).collect())
            .unwrap_or_default()
    }

    pub fn pages_loaded(&self) -> usize {
        self.cache.peek(&self.key).map_or(0, |pages| pages.len())
    }

    pub fn state(&self) -> EntryState {
        self.cache.state(&self.key)
    }

    fn first_page(&self) -> impl Fn() -> BoxFuture<'static, Result<PageSet>> + Send + Sync + 'static {
        let posts = self.posts.clone();
        let request = self.request.clone();
        move || {
            let posts = posts.clone();
            let request = request.clone();
            async move { posts.list_with_query(&request).await.map(|page| vec![page]) }.boxed()
        }
    }
}

/// Page number following the last loaded page.
///
/// Uses the server's pagination when present; otherwise a short page marks
/// the end.
fn next_page(pages: &PageSet, limit: u32) -> Option<u32> {
    let last = pages.last()?;
    match &last.pagination {
        Some(pagination) => pagination.next_page(),
        None if (last.data.len() as u32) < limit => None,
        None => Some(pages.len() as u32 + 1),
    }
}
