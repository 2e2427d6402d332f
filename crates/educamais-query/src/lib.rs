//! Query cache for the EducaMais client.
//!
//! [`QueryCache`] is a generic key-addressed cache of async fetch results:
//!
//! - concurrent reads of one key share a single in-flight fetch
//! - fresh values are served without refetching; stale values are served
//!   while a background refetch runs
//! - retryable failures are retried with exponential backoff
//! - invalidation marks keys stale without refetching
//! - the number of keys is bounded with LRU eviction
//!
//! [`PostQueries`] binds the cache to the posts API, including the chained
//! [`InfinitePosts`] feed and the mutations that invalidate list keys.
//!
//! # Example
//!
//! ```no_run
//! use educamais_client::ApiClient;
//! use educamais_query::{PostQueries, QueryConfig};
//!
//! # async fn example() -> educamais_client::Result<()> {
//! let client = ApiClient::builder().base_url("http://localhost:3333").build()?;
//! let queries = PostQueries::new(&client, QueryConfig::default());
//!
//! let feed = queries.infinite(None);
//! feed.load().await?;
//! while feed.has_next_page() {
//!     feed.fetch_next_page().await?;
//! }
//! println!("{} posts", feed.posts().len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod entry;
pub mod posts;
pub mod retry;

pub use cache::{CacheStats, QueryCache};
pub use config::QueryConfig;
pub use entry::EntryState;
pub use posts::{FEED_PAGE_SIZE, InfinitePosts, PageSet, PostKey, PostQueries};
pub use retry::Retryable;
