//! Posts API.

use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::error::Result;
use crate::types::{Envelope, Paginated, Post, PostInput};
use crate::validation::Validate;

/// Query parameters for listing posts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ListPostsQuery {
    pub page: u32,
    pub limit: u32,
    /// Free-text search.
    #[serde(rename = "q", skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl ListPostsQuery {
    /// Build a query; blank search text is dropped.
    pub fn new(page: u32, limit: u32, query: Option<&str>) -> Self {
        Self {
            page,
            limit,
            query: query
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
        }
    }
}

/// Posts API client.
#[derive(Debug, Clone)]
pub struct PostsApi {
    client: ApiClient,
}

impl PostsApi {
    pub(crate) fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// List one page of posts, optionally filtered by `query`.
    pub async fn list(&self, page: u32, limit: u32, query: Option<&str>) -> Result<Paginated<Post>> {
        self.list_with_query(&ListPostsQuery::new(page, limit, query))
            .await
    }

    /// List posts with explicit query parameters.
    pub async fn list_with_query(&self, query: &ListPostsQuery) -> Result<Paginated<Post>> {
        debug!(page = query.page, limit = query.limit, q = ?query.query, "Listing posts");
        self.client
            .get_with_query("posts", query)
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to list posts"))
    }

    /// Get a post by ID.
    pub async fn get(&self, id: u64) -> Result<Post> {
        debug!(id, "Fetching post");
        let response: Envelope<Post> = self
            .client
            .get(&format!("posts/{}", id))
            .await
            .inspect_err(|e| warn!(id, error = %e, "Failed to fetch post"))?;
        Ok(response.data)
    }

    /// Create a new post.
    pub async fn create(&self, input: &PostInput) -> Result<Post> {
        input.validate()?;
        debug!(title = %input.title, "Creating post");
        let response: Envelope<Post> = self
            .client
            .post("posts", input)
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to create post"))?;
        Ok(response.data)
    }

    /// Replace a post's content.
    pub async fn update(&self, id: u64, input: &PostInput) -> Result<Post> {
        input.validate()?;
        debug!(id, "Updating post");
        let response: Envelope<Post> = self
            .client
            .put(&format!("posts/{}", id), input)
            .await
            .inspect_err(|e| warn!(id, error = %e, "Failed to update post"))?;
        Ok(response.data)
    }

    /// Delete a post.
    pub async fn remove(&self, id: u64) -> Result<()> {
        debug!(id, "Deleting post");
        self.client
            .delete(&format!("posts/{}", id))
            .await
            .inspect_err(|e| warn!(id, error = %e, "Failed to delete post"))
    }
}
