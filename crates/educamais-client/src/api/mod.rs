//! API endpoint implementations.

mod auth;
mod posts;

pub use auth::AuthApi;
pub use posts::{ListPostsQuery, PostsApi};
