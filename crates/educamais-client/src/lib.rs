//! Session-aware HTTP client for the EducaMais posts API.
//!
//! One [`ApiClient`] carries the server origin, the JSON defaults and the
//! [`SessionStore`](educamais_store::SessionStore). Every request passes
//! through the middleware stages: the stored bearer token is attached on the
//! way out, and a 401 on the way back purges the stored session.
//!
//! # Example
//!
//! ```no_run
//! use educamais_client::{ApiClient, PostInput, Result, SignInRequest};
//!
//! # async fn example() -> Result<()> {
//! let client = ApiClient::builder()
//!     .base_url("http://localhost:3333")
//!     .build()?;
//!
//! // Sign in; the session is stored and used for later calls
//! let session = client
//!     .auth()
//!     .sign_in(SignInRequest::new("ana@escola.br", "secret1"))
//!     .await?;
//! println!("Hello, {}", session.user.name);
//!
//! // Browse the feed
//! let page = client.posts().list(1, 10, Some("biologia")).await?;
//! for post in &page.data {
//!     println!("{} - {}", post.id, post.title);
//! }
//!
//! // Publish (teachers only)
//! let post = client
//!     .posts()
//!     .create(&PostInput::new("Cells", "Cells are the unit of life."))
//!     .await?;
//! println!("Created post {}", post.id);
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **Auth**: sign up, sign in, sign out, stored session, role checks
//! - **Posts**: list (paged, searchable), get, create, update, delete
//! - **Context**: shared auth state with change notifications

pub mod api;
pub mod client;
pub mod context;
pub mod error;
pub mod middleware;
pub mod types;
pub mod validation;

pub use api::{AuthApi, ListPostsQuery, PostsApi};
pub use client::{ApiClient, ClientBuilder};
pub use context::{AuthContext, AuthHandle, AuthScope, AuthState};
pub use error::{Error, FieldErrors, Result};
pub use middleware::{BearerAuth, Middleware, SessionPurge, SharedMiddleware};
pub use types::*;
pub use validation::Validate;
