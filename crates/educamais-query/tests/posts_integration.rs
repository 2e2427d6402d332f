//! Post query integration tests against a mock EducaMais server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use educamais_client::{ApiClient, PostInput};
use educamais_query::{EntryState, PostKey, PostQueries, QueryConfig};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn post_json(id: u64) -> Value {
    json!({
        "id": id,
        "titulo": format!("Post {}", id),
        "conteudo": "Some body text",
        "autorId": "u1",
        "createdAt": "2024-03-01T10:00:00.000Z",
        "atualizacao": "2024-03-01T10:00:00.000Z"
    })
}

fn page_json(first: u64, count: u64, pagination: Option<(u32, u32, u64)>) -> Value {
    let data: Vec<Value> = (first..first + count).map(post_json).collect();
    let mut body = json!({"success": true, "data": data});
    if let Some((page, limit, total)) = pagination {
        body["pagination"] = json!({
            "page": page,
            "limit": limit,
            "total": total,
            "pages": total.div_ceil(limit as u64)
        });
    }
    body
}

async fn setup() -> Result<(MockServer, PostQueries)> {
    let server = MockServer::start().await;
    let client = ApiClient::builder().base_url(server.uri()).build()?;
    let config = QueryConfig::new()
        .with_stale_time(Duration::from_secs(60))
        .with_retry_delay(Duration::from_millis(1));
    Ok((server, PostQueries::new(&client, config)))
}

fn post_titled(id: u64, title: &str) -> Value {
    let mut post = post_json(id);
    post["titulo"] = json!(title);
    post
}

/// Responds with each template in turn, repeating the last one.
struct Sequence {
    responses: Vec<ResponseTemplate>,
    calls: AtomicUsize,
}

impl Sequence {
    fn new(responses: Vec<ResponseTemplate>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses[n.min(self.responses.len() - 1)].clone()
    }
}

#[tokio::test]
async fn test_concurrent_list_reads_make_one_request() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json(1, 3, Some((1, 10, 3))))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (a, b) = tokio::join!(queries.list(1, 10, None), queries.list(1, 10, None));
    assert_eq!(a?, b?);

    // Fresh value, no further request.
    let again = queries.list(1, 10, None).await?;
    assert_eq!(again.data.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_create_invalidates_lists_before_returning() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1, 2, Some((1, 10, 2)))))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"success": true, "data": post_json(3)})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let key = PostKey::list(1, 10, None);
    queries.list(1, 10, None).await?;
    assert_eq!(queries.state(&key), EntryState::Fresh);

    queries
        .create(&PostInput::new("Post 3", "Some body text"))
        .await?;
    assert_eq!(queries.state(&key), EntryState::Stale);

    // The next read refetches.
    queries.list(1, 10, None).await?;
    assert_eq!(queries.state(&key), EntryState::Fresh);

    Ok(())
}

#[tokio::test]
async fn test_update_invalidates_lists_and_detail() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1, 2, None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts/2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": post_json(2)})),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/posts/2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": post_json(2)})),
        )
        .expect(1)
        .mount(&server)
        .await;

    queries.list(1, 10, None).await?;
    queries.detail(2).await?;
    queries.infinite(None).load().await?;

    queries
        .update(2, &PostInput::new("Post 2", "Some body text"))
        .await?;

    assert_eq!(queries.state(&PostKey::list(1, 10, None)), EntryState::Stale);
    assert_eq!(queries.state(&PostKey::infinite(None)), EntryState::Stale);
    assert_eq!(queries.state(&PostKey::Detail(2)), EntryState::Stale);

    Ok(())
}

#[tokio::test]
async fn test_remove_invalidates_lists_and_drops_detail() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1, 2, None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": post_json(1)})),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/posts/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    queries.list(1, 10, None).await?;
    queries.detail(1).await?;

    queries.remove(1).await?;
    assert_eq!(queries.state(&PostKey::list(1, 10, None)), EntryState::Stale);
    assert_eq!(queries.state(&PostKey::Detail(1)), EntryState::Empty);

    Ok(())
}

#[tokio::test]
async fn test_updated_fields_reflected_on_next_detail() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts/2"))
        .respond_with(Sequence::new(vec![
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": post_titled(2, "Old title")})),
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": post_titled(2, "New title")})),
        ]))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/posts/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": post_titled(2, "New title")})),
        )
        .mount(&server)
        .await;

    assert_eq!(queries.detail(2).await?.title, "Old title");
    queries
        .update(2, &PostInput::new("New title", "Some body text"))
        .await?;

    assert_eq!(queries.detail(2).await?.title, "New title");
    assert_eq!(queries.state(&PostKey::Detail(2)), EntryState::Fresh);

    Ok(())
}

#[tokio::test]
async fn test_removed_post_absent_from_next_list() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(Sequence::new(vec![
            ResponseTemplate::new(200).set_body_json(page_json(1, 5, Some((1, 10, 5)))),
            ResponseTemplate::new(200).set_body_json(page_json(1, 4, Some((1, 10, 4)))),
        ]))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/posts/5"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let before = queries.list(1, 10, None).await?;
    assert!(before.data.iter().any(|p| p.id == 5));

    queries.remove(5).await?;

    let after = queries.list(1, 10, None).await?;
    assert!(after.data.iter().all(|p| p.id != 5));
    assert_eq!(after.data.len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_failed_mutation_leaves_cache_untouched() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1, 2, None)))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/posts/1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "Forbidden"})))
        .mount(&server)
        .await;

    queries.list(1, 10, None).await?;
    assert!(queries.remove(1).await.is_err());
    assert_eq!(queries.state(&PostKey::list(1, 10, None)), EntryState::Fresh);

    Ok(())
}

#[tokio::test]
async fn test_feed_chains_pages_until_last() -> Result<()> {
    let (server, queries) = setup().await?;

    for (page, first, count) in [(1u32, 1u64, 10u64), (2, 11, 10), (3, 21, 5)] {
        Mock::given(method("GET"))
            .and(path("/api/posts"))
            .and(query_param("page", page.to_string()))
            .and(query_param("limit", "10"))
            .and(query_param("q", "bio"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(page_json(first, count, Some((page, 10, 25)))),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let feed = queries.infinite(Some("bio"));
    assert!(!feed.has_next_page());

    feed.load().await?;
    assert!(feed.has_next_page());

    let mut loads = 0;
    while feed.fetch_next_page().await? {
        loads += 1;
    }
    assert_eq!(loads, 2);
    assert_eq!(feed.pages_loaded(), 3);
    assert!(!feed.has_next_page());

    let posts = feed.posts();
    assert_eq!(posts.len(), 25);
    assert_eq!(posts.first().map(|p| p.id), Some(1));
    assert_eq!(posts.last().map(|p| p.id), Some(25));

    Ok(())
}

#[tokio::test]
async fn test_feed_without_pagination_stops_on_short_page() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1, 10, None)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(11, 4, None)))
        .mount(&server)
        .await;

    let feed = queries.infinite(None);
    assert!(feed.fetch_next_page().await?);
    assert!(feed.has_next_page());
    assert!(feed.fetch_next_page().await?);
    assert!(!feed.has_next_page());
    assert!(!feed.fetch_next_page().await?);
    assert_eq!(feed.posts().len(), 14);

    Ok(())
}

#[tokio::test]
async fn test_invalidated_feed_restarts_from_first_page() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1, 10, Some((1, 10, 20)))))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(11, 10, Some((2, 10, 20)))))
        .expect(1)
        .mount(&server)
        .await;

    let feed = queries.infinite(None);
    feed.load().await?;
    feed.fetch_next_page().await?;
    assert_eq!(feed.pages_loaded(), 2);

    queries.invalidate_lists();
    assert!(feed.fetch_next_page().await?);
    assert_eq!(feed.pages_loaded(), 1);
    assert_eq!(feed.state(), EntryState::Fresh);

    Ok(())
}

#[tokio::test]
async fn test_invalidation_while_next_page_loads_is_kept() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1, 10, Some((1, 10, 20)))))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json(11, 10, Some((2, 10, 20))))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let feed = queries.infinite(None);
    feed.load().await?;

    let (loaded, _) = tokio::join!(feed.fetch_next_page(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        queries.invalidate_lists();
    });
    assert!(loaded?);
    assert_eq!(feed.state(), EntryState::Stale);

    // The next step starts over instead of building on the old pages.
    assert!(feed.fetch_next_page().await?);
    assert_eq!(feed.pages_loaded(), 1);
    assert_eq!(feed.state(), EntryState::Fresh);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_next_page_calls_make_one_request() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1, 10, Some((1, 10, 30)))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json(11, 10, Some((2, 10, 30))))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let feed = queries.infinite(None);
    feed.load().await?;

    let (a, b) = tokio::join!(feed.fetch_next_page(), feed.fetch_next_page());
    assert!(a? && b?);
    assert_eq!(feed.pages_loaded(), 2);

    Ok(())
}

#[tokio::test]
async fn test_next_page_server_error_is_retried() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1, 10, Some((1, 10, 20)))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/posts"))
        .and(query_param("page", "2"))
        .respond_with(Sequence::new(vec![
            ResponseTemplate::new(503),
            ResponseTemplate::new(200).set_body_json(page_json(11, 10, Some((2, 10, 20)))),
        ]))
        .expect(2)
        .mount(&server)
        .await;

    let feed = queries.infinite(None);
    feed.load().await?;
    assert!(feed.fetch_next_page().await?);
    assert_eq!(feed.pages_loaded(), 2);
    assert!(!feed.has_next_page());

    Ok(())
}

#[tokio::test]
async fn test_server_errors_are_retried() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts/5"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = queries.detail(5).await.unwrap_err();
    assert_eq!(err.status_code(), Some(503));
    assert_eq!(queries.state(&PostKey::Detail(5)), EntryState::Error);

    Ok(())
}

#[tokio::test]
async fn test_not_found_is_not_retried() -> Result<()> {
    let (server, queries) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/posts/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Post not found"})))
        .expect(1)
        .mount(&server)
        .await;

    let err = queries.detail(404).await.unwrap_err();
    assert!(err.is_not_found());

    Ok(())
}
