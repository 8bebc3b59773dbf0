use super::*;
use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use shared::domain::{UserId, UserSummary};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct Recorded {
    list_queries: Arc<Mutex<Vec<String>>>,
    csrf_headers: Arc<Mutex<Vec<Option<String>>>>,
    writes: Arc<Mutex<Vec<String>>>,
}

fn sample_movie(id: i64, title: &str, published: &str) -> Movie {
    Movie {
        id: MovieId(id),
        user: UserSummary {
            id: UserId(1),
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "A".to_string(),
        },
        title: title.to_string(),
        description: None,
        air_date: None,
        publication_date: published.parse().expect("timestamp"),
        likes_counter: 0,
        hates_counter: 0,
    }
}

async fn handle_list(
    State(recorded): State<Recorded>,
    RawQuery(query): RawQuery,
) -> Json<MovieListResponse> {
    recorded
        .list_queries
        .lock()
        .await
        .push(query.unwrap_or_default());
    Json(MovieListResponse {
        count: Some(1),
        next: None,
        previous: None,
        results: vec![sample_movie(1, "Arrival", "2024-03-01T12:00:00Z")],
    })
}

async fn handle_opinion(
    State(recorded): State<Recorded>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<OpinionRequest>,
) -> axum::response::Response {
    let token = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    recorded.csrf_headers.lock().await.push(token.clone());
    recorded
        .writes
        .lock()
        .await
        .push(format!("POST opinion {id}"));

    if token.as_deref() != Some("token-123") {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "detail": "CSRF token missing or incorrect" })),
        )
            .into_response();
    }
    if id == 9 {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "Movie with pk `9` does not exist",
                "status_code": 400
            })),
        )
            .into_response();
    }

    let mut updated = sample_movie(id, "Arrival", "2024-03-01T12:00:00Z");
    match body.opinion {
        Some(Opinion::Like) => updated.likes_counter = 3,
        Some(Opinion::Hate) => updated.hates_counter = 3,
        None => {}
    }
    Json(updated).into_response()
}

async fn handle_create(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(fields): Json<NewMovie>,
) -> axum::response::Response {
    recorded.writes.lock().await.push("POST create".to_string());
    if headers.get(CSRF_HEADER).is_none() {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "detail": "CSRF token missing or incorrect" })),
        )
            .into_response();
    }

    let mut created = sample_movie(42, &fields.title, "2024-05-01T00:00:00Z");
    created.description = fields.description;
    created.air_date = fields.air_date;
    Json(created).into_response()
}

async fn spawn_api_server() -> Result<(String, Recorded)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/api/movies/", get(handle_list).post(handle_create))
        .route("/api/movies/:id/opinion/", post(handle_opinion))
        .with_state(recorded.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), recorded))
}

#[tokio::test]
async fn listing_appends_ordering_as_a_single_query_parameter() {
    let (server_url, recorded) = spawn_api_server().await.expect("spawn server");
    let api = MovieApi::new(server_url, Arc::new(MissingCredentialProvider));

    let page = api
        .list_movies(Some("-publication_date"))
        .await
        .expect("list");
    assert_eq!(page.results.len(), 1);

    let queries = recorded.list_queries.lock().await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0], "ordering=-publication_date");
}

#[tokio::test]
async fn unfiltered_listing_sends_no_query_string() {
    let (server_url, recorded) = spawn_api_server().await.expect("spawn server");
    let api = MovieApi::new(server_url, Arc::new(MissingCredentialProvider));

    api.list_movies(None).await.expect("list");

    let queries = recorded.list_queries.lock().await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0], "");
}

#[tokio::test]
async fn user_listing_joins_search_and_ordering_with_one_ampersand() {
    let (server_url, recorded) = spawn_api_server().await.expect("spawn server");
    let api = MovieApi::new(server_url, Arc::new(MissingCredentialProvider));

    api.list_movies_for_user(Some("alice"), Some("title"))
        .await
        .expect("list");

    let queries = recorded.list_queries.lock().await;
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0], "ordering=title&search=alice");
    assert_eq!(queries[0].matches('&').count(), 1);
}

#[tokio::test]
async fn user_listing_with_a_single_filter_emits_no_separator() {
    let (server_url, recorded) = spawn_api_server().await.expect("spawn server");
    let api = MovieApi::new(server_url, Arc::new(MissingCredentialProvider));

    api.list_movies_for_user(Some("alice"), None)
        .await
        .expect("list");
    api.list_movies_for_user(None, Some("title"))
        .await
        .expect("list");

    let queries = recorded.list_queries.lock().await;
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0], "search=alice");
    assert_eq!(queries[1], "ordering=title");
}

#[tokio::test]
async fn set_opinion_attaches_the_csrf_token_from_the_provider() {
    let (server_url, recorded) = spawn_api_server().await.expect("spawn server");
    let api = MovieApi::new(
        server_url,
        Arc::new(StaticCredentialProvider("token-123".to_string())),
    );

    let updated = api
        .set_opinion(MovieId(1), Some(Opinion::Like))
        .await
        .expect("rate");
    assert_eq!(updated.likes_counter, 3);

    let headers = recorded.csrf_headers.lock().await;
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].as_deref(), Some("token-123"));
}

#[tokio::test]
async fn set_opinion_surfaces_the_server_error_payload() {
    let (server_url, _recorded) = spawn_api_server().await.expect("spawn server");
    let api = MovieApi::new(
        server_url,
        Arc::new(StaticCredentialProvider("token-123".to_string())),
    );

    let err = api
        .set_opinion(MovieId(9), Some(Opinion::Hate))
        .await
        .expect_err("must fail");
    let text = err.to_string();
    assert!(
        text.contains("Movie with pk `9` does not exist"),
        "unexpected error: {text}"
    );

    let exception = err.downcast_ref::<ApiException>().expect("typed rejection");
    assert_eq!(exception.status, 400);
}

#[tokio::test]
async fn mutating_calls_fail_without_credentials_before_sending() {
    let (server_url, recorded) = spawn_api_server().await.expect("spawn server");
    let api = MovieApi::new(server_url, Arc::new(MissingCredentialProvider));

    let err = api
        .create_movie(&NewMovie {
            title: "Dune".to_string(),
            description: None,
            air_date: None,
        })
        .await
        .expect_err("must fail");
    assert!(
        err.to_string().contains("csrf token"),
        "unexpected error: {err}"
    );
    assert!(recorded.writes.lock().await.is_empty());
}

#[tokio::test]
async fn create_movie_round_trips_the_submitted_fields() {
    let (server_url, _recorded) = spawn_api_server().await.expect("spawn server");
    let api = MovieApi::new(
        server_url,
        Arc::new(StaticCredentialProvider("token-123".to_string())),
    );

    let created = api
        .create_movie(&NewMovie {
            title: "Dune".to_string(),
            description: Some("sand".to_string()),
            air_date: None,
        })
        .await
        .expect("create");
    assert_eq!(created.id, MovieId(42));
    assert_eq!(created.title, "Dune");
    assert_eq!(created.description.as_deref(), Some("sand"));
}

#[tokio::test]
async fn cookie_credential_provider_extracts_the_csrftoken_cookie() {
    let provider = CookieCredentialProvider::new("sessionid=abc; csrftoken=tok-1; theme=dark");
    assert_eq!(provider.csrf_token().await.expect("token"), "tok-1");

    let missing = CookieCredentialProvider::new("sessionid=abc");
    assert!(missing.csrf_token().await.is_err());
}
