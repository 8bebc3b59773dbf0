use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use shared::{
    domain::{Movie, MovieId, Opinion},
    error::{ApiError, ApiException},
    protocol::{MovieListResponse, NewMovie, OpinionRequest},
};

pub mod url_state;
pub mod view;

pub use view::{MovieBoard, ViewEvent, ViewState};

const MOVIES_RESOURCE: &str = "/api/movies/";

/// Header carrying the anti-forgery token on mutating requests.
pub const CSRF_HEADER: &str = "X-CSRFToken";
/// Cookie the server hands the token out under.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Source of the anti-forgery token. Reading it is a host concern (in a
/// browser it lives in a same-site cookie), so the API client only depends
/// on this seam.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn csrf_token(&self) -> Result<String>;
}

pub struct MissingCredentialProvider;

#[async_trait]
impl CredentialProvider for MissingCredentialProvider {
    async fn csrf_token(&self) -> Result<String> {
        Err(anyhow!(
            "no credential provider configured; mutating requests require a csrf token"
        ))
    }
}

pub struct StaticCredentialProvider(pub String);

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn csrf_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Resolves the token out of a `Cookie`-header style string.
pub struct CookieCredentialProvider {
    cookies: String,
}

impl CookieCredentialProvider {
    pub fn new(cookies: impl Into<String>) -> Self {
        Self {
            cookies: cookies.into(),
        }
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.cookies
            .split(';')
            .filter_map(|pair| {
                let (key, value) = pair.trim().split_once('=')?;
                (key == name).then(|| value.to_string())
            })
            .next()
    }
}

#[async_trait]
impl CredentialProvider for CookieCredentialProvider {
    async fn csrf_token(&self) -> Result<String> {
        self.lookup(CSRF_COOKIE).ok_or_else(|| {
            anyhow!("cookie `{CSRF_COOKIE}` is not set; cannot authorize mutating requests")
        })
    }
}

#[derive(Serialize)]
struct ListMoviesQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    ordering: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
}

/// Typed access to the movie collection resource. Stateless beyond the
/// connection pool; every call maps to exactly one HTTP request and any
/// transport failure or non-2xx status propagates to the caller.
pub struct MovieApi {
    http: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl MovieApi {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            credentials,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}{MOVIES_RESOURCE}", self.base_url)
    }

    fn opinion_url(&self, movie_id: MovieId) -> String {
        format!("{}{}/opinion/", self.collection_url(), movie_id.0)
    }

    pub async fn list_movies(&self, ordering: Option<&str>) -> Result<MovieListResponse> {
        let page: MovieListResponse = self
            .http
            .get(self.collection_url())
            .query(&ListMoviesQuery {
                ordering,
                search: None,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page)
    }

    pub async fn list_movies_for_user(
        &self,
        username: Option<&str>,
        ordering: Option<&str>,
    ) -> Result<MovieListResponse> {
        let page: MovieListResponse = self
            .http
            .get(self.collection_url())
            .query(&ListMoviesQuery {
                ordering,
                search: username,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page)
    }

    /// Records (or clears, with `None`) the user's verdict on one movie and
    /// returns the updated movie; the server owns the derived counters.
    pub async fn set_opinion(&self, movie_id: MovieId, opinion: Option<Opinion>) -> Result<Movie> {
        let token = self.credentials.csrf_token().await?;
        let response = self
            .http
            .post(self.opinion_url(movie_id))
            .header(CSRF_HEADER, token)
            .json(&OpinionRequest { opinion })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let message = match response.json::<ApiError>().await {
                Ok(payload) => payload.message().to_string(),
                Err(_) => format!("request rejected with status {status}"),
            };
            return Err(ApiException::new(status.as_u16(), message).into());
        }

        let movie: Movie = response.error_for_status()?.json().await?;
        Ok(movie)
    }

    pub async fn create_movie(&self, fields: &NewMovie) -> Result<Movie> {
        let token = self.credentials.csrf_token().await?;
        let movie: Movie = self
            .http
            .post(self.collection_url())
            .header(CSRF_HEADER, token)
            .json(fields)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(movie)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
