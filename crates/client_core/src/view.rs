//! View controller: mediates between user intent, the movie API, and the
//! presented/URL state. Rendering is the host's job; it observes state
//! snapshots and the event channel.

use std::sync::Arc;

use anyhow::Result;
use shared::{
    domain::{Movie, MovieId, Opinion},
    protocol::NewMovie,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    url_state::{self, UrlBar, DEFAULT_ORDERING, ORDERING_PARAM, SEARCH_PARAM},
    MovieApi,
};

#[derive(Debug, Clone)]
pub struct ViewState {
    pub movies: Vec<Movie>,
    pub ordering: String,
    pub scope_username: Option<String>,
    pub create_form_visible: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            movies: Vec::new(),
            ordering: DEFAULT_ORDERING.to_string(),
            scope_username: None,
            create_form_visible: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ViewEvent {
    MoviesLoaded { count: usize },
    OpinionRecorded { movie_id: MovieId },
    MovieCreated { movie_id: MovieId },
    Error(ViewError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewErrorCategory {
    Transport,
    Api,
    Validation,
    Logic,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewErrorContext {
    Mount,
    Refresh,
    FilterByUser,
    SubmitOpinion,
    CreateMovie,
}

#[derive(Debug, Clone)]
pub struct ViewError {
    category: ViewErrorCategory,
    context: ViewErrorContext,
    message: String,
}

impl ViewError {
    pub fn from_message(context: ViewErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("http status") || lower.contains("api rejected") {
            ViewErrorCategory::Api
        } else if lower.contains("csrf") || lower.contains("credential") {
            ViewErrorCategory::Validation
        } else if lower.contains("connect")
            || lower.contains("timed out")
            || lower.contains("dns")
            || lower.contains("network")
            || lower.contains("error sending request")
        {
            ViewErrorCategory::Transport
        } else {
            ViewErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    fn logic(context: ViewErrorContext, message: impl Into<String>) -> Self {
        Self {
            category: ViewErrorCategory::Logic,
            context,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ViewErrorCategory {
        self.category
    }

    pub fn context(&self) -> ViewErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

struct BoardState {
    view: ViewState,
    /// Sequence tag of the newest issued listing fetch. A completion whose
    /// tag is older is discarded, so a slow stale response can never
    /// overwrite the result of a later request.
    fetch_seq: u64,
}

/// Owns the single `ViewState` and the URL projection of it. All mutation
/// happens in request-completion handlers behind one lock.
pub struct MovieBoard {
    api: MovieApi,
    url_bar: Arc<dyn UrlBar>,
    inner: Mutex<BoardState>,
    events: broadcast::Sender<ViewEvent>,
}

impl MovieBoard {
    pub fn new(api: MovieApi, url_bar: Arc<dyn UrlBar>) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            api,
            url_bar,
            inner: Mutex::new(BoardState {
                view: ViewState::default(),
                fetch_seq: 0,
            }),
            events,
        })
    }

    /// Application start: derives the initial ordering and scope username
    /// from the address bar, then performs the first fetch. The host calls
    /// this exactly once.
    pub async fn mount(api: MovieApi, url_bar: Arc<dyn UrlBar>) -> Result<Arc<Self>> {
        let board = Self::new(api, url_bar);
        board.initialize().await?;
        Ok(board)
    }

    pub async fn initialize(&self) -> Result<()> {
        let params = url_state::read_view_params(&self.url_bar.current());
        let ordering = params
            .ordering
            .unwrap_or_else(|| DEFAULT_ORDERING.to_string());
        {
            let mut guard = self.inner.lock().await;
            guard.view.scope_username = params.search.filter(|username| !username.is_empty());
        }
        info!(ordering, "mounting movie view");
        self.refresh(&ordering).await
    }

    /// Re-fetches the listing under `ordering`, scoped to the current
    /// username filter if one is set. On success the movie list is replaced
    /// wholesale and the URL's `ordering` parameter is updated.
    pub async fn refresh(&self, ordering: &str) -> Result<()> {
        let (seq, scope) = {
            let mut guard = self.inner.lock().await;
            guard.fetch_seq += 1;
            (guard.fetch_seq, guard.view.scope_username.clone())
        };

        let fetched = match &scope {
            Some(username) => {
                self.api
                    .list_movies_for_user(Some(username), Some(ordering))
                    .await
            }
            None => self.api.list_movies(Some(ordering)).await,
        };
        let page = match fetched {
            Ok(page) => page,
            Err(err) => return Err(self.surface(ViewErrorContext::Refresh, err)),
        };

        let count = {
            let mut guard = self.inner.lock().await;
            if guard.fetch_seq != seq {
                debug!(ordering, "discarding stale movie listing response");
                return Ok(());
            }
            guard.view.movies = page.results;
            guard.view.ordering = ordering.to_string();
            guard.view.movies.len()
        };

        self.push_url_param(ORDERING_PARAM, Some(ordering));
        let _ = self.events.send(ViewEvent::MoviesLoaded { count });
        Ok(())
    }

    /// Restricts the listing to movies associated with `username`, without
    /// overriding the server's ordering. An empty username clears the scope.
    pub async fn filter_by_user(&self, username: &str) -> Result<()> {
        let scope = Some(username.trim())
            .filter(|username| !username.is_empty())
            .map(str::to_string);

        let seq = {
            let mut guard = self.inner.lock().await;
            guard.fetch_seq += 1;
            guard.fetch_seq
        };

        let fetched = self
            .api
            .list_movies_for_user(scope.as_deref(), None)
            .await;
        let page = match fetched {
            Ok(page) => page,
            Err(err) => return Err(self.surface(ViewErrorContext::FilterByUser, err)),
        };

        let count = {
            let mut guard = self.inner.lock().await;
            if guard.fetch_seq != seq {
                debug!(username, "discarding stale scoped listing response");
                return Ok(());
            }
            guard.view.movies = page.results;
            guard.view.scope_username = scope.clone();
            guard.view.movies.len()
        };

        self.push_url_param(SEARCH_PARAM, scope.as_deref());
        let _ = self.events.send(ViewEvent::MoviesLoaded { count });
        Ok(())
    }

    /// Records the user's verdict on a listed movie and patches that entry
    /// in place; the rest of the sequence keeps its length and order. An id
    /// missing from the current listing is a logic fault and a no-op.
    pub async fn submit_opinion(&self, movie_id: MovieId, opinion: Option<Opinion>) -> Result<()> {
        let listed = {
            let guard = self.inner.lock().await;
            guard.view.movies.iter().any(|movie| movie.id == movie_id)
        };
        if !listed {
            warn!(
                movie_id = movie_id.0,
                "opinion submitted for a movie missing from the current listing; ignoring"
            );
            let _ = self.events.send(ViewEvent::Error(ViewError::logic(
                ViewErrorContext::SubmitOpinion,
                format!("movie {} is not in the current listing", movie_id.0),
            )));
            return Ok(());
        }

        let updated = match self.api.set_opinion(movie_id, opinion).await {
            Ok(movie) => movie,
            Err(err) => return Err(self.surface(ViewErrorContext::SubmitOpinion, err)),
        };

        let applied = {
            let mut guard = self.inner.lock().await;
            match guard.view.movies.iter_mut().find(|movie| movie.id == movie_id) {
                Some(slot) => {
                    *slot = updated;
                    true
                }
                None => {
                    // The listing was replaced while the request was in flight.
                    warn!(
                        movie_id = movie_id.0,
                        "rated movie no longer listed; dropping the update"
                    );
                    false
                }
            }
        };

        if applied {
            let _ = self.events.send(ViewEvent::OpinionRecorded { movie_id });
        }
        Ok(())
    }

    /// Creates a movie, then re-fetches under the current ordering so the
    /// new entry appears in its correct sorted position.
    pub async fn submit_new_movie(&self, fields: &NewMovie) -> Result<()> {
        let created = match self.api.create_movie(fields).await {
            Ok(movie) => movie,
            Err(err) => return Err(self.surface(ViewErrorContext::CreateMovie, err)),
        };
        info!(movie_id = created.id.0, title = %created.title, "movie created");
        let _ = self.events.send(ViewEvent::MovieCreated {
            movie_id: created.id,
        });

        let ordering = {
            let mut guard = self.inner.lock().await;
            guard.view.create_form_visible = false;
            guard.view.ordering.clone()
        };
        self.refresh(&ordering).await
    }

    /// Local flip of the create-form flag; never touches the network.
    pub async fn toggle_create_form(&self) -> bool {
        let mut guard = self.inner.lock().await;
        guard.view.create_form_visible = !guard.view.create_form_visible;
        guard.view.create_form_visible
    }

    pub async fn state(&self) -> ViewState {
        self.inner.lock().await.view.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    fn push_url_param(&self, key: &str, value: Option<&str>) {
        let current = self.url_bar.current();
        let next = url_state::with_view_param(&current, key, value);
        if next != current {
            self.url_bar.push(next);
        }
    }

    fn surface(&self, context: ViewErrorContext, err: anyhow::Error) -> anyhow::Error {
        let view_err = ViewError::from_message(context, err.to_string());
        warn!(context = ?view_err.context(), category = ?view_err.category(), "{}", view_err.message());
        let _ = self.events.send(ViewEvent::Error(view_err));
        err
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
