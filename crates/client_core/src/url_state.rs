//! Address-bar synchronization. The view projects its ordering and scope
//! username into the URL query string so the state survives reload/share;
//! the URL is read back exactly once, when the view mounts.

use std::sync::Mutex;

use url::Url;

pub const ORDERING_PARAM: &str = "ordering";
pub const SEARCH_PARAM: &str = "search";

/// Ordering key used when the URL names none: publication date descending.
pub const DEFAULT_ORDERING: &str = "-publication_date";

/// The host's address bar. `push` replaces the visible URL without a
/// navigation, the way `history.pushState` does in a browser host.
pub trait UrlBar: Send + Sync {
    fn current(&self) -> Url;
    fn push(&self, url: Url);
}

#[derive(Debug)]
pub struct InMemoryUrlBar {
    current: Mutex<Url>,
}

impl InMemoryUrlBar {
    pub fn new(url: Url) -> Self {
        Self {
            current: Mutex::new(url),
        }
    }
}

impl UrlBar for InMemoryUrlBar {
    fn current(&self) -> Url {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, url: Url) {
        match self.current.lock() {
            Ok(mut guard) => *guard = url,
            Err(poisoned) => *poisoned.into_inner() = url,
        }
    }
}

/// View parameters recognized in the query string; anything else belongs to
/// the host and is left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewParams {
    pub ordering: Option<String>,
    pub search: Option<String>,
}

pub fn read_view_params(url: &Url) -> ViewParams {
    let mut params = ViewParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            ORDERING_PARAM => params.ordering = Some(value.into_owned()),
            SEARCH_PARAM => params.search = Some(value.into_owned()),
            _ => {}
        }
    }
    params
}

/// Rewrites a single query parameter, preserving every unrelated pair in
/// order. `None` removes the parameter; an emptied query string is dropped
/// entirely rather than left as a dangling `?`.
pub fn with_view_param(url: &Url, key: &str, value: Option<&str>) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(existing, _)| existing != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut next = url.clone();
    {
        let mut pairs = next.query_pairs_mut();
        pairs.clear();
        for (k, v) in &retained {
            pairs.append_pair(k, v);
        }
        if let Some(value) = value {
            pairs.append_pair(key, value);
        }
    }
    if next.query() == Some("") {
        next.set_query(None);
    }
    next
}

#[cfg(test)]
#[path = "tests/url_state_tests.rs"]
mod tests;
