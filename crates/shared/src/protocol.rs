use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Movie, Opinion};

/// Listing envelope for the movie collection. `next`/`previous` are page
/// links the server includes; this client consumes `results` wholesale and
/// never follows them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieListResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    pub results: Vec<Movie>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovie {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_date: Option<DateTime<Utc>>,
}

/// Body of the opinion sub-resource request. `opinion: null` clears a
/// previously recorded verdict, so the field must serialize even when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpinionRequest {
    pub opinion: Option<Opinion>,
}
