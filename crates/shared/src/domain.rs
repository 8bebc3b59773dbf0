use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(MovieId);
id_newtype!(UserId);

/// A user's verdict on a movie. The wire format uses the server's
/// single-letter tokens; clearing a verdict is expressed as `null` at the
/// request level (`Option<Opinion>`), not as a third variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opinion {
    #[serde(rename = "L")]
    Like,
    #[serde(rename = "H")]
    Hate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub user: UserSummary,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_date: Option<DateTime<Utc>>,
    pub publication_date: DateTime<Utc>,
    pub likes_counter: u32,
    pub hates_counter: u32,
}
