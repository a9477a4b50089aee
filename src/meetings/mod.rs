//! Meeting descriptions supplied by the calendar collaborator.
//!
//! The capture path consumes only `url` and `title`. Merging and
//! deduplication of imported meetings (by `id`) is the collaborator's
//! responsibility, not this crate's.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub platform: String,
    pub time: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub duration_minutes: u32,
    pub url: String,
    #[serde(default)]
    pub attendees: Vec<String>,
}
