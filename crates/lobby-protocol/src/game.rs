//! Game catalog data: manifests, catalog records, and reviews.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version assumed when a manifest does not declare one.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Player count required to start when a manifest does not declare one.
pub const DEFAULT_MIN_PLAYERS: usize = 2;

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

fn default_min_players() -> usize {
    DEFAULT_MIN_PLAYERS
}

/// The `manifest.json` shipped at the root of every game package.
///
/// Only `game_id` and `server_entry` are required. Unknown keys are kept in
/// [`extra`](Self::extra) so they survive into the catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameManifest {
    pub game_id: String,
    /// Script or executable launched, relative to the game directory.
    pub server_entry: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_min_players")]
    pub min_players: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_players: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GameManifest {
    /// Keys a [`GameRecord`] owns. A manifest that carries them in `extra`
    /// would produce duplicate keys once flattened into a record.
    pub const RECORD_KEYS: [&'static str; 4] =
        ["file_name", "file_size", "uploader", "reviews"];

    /// Removes record-owned keys from `extra`.
    pub fn strip_record_keys(&mut self) {
        for key in Self::RECORD_KEYS {
            self.extra.remove(key);
        }
    }

    /// Returns `true` if `self` may replace an installed `current`.
    ///
    /// Versions compare as plain strings, so `"10"` sorts before `"9"`.
    pub fn supersedes(&self, current: &GameManifest) -> bool {
        self.version > current.version
    }
}

/// One player review of a game. Each user holds at most one per game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub user: String,
    /// 1 to 5.
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    /// Unix seconds of the latest write.
    pub time: u64,
}

/// A catalog entry: the manifest plus upload metadata and reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(flatten)]
    pub manifest: GameManifest,
    pub file_name: String,
    pub file_size: u64,
    /// Developer who owns the entry.
    pub uploader: String,
    #[serde(default)]
    pub reviews: Vec<Review>,
}

impl GameRecord {
    pub fn game_id(&self) -> &str {
        &self.manifest.game_id
    }

    /// Adds `review`, replacing any earlier review by the same user.
    pub fn upsert_review(&mut self, review: Review) {
        match self.reviews.iter_mut().find(|r| r.user == review.user) {
            Some(existing) => *existing = review,
            None => self.reviews.push(review),
        }
    }

    /// Mean rating, or `None` without reviews.
    pub fn average_rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let total: u32 = self.reviews.iter().map(|r| u32::from(r.rating)).sum();
        Some(f64::from(total) / self.reviews.len() as f64)
    }
}
