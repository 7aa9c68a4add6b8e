//! Catalog domain types
//!
//! Artists are identified by their MusicBrainz row id (`artist.id`). The MBID
//! (`artist.gid`) is carried alongside as the stable external identifier.

use serde::{Deserialize, Serialize};

/// Catalog artist row id
pub type ArtistId = i32;

/// Display information for an artist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistName {
    pub name: String,
    /// MusicBrainz identifier, if the catalog has one
    pub mbid: Option<String>,
}

impl ArtistName {
    pub fn new(name: impl Into<String>, mbid: Option<String>) -> Self {
        Self {
            name: name.into(),
            mbid,
        }
    }
}

/// Ranked artist search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistMatch {
    pub id: ArtistId,
    pub name: String,
    pub mbid: Option<String>,
    /// Number of distinct recordings credited to the artist (popularity proxy)
    pub release_count: i64,
}

/// One filtered co-occurrence record: a recording and its credited artists
///
/// `artists` is in credit order and may contain repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaborationRecord {
    pub work_id: i64,
    pub work_title: String,
    pub artists: Vec<ArtistId>,
}

impl CollaborationRecord {
    pub fn new(work_id: i64, work_title: impl Into<String>, artists: Vec<ArtistId>) -> Self {
        Self {
            work_id,
            work_title: work_title.into(),
            artists,
        }
    }
}
