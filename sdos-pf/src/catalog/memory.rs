//! In-memory catalog
//!
//! Holds pre-filtered collaboration records and artist names in memory. Used
//! by tests and demos; it can also inject a stream delay or a mid-stream
//! failure to exercise readiness and error handling.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use sdos_common::{ArtistId, ArtistMatch, ArtistName, CollaborationRecord};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Catalog, NameStream, RecordStream, MAX_FUZZY_CANDIDATES};
use crate::error::{Error, Result};

/// Catalog backed by in-memory records
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    records: Vec<CollaborationRecord>,
    artists: Vec<(ArtistId, ArtistName)>,
    aliases: Vec<(ArtistId, String)>,
    stream_delay: Option<Duration>,
    fail_after: Option<usize>,
    collaboration_passes: AtomicUsize,
    name_passes: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a collaboration record (streamed in insertion order)
    pub fn with_record(mut self, work_id: i64, title: &str, artists: &[ArtistId]) -> Self {
        self.records
            .push(CollaborationRecord::new(work_id, title, artists.to_vec()));
        self
    }

    /// Add an artist with its display name and optional MBID
    pub fn with_artist(mut self, id: ArtistId, name: &str, mbid: Option<&str>) -> Self {
        self.artists
            .push((id, ArtistName::new(name, mbid.map(str::to_string))));
        self
    }

    /// Add an alternative name for an artist
    pub fn with_alias(mut self, id: ArtistId, alias: &str) -> Self {
        self.aliases.push((id, alias.to_string()));
        self
    }

    /// Sleep before the first collaboration record is produced
    pub fn with_stream_delay(mut self, delay: Duration) -> Self {
        self.stream_delay = Some(delay);
        self
    }

    /// Fail the collaboration stream after `records` records
    pub fn failing_after(mut self, records: usize) -> Self {
        self.fail_after = Some(records);
        self
    }

    /// Number of times the collaboration stream has been opened
    pub fn collaboration_passes(&self) -> usize {
        self.collaboration_passes.load(Ordering::SeqCst)
    }

    /// Number of times the artist-name stream has been opened
    pub fn name_passes(&self) -> usize {
        self.name_passes.load(Ordering::SeqCst)
    }

    /// Recordings credited to an artist (popularity used for ranking)
    fn release_count(&self, id: ArtistId) -> i64 {
        self.records
            .iter()
            .filter(|r| r.artists.contains(&id))
            .map(|r| r.work_id)
            .collect::<HashSet<_>>()
            .len() as i64
    }

    fn to_match(&self, id: ArtistId, name: &ArtistName) -> ArtistMatch {
        ArtistMatch {
            id,
            name: name.name.clone(),
            mbid: name.mbid.clone(),
            release_count: self.release_count(id),
        }
    }

    fn artist(&self, id: ArtistId) -> Option<&ArtistName> {
        self.artists
            .iter()
            .find(|(artist_id, _)| *artist_id == id)
            .map(|(_, name)| name)
    }
}

fn by_popularity(tier: &mut [ArtistMatch]) {
    tier.sort_by(|a, b| b.release_count.cmp(&a.release_count).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl Catalog for MemoryCatalog {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn stream_collaborations(&self) -> RecordStream<'_> {
        self.collaboration_passes.fetch_add(1, Ordering::SeqCst);

        let take = self.fail_after.unwrap_or(self.records.len());
        let records = stream::iter(self.records.iter().take(take).cloned().map(Ok));
        let failure = stream::iter(
            self.fail_after
                .map(|n| Err(Error::CatalogUnavailable(format!("stream aborted after {} records", n)))),
        );
        let records = records.chain(failure);

        match self.stream_delay {
            Some(delay) => stream::once(async move {
                tokio::time::sleep(delay).await;
                records
            })
            .flatten()
            .boxed(),
            None => records.boxed(),
        }
    }

    fn stream_artist_names(&self) -> NameStream<'_> {
        self.name_passes.fetch_add(1, Ordering::SeqCst);
        stream::iter(self.artists.iter().cloned().map(Ok)).boxed()
    }

    async fn lookup_artist(&self, id: ArtistId) -> Result<Option<ArtistName>> {
        Ok(self.artist(id).cloned())
    }

    async fn search_artists(&self, query: &str, limit: usize) -> Result<Vec<ArtistMatch>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();

        let mut exact: Vec<ArtistMatch> = self
            .artists
            .iter()
            .filter(|(_, name)| name.name.to_lowercase() == needle)
            .filter(|(id, _)| seen.insert(*id))
            .map(|(id, name)| self.to_match(*id, name))
            .collect();
        by_popularity(&mut exact);

        let mut alias: Vec<ArtistMatch> = self
            .aliases
            .iter()
            .filter(|(_, alias)| alias.to_lowercase() == needle)
            .filter_map(|(id, _)| self.artist(*id).map(|name| (*id, name)))
            .filter(|(id, _)| seen.insert(*id))
            .map(|(id, name)| self.to_match(id, name))
            .collect();
        by_popularity(&mut alias);

        let mut fuzzy = Vec::new();
        if exact.is_empty() && alias.is_empty() {
            fuzzy = self
                .artists
                .iter()
                .filter(|(_, name)| name.name.to_lowercase().contains(&needle))
                .filter(|(id, _)| seen.insert(*id))
                .take(MAX_FUZZY_CANDIDATES)
                .map(|(id, name)| self.to_match(*id, name))
                .collect();
            by_popularity(&mut fuzzy);
        }

        let mut results = exact;
        results.extend(alias);
        results.extend(fuzzy);
        results.truncate(limit);
        Ok(results)
    }
}
