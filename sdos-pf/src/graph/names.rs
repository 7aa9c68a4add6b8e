//! Artist display-name lookup table

use futures::{Stream, TryStreamExt};
use sdos_common::{ArtistId, ArtistName};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::error::Result;

/// Mapping from artist id to display name and MBID
///
/// Built from a full catalog scan and cached independently of the graph, so it
/// may lag behind it. Callers fall back to a catalog point lookup on a miss.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameLookup {
    names: HashMap<ArtistId, ArtistName>,
}

impl NameLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ArtistId) -> Option<&ArtistName> {
        self.names.get(&id)
    }

    pub fn insert(&mut self, id: ArtistId, name: ArtistName) {
        self.names.insert(id, name);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Drain a catalog name stream into a lookup table
    pub async fn build_from_stream<S>(names: S) -> Result<Self>
    where
        S: Stream<Item = Result<(ArtistId, ArtistName)>>,
    {
        info!("Building artist name lookup...");
        let lookup: NameLookup = names.try_collect().await?;
        info!("Artist name lookup built with {} entries", lookup.len());
        Ok(lookup)
    }
}

impl Extend<(ArtistId, ArtistName)> for NameLookup {
    fn extend<I: IntoIterator<Item = (ArtistId, ArtistName)>>(&mut self, iter: I) {
        self.names.extend(iter);
    }
}

impl FromIterator<(ArtistId, ArtistName)> for NameLookup {
    fn from_iter<I: IntoIterator<Item = (ArtistId, ArtistName)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use futures::stream;

    #[tokio::test]
    async fn test_build_from_stream() {
        let rows = vec![
            Ok((1, ArtistName::new("Queen", Some("0383dadf".to_string())))),
            Ok((2, ArtistName::new("David Bowie", None))),
        ];
        let lookup = NameLookup::build_from_stream(stream::iter(rows)).await.unwrap();

        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.get(1).unwrap().mbid.as_deref(), Some("0383dadf"));
        assert!(lookup.get(3).is_none());
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let rows = vec![
            Ok((1, ArtistName::new("Queen", None))),
            Err(Error::CatalogUnavailable("gone".to_string())),
        ];
        let result = NameLookup::build_from_stream(stream::iter(rows)).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_later_entry_replaces_earlier() {
        let lookup: NameLookup = vec![
            (1, ArtistName::new("Old", None)),
            (1, ArtistName::new("New", None)),
        ]
        .into_iter()
        .collect();
        assert_eq!(lookup.get(1).unwrap().name, "New");
    }

    #[tokio::test]
    async fn test_stream_extends_lookup_in_place() {
        let rows = (0..1000).map(|id| Ok((id, ArtistName::new(format!("Artist {}", id), None))));
        let lookup = NameLookup::build_from_stream(stream::iter(rows.chain([Ok((
            7,
            ArtistName::new("Renamed", None),
        ))])))
        .await
        .unwrap();

        assert_eq!(lookup.len(), 1000);
        assert_eq!(lookup.get(7).unwrap().name, "Renamed");

        let mut extended = lookup.clone();
        extended.extend([(1000, ArtistName::new("Extra", None))]);
        assert_eq!(extended.len(), 1001);
    }
}
