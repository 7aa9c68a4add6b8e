//! MusicBrainz PostgreSQL catalog
//!
//! Collaborations are recordings credited to more than one artist that appear
//! on a labelled release. Recordings are dropped when the release is credited
//! to a placeholder artist, when the release group has an unwanted primary or
//! secondary type, when the release status is unwanted, or when the recording
//! credit pairs artists with a "vs" join phrase.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use sdos_common::config::CatalogConfig;
use sdos_common::{ArtistId, ArtistMatch, ArtistName, CollaborationRecord};
use sqlx::PgPool;

use super::{Catalog, NameStream, RecordStream, MAX_FUZZY_CANDIDATES};
use crate::error::{Error, Result};

const COLLABORATIONS_SQL: &str = r#"
    SELECT r.id::bigint AS recording_id,
           r.name AS recording_name,
           array_agg(acn.artist ORDER BY acn.position) AS artists
    FROM recording r
    JOIN artist_credit ac ON r.artist_credit = ac.id
    JOIN artist_credit_name acn ON ac.id = acn.artist_credit
    JOIN track t ON r.id = t.recording
    JOIN medium m ON t.medium = m.id
    JOIN release rel ON m.release = rel.id
    JOIN release_label rl ON rel.id = rl.release
    JOIN label l ON rl.label = l.id
    JOIN release_group rg ON rel.release_group = rg.id
    LEFT JOIN release_status rs ON rel.status = rs.id
    WHERE l.name IS NOT NULL
      AND LOWER(TRIM(l.name)) != ALL($1)
      AND NOT EXISTS (
        SELECT 1
        FROM artist_credit_name rc
        WHERE rc.artist_credit = rel.artist_credit
          AND LOWER(TRIM(rc.name)) = ANY($2)
      )
      AND NOT EXISTS (
        SELECT 1
        FROM release_group_secondary_type_join j
        JOIN release_group_secondary_type s ON j.secondary_type = s.id
        WHERE j.release_group = rg.id
          AND LOWER(s.name) = ANY($3)
      )
      AND NOT EXISTS (
        SELECT 1
        FROM release_group_primary_type p
        WHERE rg.type = p.id
          AND LOWER(p.name) = ANY($3)
      )
      AND NOT EXISTS (
        SELECT 1
        FROM artist_credit_name acn_check
        WHERE acn_check.artist_credit = r.artist_credit
          AND acn_check.join_phrase ILIKE $4
      )
      AND (rs.name IS NULL OR LOWER(rs.name) != ALL($5))
    GROUP BY r.id, r.name
    HAVING COUNT(DISTINCT acn.artist) > 1
"#;

const ARTIST_NAMES_SQL: &str = "SELECT id, name, gid::text FROM artist";

const LOOKUP_ARTIST_SQL: &str = "SELECT name, gid::text FROM artist WHERE id = $1";

// $1 = query, $2 = LIKE pattern, $3 = fuzzy cap, $4 = limit
const SEARCH_ARTISTS_SQL: &str = r#"
    WITH ranked_matches AS (
        SELECT a.id, a.name, a.gid::text AS gid, 1 AS match_priority
        FROM artist a
        WHERE LOWER(a.name) = LOWER($1)

        UNION ALL

        SELECT a.id, a.name, a.gid::text AS gid, 2 AS match_priority
        FROM artist_alias aa
        JOIN artist a ON aa.artist = a.id
        WHERE LOWER(aa.name) = LOWER($1)

        UNION ALL

        (SELECT a.id, a.name, a.gid::text AS gid, 3 AS match_priority
         FROM artist a
         WHERE LOWER(a.name) LIKE LOWER($2)
           AND LOWER(a.name) != LOWER($1)
           AND NOT EXISTS (SELECT 1 FROM artist a2 WHERE LOWER(a2.name) = LOWER($1))
           AND NOT EXISTS (SELECT 1 FROM artist_alias aa2 WHERE LOWER(aa2.name) = LOWER($1))
         LIMIT $3)
    ),
    best_matches AS (
        SELECT DISTINCT ON (id) id, name, gid, match_priority
        FROM ranked_matches
        ORDER BY id, match_priority
    ),
    artist_stats AS (
        SELECT bm.id, bm.name, bm.gid, bm.match_priority,
               COUNT(DISTINCT r.id) AS release_count
        FROM best_matches bm
        LEFT JOIN artist_credit_name acn ON acn.artist = bm.id
        LEFT JOIN recording r ON acn.artist_credit = r.artist_credit
        GROUP BY bm.id, bm.name, bm.gid, bm.match_priority
    )
    SELECT id, name, gid, release_count
    FROM artist_stats
    ORDER BY match_priority, release_count DESC, id
    LIMIT $4
"#;

/// Catalog backed by a MusicBrainz PostgreSQL database
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
    filter: CatalogConfig,
}

impl PgCatalog {
    pub fn new(pool: PgPool, filter: CatalogConfig) -> Self {
        Self { pool, filter }
    }
}

fn lowercased(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.trim().to_lowercase()).collect()
}

/// Escape LIKE wildcards in user input and wrap it for substring matching
fn substring_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl Catalog for PgCatalog {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn stream_collaborations(&self) -> RecordStream<'_> {
        sqlx::query_as::<_, (i64, String, Vec<i32>)>(COLLABORATIONS_SQL)
            .bind(lowercased(&self.filter.excluded_labels))
            .bind(lowercased(&self.filter.excluded_release_artists))
            .bind(lowercased(&self.filter.unwanted_release_group_types))
            .bind(self.filter.versus_join_pattern.clone())
            .bind(lowercased(&self.filter.unwanted_release_statuses))
            .fetch(&self.pool)
            .map_ok(|(work_id, work_title, artists)| {
                CollaborationRecord::new(work_id, work_title, artists)
            })
            .map_err(Error::from)
            .boxed()
    }

    fn stream_artist_names(&self) -> NameStream<'_> {
        sqlx::query_as::<_, (i32, String, Option<String>)>(ARTIST_NAMES_SQL)
            .fetch(&self.pool)
            .map_ok(|(id, name, mbid)| (id, ArtistName::new(name, mbid)))
            .map_err(Error::from)
            .boxed()
    }

    async fn lookup_artist(&self, id: ArtistId) -> Result<Option<ArtistName>> {
        let row = sqlx::query_as::<_, (String, Option<String>)>(LOOKUP_ARTIST_SQL)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(name, mbid)| ArtistName::new(name, mbid)))
    }

    async fn search_artists(&self, query: &str, limit: usize) -> Result<Vec<ArtistMatch>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, (i32, String, Option<String>, i64)>(SEARCH_ARTISTS_SQL)
            .bind(query)
            .bind(substring_pattern(query))
            .bind(MAX_FUZZY_CANDIDATES as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, mbid, release_count)| ArtistMatch {
                id,
                name,
                mbid,
                release_count,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_pattern_escapes_wildcards() {
        assert_eq!(substring_pattern("bjork"), "%bjork%");
        assert_eq!(substring_pattern("100%"), "%100\\%%");
        assert_eq!(substring_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn test_filter_lists_are_lowercased_and_trimmed() {
        let values = vec![" Various Artists ".to_string(), "DJ-mix".to_string()];
        assert_eq!(lowercased(&values), vec!["various artists", "dj-mix"]);
    }

    /// Runs only against a real MusicBrainz mirror
    #[tokio::test]
    async fn test_search_against_live_catalog() {
        let Ok(url) = std::env::var("SDOS_TEST_DATABASE_URL") else {
            eprintln!("Skipping test: SDOS_TEST_DATABASE_URL not set");
            return;
        };

        let pool = sdos_common::db::connect_catalog(&url)
            .await
            .expect("Should connect to test catalog");
        let catalog = PgCatalog::new(pool, CatalogConfig::default());

        let matches = catalog.search_artists("Queen", 5).await.unwrap();
        assert!(matches.len() <= 5);
        if let Some(first) = matches.first() {
            assert!(catalog.lookup_artist(first.id).await.unwrap().is_some());
        }
    }
}
