//! Catalog database connection
//!
//! The catalog is a MusicBrainz PostgreSQL database. SDOS only ever reads
//! from it.

use crate::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Open a connection pool to the catalog
pub async fn connect_catalog(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Connected to catalog: {}", redact_url(database_url));
    Ok(pool)
}

/// Create a catalog pool without connecting
///
/// Connections are opened on first use, so a service can start and serve
/// from its on-disk cache while the catalog is unreachable.
pub fn connect_catalog_lazy(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy(database_url)?;

    info!("Catalog pool configured for {}", redact_url(database_url));
    Ok(pool)
}

/// Strip the password from a connection URL for logging
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.find('@') else {
        return url.to_string();
    };

    let credentials = &rest[..at];
    match credentials.find(':') {
        Some(colon) => format!(
            "{}://{}:***@{}",
            &url[..scheme_end],
            &credentials[..colon],
            &rest[at + 1..]
        ),
        None => url.to_string(),
    }
}
