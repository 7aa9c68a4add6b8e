//! HTTP API handlers for sdos-pf

pub mod error;
pub mod health;
pub mod path;
pub mod search;

pub use error::ApiError;
pub use health::health_routes;
pub use path::{find_path, rebuild_graph};
pub use search::search_artists;
