//! The Route Store contract.
//!
//! The engine does not own a persistent backend; it talks to whatever store
//! the surrounding application provides through the [`RouteStore`] trait.
//! Route and Trip records in memory are caches — the store is the sole
//! durable owner, and no atomicity is assumed across calls.

use std::{error, fmt, result};

use async_trait::async_trait;
use model::{
    route::{Route, RoutePatch},
    trip::{Trip, TripPatch},
    WithId,
};
use utility::id::Id;

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug)]
pub enum StoreError {
    NotFound,
    Other(Box<dyn error::Error + Send + Sync>),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "record not found"),
            Self::Other(why) => write!(f, "store failure: {}", why),
        }
    }
}

impl error::Error for StoreError {}

pub type Result<T> = result::Result<T, StoreError>;

/// A key/value-style record store for route definitions and live trip
/// snapshots. Implementations assign ids and timestamps on insert and
/// refresh `updated_at` on every update.
///
/// Multiple concurrent accesses should be possible by cloning the store
/// handle.
#[async_trait]
pub trait RouteStore: Clone + Send + Sync + 'static {
    /// All routes, sorted by `sequence_number` ascending. Encoded polylines
    /// are returned already normalized (see [`normalize_stored_polyline`]).
    async fn routes(&self) -> Result<Vec<WithId<Route>>>;

    async fn insert_route(&self, route: Route) -> Result<WithId<Route>>;

    async fn update_route(&self, id: Id<Route>, patch: RoutePatch) -> Result<()>;

    async fn insert_trip(&self, trip: Trip) -> Result<WithId<Trip>>;

    async fn update_trip(&self, id: Id<Trip>, patch: TripPatch) -> Result<()>;

    async fn delete_trip(&self, id: Id<Trip>) -> Result<()>;
}

/// Undoes the doubled-backslash quoting some storage layers apply to the
/// encoded polyline text. This is a precondition of `codec::decode`, owned
/// by the store adapter and applied when text is read back — the codec
/// itself never sees quoted input.
///
/// Kept deliberately narrow: only the two-backslash run observed in stored
/// data is collapsed; nothing else is unescaped.
pub fn normalize_stored_polyline(raw: &str) -> String {
    raw.replace("\\\\", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_doubled_backslashes() {
        assert_eq!(normalize_stored_polyline(r"ab\\cd"), r"ab\cd");
        assert_eq!(normalize_stored_polyline(r"ab\cd"), r"ab\cd");
        assert_eq!(normalize_stored_polyline(""), "");
    }
}
