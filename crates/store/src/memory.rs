//! In-memory reference implementation of the store contract, used by the
//! playground and by scheduler tests. Insertion order is kept so listings
//! are stable across runs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Local;
use indexmap::IndexMap;
use model::{
    route::{Route, RoutePatch},
    trip::{Trip, TripPatch},
    WithId,
};
use utility::id::Id;

use crate::{normalize_stored_polyline, Result, RouteStore, StoreError};

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    routes: IndexMap<i32, Route>,
    trips: IndexMap<i32, Trip>,
    next_route_id: i32,
    next_trip_id: i32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read of a stored trip, for assertions in tests.
    pub fn trip(&self, id: Id<Trip>) -> Option<Trip> {
        self.inner.lock().unwrap().trips.get(&id.raw()).cloned()
    }

    pub fn trip_count(&self) -> usize {
        self.inner.lock().unwrap().trips.len()
    }
}

#[async_trait]
impl RouteStore for MemoryStore {
    async fn routes(&self) -> Result<Vec<WithId<Route>>> {
        let inner = self.inner.lock().unwrap();
        let mut routes = inner
            .routes
            .iter()
            .map(|(&id, route)| {
                let mut route = route.clone();
                route.encoded_polyline =
                    normalize_stored_polyline(&route.encoded_polyline);
                WithId::new(Id::new(id), route)
            })
            .collect::<Vec<_>>();
        routes.sort_by_key(|route| route.content.sequence_number);
        Ok(routes)
    }

    async fn insert_route(&self, mut route: Route) -> Result<WithId<Route>> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_route_id += 1;
        let id = inner.next_route_id;
        let now = Local::now();
        route.created_at = now;
        route.updated_at = now;
        inner.routes.insert(id, route.clone());
        Ok(WithId::new(Id::new(id), route))
    }

    async fn update_route(&self, id: Id<Route>, patch: RoutePatch) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let route = inner
            .routes
            .get_mut(&id.raw())
            .ok_or(StoreError::NotFound)?;
        if let Some(display_name) = patch.display_name {
            route.display_name = display_name;
        }
        if let Some(sequence_number) = patch.sequence_number {
            route.sequence_number = sequence_number;
        }
        if let Some(origin_label) = patch.origin_label {
            route.origin_label = origin_label;
        }
        if let Some(destination_label) = patch.destination_label {
            route.destination_label = destination_label;
        }
        if let Some(distance_km) = patch.distance_km {
            route.distance_km = distance_km;
        }
        if let Some(minutes) = patch.estimated_duration_minutes {
            route.estimated_duration_minutes = minutes;
        }
        if let Some(encoded_polyline) = patch.encoded_polyline {
            route.encoded_polyline = encoded_polyline;
        }
        if let Some(is_active) = patch.is_active {
            route.is_active = is_active;
        }
        route.updated_at = Local::now();
        Ok(())
    }

    async fn insert_trip(&self, mut trip: Trip) -> Result<WithId<Trip>> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_trip_id += 1;
        let id = inner.next_trip_id;
        let now = Local::now();
        trip.created_at = now;
        trip.updated_at = now;
        inner.trips.insert(id, trip.clone());
        Ok(WithId::new(Id::new(id), trip))
    }

    async fn update_trip(&self, id: Id<Trip>, patch: TripPatch) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let trip = inner
            .trips
            .get_mut(&id.raw())
            .ok_or(StoreError::NotFound)?;
        if let Some(index) = patch.current_point_index {
            trip.current_point_index = index;
        }
        if let Some(latitude) = patch.current_latitude {
            trip.current_latitude = latitude;
        }
        if let Some(longitude) = patch.current_longitude {
            trip.current_longitude = longitude;
        }
        if let Some(speed_multiplier) = patch.speed_multiplier {
            trip.speed_multiplier = speed_multiplier;
        }
        if let Some(is_animating) = patch.is_animating {
            trip.is_animating = is_animating;
        }
        if let Some(progress_percent) = patch.progress_percent {
            trip.progress_percent = progress_percent;
        }
        trip.updated_at = Local::now();
        Ok(())
    }

    async fn delete_trip(&self, id: Id<Trip>) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .trips
            .shift_remove(&id.raw())
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
