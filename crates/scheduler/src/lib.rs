//! The trip scheduler: owns every live animation instance and its timer.
//!
//! Each animating trip runs on its own repeating `tokio::time::interval`
//! task; there is no shared global tick. The trip table behind a mutex is
//! the single-writer point — a tick for one trip can never overlap another
//! tick of the same trip, while ticks across trips interleave arbitrarily.
//!
//! The store is never awaited before local state advances: per-tick
//! snapshot writes are fired off on their own tasks, and a failed write is
//! logged and dropped — the next successful tick converges stored and
//! in-memory state. Store errors on the explicit operations (create, start,
//! stop, reset, delete) do propagate to the caller.

use std::{
    collections::HashMap,
    error, fmt, result,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Local;
use codec::CodecError;
use model::{
    route::Route,
    trip::{Trip, TripPatch},
    Coordinate, WithId,
};
use store::{RouteStore, StoreError};
use tokio::{task::JoinHandle, time};
use utility::id::Id;

/// Ceiling on concurrently tracked trips.
pub const TRIP_LIMIT: usize = 10;

#[derive(Debug)]
pub enum SchedulerError {
    /// The route's polyline decodes to zero points.
    EmptyRoute,
    /// The route decodes to a single point; progress along it is undefined.
    DegenerateRoute,
    /// Creating an eleventh concurrent trip.
    TripLimitExceeded,
    /// The addressed trip is not tracked by this scheduler.
    UnknownTrip(Id<Trip>),
    /// The speed multiplier is not a positive finite number.
    InvalidSpeed(f64),
    /// The route's scheduled duration can not drive a timer.
    InvalidDuration(i32),
    Codec(CodecError),
    Store(StoreError),
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRoute => write!(f, "route has no points"),
            Self::DegenerateRoute => {
                write!(f, "route has a single point and can not animate")
            }
            Self::TripLimitExceeded => {
                write!(f, "at most {} concurrent trips are supported", TRIP_LIMIT)
            }
            Self::UnknownTrip(id) => write!(f, "no tracked trip with id {}", id),
            Self::InvalidSpeed(speed) => {
                write!(f, "speed multiplier {} is not positive and finite", speed)
            }
            Self::InvalidDuration(minutes) => {
                write!(f, "route duration of {} minutes is not positive", minutes)
            }
            Self::Codec(why) => write!(f, "{}", why),
            Self::Store(why) => write!(f, "{}", why),
        }
    }
}

impl error::Error for SchedulerError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Codec(why) => Some(why),
            Self::Store(why) => Some(why),
            _ => None,
        }
    }
}

impl From<CodecError> for SchedulerError {
    fn from(why: CodecError) -> Self {
        Self::Codec(why)
    }
}

impl From<StoreError> for SchedulerError {
    fn from(why: StoreError) -> Self {
        Self::Store(why)
    }
}

pub type Result<T> = result::Result<T, SchedulerError>;

struct ActiveTrip {
    trip: Trip,
    points: Arc<Vec<Coordinate>>,
    /// Route duration captured at creation; the interval is re-derived from
    /// it on every (re)start, never reused from an earlier timer.
    duration_minutes: i32,
    timer: Option<JoinHandle<()>>,
}

enum TickOutcome {
    /// The index advanced; mirror this snapshot to the store.
    Advanced(TripPatch),
    /// The last point was reached; the timer must end.
    Finished(TripPatch),
    /// The trip was stopped or deleted while the timer slept.
    Gone,
}

type TripTable = Arc<Mutex<HashMap<i32, ActiveTrip>>>;

/// Owns the trip table and all animation timers. All mutation goes through
/// the operations below; the raw table is never exposed.
pub struct TripScheduler<S: RouteStore> {
    store: S,
    trips: TripTable,
}

impl<S: RouteStore> TripScheduler<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            trips: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Decodes the route and registers a new idle trip at its first point.
    /// The trip is persisted before it becomes visible in the scheduler.
    pub async fn create_trip(
        &self,
        route: &WithId<Route>,
        speed_multiplier: f64,
    ) -> Result<WithId<Trip>> {
        check_speed(speed_multiplier)?;
        check_duration(route.content.estimated_duration_minutes)?;
        if self.trips.lock().unwrap().len() >= TRIP_LIMIT {
            return Err(SchedulerError::TripLimitExceeded);
        }

        let points = codec::decode(&route.content.encoded_polyline)?;
        match points.len() {
            0 => return Err(SchedulerError::EmptyRoute),
            1 => return Err(SchedulerError::DegenerateRoute),
            _ => {}
        }

        let now = Local::now();
        let trip = Trip {
            route_id: route.id,
            route_display_name: route.content.display_name.clone(),
            current_point_index: 0,
            current_latitude: points[0].latitude,
            current_longitude: points[0].longitude,
            total_points: points.len(),
            speed_multiplier,
            is_animating: false,
            progress_percent: 0.0,
            created_at: now,
            updated_at: now,
        };
        let stored = self.store.insert_trip(trip).await?;

        self.trips.lock().unwrap().insert(
            stored.id.raw(),
            ActiveTrip {
                trip: stored.content.clone(),
                points: Arc::new(points),
                duration_minutes: route.content.estimated_duration_minutes,
                timer: None,
            },
        );
        Ok(stored)
    }

    /// Arms the repeating timer for a trip. A no-op for unknown or already
    /// animating trips. The interval is computed fresh from the route
    /// duration and the current speed multiplier.
    pub async fn start_animation(&self, id: Id<Trip>) -> Result<()> {
        {
            let mut trips = self.trips.lock().unwrap();
            let entry = match trips.get_mut(&id.raw()) {
                Some(entry) => entry,
                None => return Ok(()),
            };
            if entry.timer.is_some() {
                return Ok(());
            }
            entry.trip.is_animating = true;
            let period = tick_period(
                entry.duration_minutes,
                entry.trip.total_points,
                entry.trip.speed_multiplier,
            );
            entry.timer = Some(self.spawn_timer(id.raw(), period));
        }

        self.store
            .update_trip(
                id,
                TripPatch {
                    is_animating: Some(true),
                    ..TripPatch::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Cancels the trip's timer and clears its animating flag; the point
    /// index stays where it is. Idempotent: stopping an already-idle trip
    /// does nothing, including no store write.
    pub async fn stop_animation(&self, id: Id<Trip>) -> Result<()> {
        {
            let mut trips = self.trips.lock().unwrap();
            let entry = match trips.get_mut(&id.raw()) {
                Some(entry) => entry,
                None => return Ok(()),
            };
            let had_timer = match entry.timer.take() {
                Some(timer) => {
                    timer.abort();
                    true
                }
                None => false,
            };
            if !had_timer && !entry.trip.is_animating {
                return Ok(());
            }
            entry.trip.is_animating = false;
        }

        self.store
            .update_trip(
                id,
                TripPatch {
                    is_animating: Some(false),
                    ..TripPatch::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Changes the playback speed. An animating trip is re-armed from its
    /// current index with an interval recomputed for the new speed; the
    /// partial progress of the interrupted interval is discarded. The new
    /// multiplier is persisted whether or not the trip is animating.
    pub async fn update_speed(&self, id: Id<Trip>, speed_multiplier: f64) -> Result<()> {
        check_speed(speed_multiplier)?;
        {
            let mut trips = self.trips.lock().unwrap();
            let entry = trips
                .get_mut(&id.raw())
                .ok_or(SchedulerError::UnknownTrip(id))?;
            entry.trip.speed_multiplier = speed_multiplier;
            if let Some(timer) = entry.timer.take() {
                timer.abort();
                let period = tick_period(
                    entry.duration_minutes,
                    entry.trip.total_points,
                    speed_multiplier,
                );
                entry.timer = Some(self.spawn_timer(id.raw(), period));
            }
        }

        self.store
            .update_trip(
                id,
                TripPatch {
                    speed_multiplier: Some(speed_multiplier),
                    ..TripPatch::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Stops the trip and rewinds it to its first point.
    pub async fn reset_trip(&self, id: Id<Trip>) -> Result<()> {
        let patch = {
            let mut trips = self.trips.lock().unwrap();
            let entry = trips
                .get_mut(&id.raw())
                .ok_or(SchedulerError::UnknownTrip(id))?;
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            let first = entry.points[0];
            entry.trip.is_animating = false;
            entry.trip.current_point_index = 0;
            entry.trip.current_latitude = first.latitude;
            entry.trip.current_longitude = first.longitude;
            entry.trip.progress_percent = 0.0;
            TripPatch {
                current_point_index: Some(0),
                current_latitude: Some(first.latitude),
                current_longitude: Some(first.longitude),
                is_animating: Some(false),
                progress_percent: Some(0.0),
                ..TripPatch::default()
            }
        };

        self.store.update_trip(id, patch).await?;
        Ok(())
    }

    /// Stops the trip, deletes it from the store and forgets it. A no-op
    /// for unknown ids. The trip stays tracked until the store delete
    /// succeeds, so a failed delete leaves a stopped trip that can be
    /// retried instead of one the scheduler has already forgotten.
    pub async fn delete_trip(&self, id: Id<Trip>) -> Result<()> {
        {
            let mut trips = self.trips.lock().unwrap();
            let entry = match trips.get_mut(&id.raw()) {
                Some(entry) => entry,
                None => return Ok(()),
            };
            if let Some(timer) = entry.timer.take() {
                timer.abort();
            }
            entry.trip.is_animating = false;
        }

        self.store.delete_trip(id).await?;
        self.trips.lock().unwrap().remove(&id.raw());
        Ok(())
    }

    /// A copy of one tracked trip's current state.
    pub fn snapshot(&self, id: Id<Trip>) -> Option<Trip> {
        self.trips
            .lock()
            .unwrap()
            .get(&id.raw())
            .map(|entry| entry.trip.clone())
    }

    /// Copies of all tracked trips.
    pub fn snapshots(&self) -> Vec<WithId<Trip>> {
        self.trips
            .lock()
            .unwrap()
            .iter()
            .map(|(&id, entry)| WithId::new(Id::new(id), entry.trip.clone()))
            .collect()
    }

    pub fn trip_count(&self) -> usize {
        self.trips.lock().unwrap().len()
    }

    fn spawn_timer(&self, trip_id: i32, period: Duration) -> JoinHandle<()> {
        let trips = Arc::clone(&self.trips);
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            // the first tick of a fresh interval completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                match advance_tick(&trips, trip_id) {
                    TickOutcome::Advanced(patch) => {
                        sync_snapshot(store.clone(), trip_id, patch);
                    }
                    TickOutcome::Finished(patch) => {
                        sync_snapshot(store.clone(), trip_id, patch);
                        break;
                    }
                    TickOutcome::Gone => break,
                }
            }
        })
    }
}

/// One timer tick: advance the trip's index under the lock and report what
/// the store should be told. Reaching the point count ends the animation
/// with the index left at the last valid point.
fn advance_tick(trips: &TripTable, trip_id: i32) -> TickOutcome {
    let mut trips = trips.lock().unwrap();
    let entry = match trips.get_mut(&trip_id) {
        Some(entry) => entry,
        None => return TickOutcome::Gone,
    };
    // `abort` only takes effect at the next await, so a poll that already
    // passed its interval tick when the trip was stopped still lands here.
    // A stopped trip must stay stopped; such a straggler tick does nothing.
    if entry.timer.is_none() || !entry.trip.is_animating {
        return TickOutcome::Gone;
    }

    let next = entry.trip.current_point_index + 1;
    if next >= entry.trip.total_points {
        entry.trip.is_animating = false;
        entry.timer = None;
        return TickOutcome::Finished(TripPatch {
            is_animating: Some(false),
            ..TripPatch::default()
        });
    }

    let point = entry.points[next];
    entry.trip.current_point_index = next;
    entry.trip.current_latitude = point.latitude;
    entry.trip.current_longitude = point.longitude;
    entry.trip.progress_percent = Trip::progress_percent(next, entry.trip.total_points);
    entry.trip.is_animating = true;
    TickOutcome::Advanced(TripPatch {
        current_point_index: Some(next),
        current_latitude: Some(point.latitude),
        current_longitude: Some(point.longitude),
        progress_percent: Some(entry.trip.progress_percent),
        is_animating: Some(true),
        ..TripPatch::default()
    })
}

/// Fire-and-forget snapshot write. The in-memory advance is authoritative;
/// a lost write is only logged, and the next tick's snapshot converges the
/// stored state.
fn sync_snapshot<S: RouteStore>(store: S, trip_id: i32, patch: TripPatch) {
    tokio::spawn(async move {
        if let Err(why) = store.update_trip(Id::new(trip_id), patch).await {
            log::warn!("trip {}: dropping snapshot sync: {}", trip_id, why);
        }
    });
}

fn tick_period(duration_minutes: i32, total_points: usize, speed_multiplier: f64) -> Duration {
    let per_point_ms = duration_minutes as f64 * 60_000.0 / total_points as f64;
    let effective_ms = per_point_ms / speed_multiplier;
    Duration::from_secs_f64(effective_ms / 1000.0)
}

fn check_speed(speed_multiplier: f64) -> Result<()> {
    if !speed_multiplier.is_finite() || speed_multiplier <= 0.0 {
        return Err(SchedulerError::InvalidSpeed(speed_multiplier));
    }
    Ok(())
}

// A zero or negative duration would produce a zero or negative timer period,
// and both `Duration::from_secs_f64` and `tokio::time::interval` panic on
// those.
fn check_duration(duration_minutes: i32) -> Result<()> {
    if duration_minutes <= 0 {
        return Err(SchedulerError::InvalidDuration(duration_minutes));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use model::route::RoutePatch;
    use store::MemoryStore;

    use super::*;

    /// Delegates to a [`MemoryStore`] but can be told to fail deletes,
    /// standing in for a store outage.
    #[derive(Clone)]
    struct UnreliableStore {
        inner: MemoryStore,
        fail_deletes: Arc<AtomicBool>,
    }

    #[async_trait]
    impl RouteStore for UnreliableStore {
        async fn routes(&self) -> store::Result<Vec<WithId<Route>>> {
            self.inner.routes().await
        }

        async fn insert_route(&self, route: Route) -> store::Result<WithId<Route>> {
            self.inner.insert_route(route).await
        }

        async fn update_route(
            &self,
            id: Id<Route>,
            patch: RoutePatch,
        ) -> store::Result<()> {
            self.inner.update_route(id, patch).await
        }

        async fn insert_trip(&self, trip: Trip) -> store::Result<WithId<Trip>> {
            self.inner.insert_trip(trip).await
        }

        async fn update_trip(&self, id: Id<Trip>, patch: TripPatch) -> store::Result<()> {
            self.inner.update_trip(id, patch).await
        }

        async fn delete_trip(&self, id: Id<Trip>) -> store::Result<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(StoreError::Other("simulated outage".into()));
            }
            self.inner.delete_trip(id).await
        }
    }

    fn route_with_points(points: &[(f64, f64)], duration_minutes: i32) -> Route {
        let coordinates: Vec<Coordinate> =
            points.iter().map(|&p| Coordinate::from(p)).collect();
        let now = Local::now();
        Route {
            display_name: "Kiel - Raisdorf".to_owned(),
            sequence_number: 1,
            origin_label: "Kiel Hbf".to_owned(),
            destination_label: "Raisdorf".to_owned(),
            distance_km: 12.5,
            estimated_duration_minutes: duration_minutes,
            encoded_polyline: codec::encode(&coordinates),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn line_points(count: usize) -> Vec<(f64, f64)> {
        (0..count).map(|i| (54.0 + i as f64 * 0.001, 10.0)).collect()
    }

    async fn stored_route(
        memory_store: &MemoryStore,
        points: &[(f64, f64)],
        duration_minutes: i32,
    ) -> WithId<Route> {
        memory_store
            .insert_route(route_with_points(points, duration_minutes))
            .await
            .unwrap()
    }

    #[test]
    fn tick_period_matches_duration_and_speed() {
        assert_eq!(tick_period(11, 11, 1.0), Duration::from_millis(60_000));
        assert_eq!(tick_period(11, 11, 2.0), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn created_trip_starts_idle_at_first_point() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let route = stored_route(&memory_store, &line_points(3), 30).await;

        let trip = scheduler.create_trip(&route, 1.0).await.unwrap();
        assert_eq!(trip.content.current_point_index, 0);
        assert_eq!(trip.content.total_points, 3);
        assert!(!trip.content.is_animating);
        assert_eq!(trip.content.progress_percent, 0.0);

        let persisted = memory_store.trip(trip.id).unwrap();
        assert_eq!(persisted.current_point_index, 0);
        assert!((persisted.current_latitude - 54.0).abs() < 5e-6);
    }

    #[tokio::test]
    async fn empty_route_is_rejected_without_store_contact() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let mut route = stored_route(&memory_store, &line_points(2), 30).await;
        route.content.encoded_polyline = String::new();

        let result = scheduler.create_trip(&route, 1.0).await;
        assert!(matches!(result, Err(SchedulerError::EmptyRoute)));
        assert_eq!(memory_store.trip_count(), 0);
    }

    #[tokio::test]
    async fn one_point_route_is_degenerate() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let mut route = stored_route(&memory_store, &line_points(2), 30).await;
        route.content.encoded_polyline =
            codec::encode(&[Coordinate::new(54.0, 10.0)]);

        let result = scheduler.create_trip(&route, 1.0).await;
        assert!(matches!(result, Err(SchedulerError::DegenerateRoute)));
        assert_eq!(memory_store.trip_count(), 0);
    }

    #[tokio::test]
    async fn eleventh_trip_is_rejected_without_store_contact() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let route = stored_route(&memory_store, &line_points(3), 30).await;

        for _ in 0..TRIP_LIMIT {
            scheduler.create_trip(&route, 1.0).await.unwrap();
        }
        let result = scheduler.create_trip(&route, 1.0).await;
        assert!(matches!(result, Err(SchedulerError::TripLimitExceeded)));
        assert_eq!(memory_store.trip_count(), TRIP_LIMIT);
    }

    #[tokio::test(start_paused = true)]
    async fn three_ticks_advance_to_index_three() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        // 11 minutes over 11 points: one point per minute.
        let route = stored_route(&memory_store, &line_points(11), 11).await;
        let trip = scheduler.create_trip(&route, 1.0).await.unwrap();

        scheduler.start_animation(trip.id).await.unwrap();
        time::sleep(Duration::from_millis(180_010)).await;

        let snapshot = scheduler.snapshot(trip.id).unwrap();
        assert_eq!(snapshot.current_point_index, 3);
        assert_eq!(snapshot.progress_percent, 30.0);
        assert!(snapshot.is_animating);

        tokio::task::yield_now().await;
        let persisted = memory_store.trip(trip.id).unwrap();
        assert_eq!(persisted.current_point_index, 3);
        assert_eq!(persisted.progress_percent, 30.0);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_leaves_index_at_last_point() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        // 20 second per-point interval at speed 1000: 20 ms ticks.
        let route = stored_route(&memory_store, &line_points(3), 1).await;
        let trip = scheduler.create_trip(&route, 1000.0).await.unwrap();

        scheduler.start_animation(trip.id).await.unwrap();
        time::sleep(Duration::from_millis(500)).await;

        let snapshot = scheduler.snapshot(trip.id).unwrap();
        assert_eq!(snapshot.current_point_index, 2);
        assert_eq!(snapshot.progress_percent, 100.0);
        assert!(!snapshot.is_animating);

        // Nothing moves once the route is exhausted.
        time::sleep(Duration::from_millis(500)).await;
        let snapshot = scheduler.snapshot(trip.id).unwrap();
        assert_eq!(snapshot.current_point_index, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_completion_runs_again() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let route = stored_route(&memory_store, &line_points(3), 1).await;
        let trip = scheduler.create_trip(&route, 1000.0).await.unwrap();

        scheduler.start_animation(trip.id).await.unwrap();
        time::sleep(Duration::from_millis(500)).await;
        assert!(!scheduler.snapshot(trip.id).unwrap().is_animating);

        // The finished timer is gone, so a new start arms a fresh one. The
        // index is already at the end and stops again on the first tick.
        scheduler.start_animation(trip.id).await.unwrap();
        time::sleep(Duration::from_millis(100)).await;
        let snapshot = scheduler.snapshot(trip.id).unwrap();
        assert_eq!(snapshot.current_point_index, 2);
        assert!(!snapshot.is_animating);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let route = stored_route(&memory_store, &line_points(11), 11).await;
        let trip = scheduler.create_trip(&route, 1.0).await.unwrap();

        scheduler.start_animation(trip.id).await.unwrap();
        time::sleep(Duration::from_millis(60_010)).await;
        scheduler.stop_animation(trip.id).await.unwrap();

        let after_first = scheduler.snapshot(trip.id).unwrap();
        assert!(!after_first.is_animating);
        assert_eq!(after_first.current_point_index, 1);

        scheduler.stop_animation(trip.id).await.unwrap();
        let after_second = scheduler.snapshot(trip.id).unwrap();
        assert!(!after_second.is_animating);
        assert_eq!(after_second.current_point_index, 1);

        // stopped means stopped: no more ticks arrive
        time::sleep(Duration::from_millis(120_000)).await;
        assert_eq!(scheduler.snapshot(trip.id).unwrap().current_point_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn speed_change_rearms_the_timer() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let route = stored_route(&memory_store, &line_points(11), 11).await;
        let trip = scheduler.create_trip(&route, 1.0).await.unwrap();

        scheduler.start_animation(trip.id).await.unwrap();
        time::sleep(Duration::from_millis(60_010)).await;
        assert_eq!(scheduler.snapshot(trip.id).unwrap().current_point_index, 1);

        // 60x: one point per second from here on.
        scheduler.update_speed(trip.id, 60.0).await.unwrap();
        time::sleep(Duration::from_millis(3_010)).await;

        let snapshot = scheduler.snapshot(trip.id).unwrap();
        assert_eq!(snapshot.current_point_index, 4);
        assert_eq!(snapshot.speed_multiplier, 60.0);
        assert!(snapshot.is_animating);
    }

    #[tokio::test]
    async fn speed_change_on_idle_trip_only_persists() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let route = stored_route(&memory_store, &line_points(3), 30).await;
        let trip = scheduler.create_trip(&route, 1.0).await.unwrap();

        scheduler.update_speed(trip.id, 4.0).await.unwrap();
        let snapshot = scheduler.snapshot(trip.id).unwrap();
        assert_eq!(snapshot.speed_multiplier, 4.0);
        assert!(!snapshot.is_animating);
        assert_eq!(memory_store.trip(trip.id).unwrap().speed_multiplier, 4.0);
    }

    #[tokio::test]
    async fn speed_change_on_unknown_trip_fails() {
        let scheduler = TripScheduler::new(MemoryStore::new());
        let result = scheduler.update_speed(Id::new(99), 2.0).await;
        assert!(matches!(result, Err(SchedulerError::UnknownTrip(_))));
    }

    #[tokio::test]
    async fn non_positive_speed_is_rejected() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let route = stored_route(&memory_store, &line_points(3), 30).await;
        let result = scheduler.create_trip(&route, 0.0).await;
        assert!(matches!(result, Err(SchedulerError::InvalidSpeed(_))));
    }

    #[tokio::test]
    async fn non_positive_duration_is_rejected() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        for minutes in [0, -5] {
            let route = stored_route(&memory_store, &line_points(3), minutes).await;
            let result = scheduler.create_trip(&route, 1.0).await;
            assert!(matches!(result, Err(SchedulerError::InvalidDuration(_))));
        }
        assert_eq!(memory_store.trip_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn straggler_tick_after_stop_does_nothing() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let route = stored_route(&memory_store, &line_points(11), 11).await;
        let trip = scheduler.create_trip(&route, 1.0).await.unwrap();

        scheduler.start_animation(trip.id).await.unwrap();
        scheduler.stop_animation(trip.id).await.unwrap();

        // A timer poll that had already passed its interval tick when the
        // stop landed still runs the advance; it must change nothing.
        let outcome = advance_tick(&scheduler.trips, trip.id.raw());
        assert!(matches!(outcome, TickOutcome::Gone));

        let snapshot = scheduler.snapshot(trip.id).unwrap();
        assert!(!snapshot.is_animating);
        assert_eq!(snapshot.current_point_index, 0);
    }

    #[tokio::test]
    async fn failed_store_delete_keeps_trip_tracked() {
        let memory_store = MemoryStore::new();
        let unreliable = UnreliableStore {
            inner: memory_store.clone(),
            fail_deletes: Arc::new(AtomicBool::new(true)),
        };
        let scheduler = TripScheduler::new(unreliable.clone());
        let route = stored_route(&memory_store, &line_points(3), 30).await;
        let trip = scheduler.create_trip(&route, 1.0).await.unwrap();

        let result = scheduler.delete_trip(trip.id).await;
        assert!(matches!(result, Err(SchedulerError::Store(_))));
        assert_eq!(scheduler.trip_count(), 1);
        assert!(!scheduler.snapshot(trip.id).unwrap().is_animating);
        assert_eq!(memory_store.trip_count(), 1);

        // Once the store recovers the delete can simply be retried.
        unreliable.fail_deletes.store(false, Ordering::SeqCst);
        scheduler.delete_trip(trip.id).await.unwrap();
        assert_eq!(scheduler.trip_count(), 0);
        assert_eq!(memory_store.trip_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_rewinds_to_first_point() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let route = stored_route(&memory_store, &line_points(11), 11).await;
        let trip = scheduler.create_trip(&route, 1.0).await.unwrap();

        scheduler.start_animation(trip.id).await.unwrap();
        time::sleep(Duration::from_millis(120_010)).await;
        scheduler.reset_trip(trip.id).await.unwrap();

        let snapshot = scheduler.snapshot(trip.id).unwrap();
        assert_eq!(snapshot.current_point_index, 0);
        assert_eq!(snapshot.progress_percent, 0.0);
        assert!(!snapshot.is_animating);
        assert!((snapshot.current_latitude - 54.0).abs() < 5e-6);

        let persisted = memory_store.trip(trip.id).unwrap();
        assert_eq!(persisted.current_point_index, 0);
        assert!(!persisted.is_animating);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_removes_memory_and_store_state() {
        let memory_store = MemoryStore::new();
        let scheduler = TripScheduler::new(memory_store.clone());
        let route = stored_route(&memory_store, &line_points(3), 30).await;
        let trip = scheduler.create_trip(&route, 1.0).await.unwrap();

        scheduler.start_animation(trip.id).await.unwrap();
        scheduler.delete_trip(trip.id).await.unwrap();
        assert_eq!(scheduler.trip_count(), 0);
        assert_eq!(memory_store.trip_count(), 0);
        assert!(scheduler.snapshot(trip.id).is_none());

        // deleting again is a no-op
        scheduler.delete_trip(trip.id).await.unwrap();
    }
}
