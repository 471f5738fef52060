use std::time::Duration;

use chrono::Local;
use editor::RouteDraft;
use model::{route::Route, Coordinate};
use scheduler::TripScheduler;
use store::{MemoryStore, RouteStore};

#[tokio::main]
async fn main() {
    env_logger::init();

    // Draw a short route along the Kiel fjord, fixing up a missed click.
    let mut draft = RouteDraft::new("Kiel Hbf - Raisdorf");
    draft.append_point(Coordinate::new(54.31490, 10.13170));
    draft.append_point(Coordinate::new(54.30910, 10.15610));
    draft.append_point(Coordinate::new(54.28310, 10.24610));
    draft
        .insert_near_segment(Coordinate::new(54.30190, 10.19480))
        .unwrap();

    let points = draft.to_codec_sequence().unwrap();
    let encoded = codec::encode(points);
    log::info!("encoded {} points into {} bytes", points.len(), encoded.len());

    let store = MemoryStore::new();
    let now = Local::now();
    let route = store
        .insert_route(Route {
            display_name: draft.display_name().to_owned(),
            sequence_number: 1,
            origin_label: "Kiel Hbf".to_owned(),
            destination_label: "Raisdorf".to_owned(),
            distance_km: 9.6,
            estimated_duration_minutes: 24,
            encoded_polyline: encoded,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    // Animate the trip at 600x so the whole ride takes a few hundred
    // milliseconds of wall time.
    let scheduler = TripScheduler::new(store.clone());
    let trip = scheduler.create_trip(&route, 600.0).await.unwrap();
    scheduler.start_animation(trip.id).await.unwrap();

    loop {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let snapshot = scheduler.snapshot(trip.id).unwrap();
        println!(
            "trip: {}",
            serde_json::to_string_pretty(&snapshot).unwrap()
        );
        if !snapshot.is_animating {
            break;
        }
    }

    scheduler.delete_trip(trip.id).await.unwrap();
}
