use chrono::{DateTime, Local};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::{HasId, Id};

use crate::route::Route;

/// One live animation instance tracking progress along a route's decoded
/// point sequence.
///
/// Invariant: `0 <= current_point_index < total_points`, and
/// `progress_percent` is always `current_point_index / (total_points - 1)
/// * 100`. The scheduler is the only writer; stored copies trail the
/// in-memory state by at most one tick.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub route_id: Id<Route>,
    pub route_display_name: String,
    pub current_point_index: usize,
    pub current_latitude: f64,
    pub current_longitude: f64,
    pub total_points: usize,
    pub speed_multiplier: f64,
    pub is_animating: bool,
    pub progress_percent: f64,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl HasId for Trip {
    type IdType = i32;
}

impl Trip {
    /// Fraction of the route covered, as a percentage of the last reachable
    /// index. A single-point route has no defined progress and reports 0.
    pub fn progress_percent(current_point_index: usize, total_points: usize) -> f64 {
        if total_points <= 1 {
            0.0
        } else {
            current_point_index as f64 / (total_points - 1) as f64 * 100.0
        }
    }
}

/// Partial update for a stored trip. `None` fields are left untouched.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripPatch {
    pub current_point_index: Option<usize>,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub speed_multiplier: Option<f64>,
    pub is_animating: Option<bool>,
    pub progress_percent: Option<f64>,
}
