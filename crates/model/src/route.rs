use chrono::{DateTime, Local};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utility::id::HasId;

/// A persisted, named ordered path plus metadata. The point sequence itself is
/// stored only in compressed form; it is never kept alongside as plain
/// coordinates. Mutation replaces `encoded_polyline` (and `updated_at`);
/// routes are never deleted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub display_name: String,
    pub sequence_number: i32,
    pub origin_label: String,
    pub destination_label: String,
    pub distance_km: f64,
    /// Scheduled end-to-end travel time. Drives the per-point animation
    /// interval, so a missing value falls back to a usable default instead
    /// of failing the trip.
    #[serde(default = "default_estimated_duration_minutes")]
    pub estimated_duration_minutes: i32,
    pub encoded_polyline: String,
    pub is_active: bool,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl HasId for Route {
    type IdType = i32;
}

fn default_estimated_duration_minutes() -> i32 {
    210
}

/// Partial update for a stored route. `None` fields are left untouched.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutePatch {
    pub display_name: Option<String>,
    pub sequence_number: Option<i32>,
    pub origin_label: Option<String>,
    pub destination_label: Option<String>,
    pub distance_km: Option<f64>,
    pub estimated_duration_minutes: Option<i32>,
    pub encoded_polyline: Option<String>,
    pub is_active: Option<bool>,
}

impl RoutePatch {
    /// The usual save-from-editor mutation: replace the compressed point
    /// sequence and leave everything else alone.
    pub fn encoded_polyline(encoded: String) -> Self {
        Self {
            encoded_polyline: Some(encoded),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_duration_defaults_to_210() {
        let json = r#"{
            "displayName": "Kiel - Raisdorf",
            "sequenceNumber": 1,
            "originLabel": "Kiel Hbf",
            "destinationLabel": "Raisdorf",
            "distanceKm": 12.5,
            "encodedPolyline": "_p~iF~ps|U",
            "isActive": true,
            "createdAt": "2024-05-01T08:00:00+02:00",
            "updatedAt": "2024-05-01T08:00:00+02:00"
        }"#;
        let route: Route = serde_json::from_str(json).unwrap();
        assert_eq!(route.estimated_duration_minutes, 210);
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = RoutePatch::encoded_polyline("abc".to_owned());
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 1);
        assert_eq!(json["encodedPolyline"], "abc");
    }
}
