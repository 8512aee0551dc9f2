use serde::{Deserialize, Serialize};

use crate::domain::{string_or_number, City, Coordinate, CoordinatePair, RouteId, StopId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub route_id: RouteId,
    #[serde(deserialize_with = "string_or_number")]
    pub route_short_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionSummary {
    pub trip_headsign: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopSummary {
    pub stop_id: StopId,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

impl StopSummary {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.stop_lat, self.stop_lon)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutesQuery<'a> {
    pub city: &'a City,
}

#[derive(Debug, Clone, Serialize)]
pub struct TripsQuery<'a> {
    pub city: &'a City,
    pub route_id: &'a RouteId,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopsQuery<'a> {
    pub city: &'a City,
    pub route_id: &'a RouteId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headsign: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInfoQuery {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
}

impl From<CoordinatePair> for RouteInfoQuery {
    fn from(pair: CoordinatePair) -> Self {
        Self {
            start_lat: pair.from.lat,
            start_lon: pair.from.lon,
            end_lat: pair.to.lat,
            end_lon: pair.to.lon,
        }
    }
}

/// One path alternative between two stops. Distance is kilometres and
/// duration minutes, already rounded by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAlternative {
    #[serde(default)]
    pub id: usize,
    #[serde(rename = "distance")]
    pub distance_km: f64,
    #[serde(rename = "duration")]
    pub duration_min: f64,
    #[serde(default)]
    pub coordinates: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfoResponse {
    #[serde(default)]
    pub routes: Vec<RouteAlternative>,
    #[serde(rename = "selectedRoute", default)]
    pub selected_route: usize,
    /// Set when the server could not reach its router and interpolated a
    /// straight line instead.
    #[serde(default)]
    pub fallback: bool,
}

/// Body of `POST /api/predict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub city: City,
    pub route_id: RouteId,
    #[serde(default)]
    pub direction: String,
    pub source: String,
    pub destination: String,
    pub date: String,
    pub time_of_day: String,
    pub day_of_week: String,
    pub weather_condition: String,
    pub precipitation_mm: f64,
    pub temperature_c: f64,
    pub event_type: String,
    pub event_attendance: u32,
    pub traffic_factor: f64,
    pub lat: f64,
    pub lon: f64,
    pub dest_lat: f64,
    pub dest_lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub condition: String,
    pub temperature_c: f64,
    pub precipitation_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub delay_minutes: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_used: Option<WeatherSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
}

impl HealthResponse {
    pub fn offline() -> Self {
        Self {
            status: "offline".to_string(),
            model_loaded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_gtfs_ids_decode_as_text() {
        let routes: Vec<RouteSummary> =
            serde_json::from_str(r#"[{"route_id": 1042, "route_short_name": 5}]"#)
                .expect("routes");
        assert_eq!(routes[0].route_id, RouteId::new("1042"));
        assert_eq!(routes[0].route_short_name, "5");

        let stops: Vec<StopSummary> = serde_json::from_str(
            r#"[{"stop_id": 7, "stop_name": "Ameerpet", "stop_lat": 17.43, "stop_lon": 78.44}]"#,
        )
        .expect("stops");
        assert_eq!(stops[0].stop_id, StopId::new("7"));
        assert_eq!(stops[0].coordinate(), Coordinate::new(17.43, 78.44));
    }

    #[test]
    fn fallback_route_info_decodes_pairs_and_flag() {
        let body = r#"{
            "routes": [{
                "id": 0,
                "distance": 3.2,
                "duration": 7.7,
                "coordinates": [[17.0, 78.0], [17.5, 78.5]],
                "summary": {"distance": 3.21, "duration": 7.71}
            }],
            "selectedRoute": 0,
            "fallback": true
        }"#;
        let info: RouteInfoResponse = serde_json::from_str(body).expect("route info");
        assert!(info.fallback);
        assert_eq!(info.routes[0].distance_km, 3.2);
        assert_eq!(info.routes[0].coordinates[1], Coordinate::new(17.5, 78.5));
    }

    #[test]
    fn prediction_without_weather_snapshot_decodes() {
        let response: PredictionResponse =
            serde_json::from_str(r#"{"delay_minutes": 4.5}"#).expect("prediction");
        assert_eq!(response.delay_minutes, 4.5);
        assert!(response.weather_used.is_none());
    }
}
