use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::advisor::{now_ms, AdviseRequest, Advisory, TrafficAdvisor};
use crate::error::ValidationError;
use crate::format::{self, OutputFormat};
use crate::metrics::{ApproachData, CongestionLevel};

/// Queue length assumed per waiting car when only counts are known.
const QUEUE_METERS_PER_CAR: f64 = 7.5;

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub advisor: Arc<TrafficAdvisor>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/advise", post(advise))
        .route("/quick_advice", get(quick_advice))
        .with_state(state)
}

// ---------- Responses ----------

#[derive(Debug)]
pub enum AdviceBody {
    Text(String),
    Json(Value),
}

impl AdviceBody {
    fn render(advisory: &Advisory, format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => AdviceBody::Text(format::to_plain_text(advisory)),
            OutputFormat::Json => AdviceBody::Json(format::to_json(advisory)),
        }
    }
}

impl IntoResponse for AdviceBody {
    fn into_response(self) -> Response {
        match self {
            AdviceBody::Text(text) => text.into_response(),
            AdviceBody::Json(value) => Json(value).into_response(),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::info!("rejected request: {}", self.message);
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ---------- Handlers ----------

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "system": "Adaptive Traffic Signal Advisory System",
        "version": env!("CARGO_PKG_VERSION"),
        "area_type": state.advisor.area_type(),
        "endpoints": {
            "GET /": "This information",
            "GET /health": "Service health check",
            "POST /advise": "Signal timing recommendations for the posted approaches",
            "GET /quick_advice": "Recommendations from per-direction car counts",
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "signal_advisor",
        "timestamp_ms": now_ms(),
    }))
}

async fn advise(
    State(state): State<AppState>,
    payload: Result<Json<AdviseRequest>, JsonRejection>,
) -> Result<AdviceBody, ApiError> {
    let Json(request) = payload?;
    let format = request.format;
    tracing::debug!("advise: {} approaches", request.approaches.len());

    let advisory = state.advisor.process(request)?;
    Ok(AdviceBody::render(&advisory, format))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct QuickAdviceQuery {
    pub north_cars: u32,
    pub south_cars: u32,
    pub east_cars: u32,
    pub west_cars: u32,
    pub congestion: Option<CongestionLevel>,
}

impl QuickAdviceQuery {
    /// One single-lane approach per direction that has cars waiting.
    fn approaches(&self) -> Vec<ApproachData> {
        let congestion = self.congestion.unwrap_or(CongestionLevel::Stable);
        [
            ("N", self.north_cars),
            ("S", self.south_cars),
            ("E", self.east_cars),
            ("W", self.west_cars),
        ]
        .into_iter()
        .filter(|(_, cars)| *cars > 0)
        .map(|(id, cars)| ApproachData {
            approach_id: id.to_string(),
            vehicle_counts: [("car".to_string(), cars)].into_iter().collect(),
            queue_length: f64::from(cars) * QUEUE_METERS_PER_CAR,
            lanes: 1,
            congestion_level: congestion,
            pedestrian_count: 2,
            current_green_time: 30.0,
            link_length: None,
        })
        .collect()
    }
}

async fn quick_advice(
    State(state): State<AppState>,
    query: Result<Query<QuickAdviceQuery>, QueryRejection>,
) -> Result<AdviceBody, ApiError> {
    let Query(query) = query?;
    let approaches = query.approaches();
    if approaches.is_empty() {
        return Err(ApiError::bad_request("No traffic data provided"));
    }

    let advisory = state.advisor.process(AdviseRequest {
        approaches,
        current_cycle_time: None,
        emergency_vehicle_present: false,
        time_of_day: None,
        format: OutputFormat::Text,
    })?;
    Ok(AdviceBody::render(&advisory, OutputFormat::Text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AreaType, PolicyConfig};

    fn state() -> AppState {
        let advisor = TrafficAdvisor::new(Arc::new(PolicyConfig::default()), AreaType::Urban)
            .unwrap()
            .with_allowed_approaches(["N", "S", "E", "W"]);
        AppState {
            advisor: Arc::new(advisor),
        }
    }

    fn request(body: Value) -> AdviseRequest {
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn advise_returns_json_when_asked() {
        let req = request(json!({
            "approaches": [
                {
                    "approach_id": "N",
                    "vehicle_counts": {"car": 10, "motorcycle": 5},
                    "queue_length": 75.5,
                    "lanes": 2,
                    "congestion_level": "congested",
                    "pedestrian_count": 8,
                    "current_green_time": 30,
                    "link_length": 100
                },
                {
                    "approach_id": "S",
                    "vehicle_counts": {"car": 5, "bus": 2},
                    "queue_length": 40.0,
                    "lanes": 1,
                    "congestion_level": "stable",
                    "pedestrian_count": 3,
                    "current_green_time": 25,
                    "link_length": 80
                }
            ],
            "current_cycle_time": 120,
            "format": "json"
        }));

        let body = advise(State(state()), Ok(Json(req))).await.unwrap();

        let AdviceBody::Json(value) = body else {
            panic!("expected json body");
        };
        assert_eq!(value["status"], "success");
        let per_approach = value["signal_timings"]["per_approach"].as_object().unwrap();
        let keys: Vec<_> = per_approach.keys().map(String::as_str).collect();
        assert_eq!(keys, ["N", "S"]);
        assert!(value["analysis"]["spillback_risks"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn advise_defaults_to_text() {
        let req = request(json!({
            "approaches": [{
                "approach_id": "E",
                "vehicle_counts": {"car": 4},
                "queue_length": 10,
                "lanes": 1,
                "congestion_level": "free",
                "pedestrian_count": 0,
                "current_green_time": 20
            }]
        }));

        let body = advise(State(state()), Ok(Json(req))).await.unwrap();

        let AdviceBody::Text(text) = body else {
            panic!("expected text body");
        };
        assert!(text.contains("Approach E: 115.0 seconds green"));
    }

    #[tokio::test]
    async fn advise_rejects_unknown_approach() {
        let req = request(json!({
            "approaches": [{
                "approach_id": "NE",
                "vehicle_counts": {},
                "queue_length": 0,
                "lanes": 1,
                "congestion_level": "free",
                "pedestrian_count": 0,
                "current_green_time": 20
            }]
        }));

        let err = advise(State(state()), Ok(Json(req))).await.unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("NE"));
    }

    #[tokio::test]
    async fn quick_advice_skips_empty_directions() {
        let query = QuickAdviceQuery {
            north_cars: 12,
            east_cars: 4,
            ..QuickAdviceQuery::default()
        };
        assert_eq!(query.approaches().len(), 2);
        assert_eq!(query.approaches()[0].queue_length, 90.0);

        let body = quick_advice(State(state()), Ok(Query(query))).await.unwrap();
        let AdviceBody::Text(text) = body else {
            panic!("expected text body");
        };
        assert!(text.contains("Approach N:"));
        assert!(text.contains("Approach E:"));
        assert!(!text.contains("Approach S:"));
    }

    #[tokio::test]
    async fn quick_advice_without_traffic_is_rejected() {
        let err = quick_advice(State(state()), Ok(Query(QuickAdviceQuery::default())))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let Json(value) = health().await;
        assert_eq!(value["status"], "healthy");
    }
}
