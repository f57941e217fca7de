use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use contour_core::{ContourError, ContourRequest, Limits, UnitRegistry, UnitSystem};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const BIND_ADDR_VAR: &str = "CONTOUR_BIND_ADDR";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Server settings read from the environment.
#[derive(Debug, Clone, PartialEq)]
struct ServerConfig {
    addr: SocketAddr,
    /// Ceiling for the limits a request may ask for.
    limits: Limits,
}

impl ServerConfig {
    fn from_env() -> Result<Self, std::net::AddrParseError> {
        Self::from_value(std::env::var(BIND_ADDR_VAR).ok())
    }

    fn from_value(value: Option<String>) -> Result<Self, std::net::AddrParseError> {
        let addr = value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_BIND_ADDR)
            .parse()?;
        Ok(Self {
            addr,
            limits: Limits::default(),
        })
    }
}

/// Format a pipeline error as the JSON body sent to clients
fn format_error(err: &ContourError) -> serde_json::Value {
    json!({
        "code": err.code(),
        "message": err.to_string(),
        "span": err.span(),
        "detail": err,
    })
}

// Application State
struct AppState {
    registry: UnitRegistry,
    limits: Limits,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env()?;
    let shared_state = Arc::new(AppState {
        registry: UnitRegistry::new(),
        limits: config.limits,
    });

    let app = router(shared_state);

    info!("listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/evaluate", post(evaluate))
        .route("/units", get(describe_unit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "Contour backend"
}

async fn evaluate(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<ContourRequest>,
) -> Response {
    info!(expression = %request.expression, "evaluate request");
    request.limits = Some(
        request
            .limits
            .map_or(state.limits, |asked| asked.capped(state.limits)),
    );

    // Grid evaluation is CPU-bound; keep it off the async workers.
    let worker = Arc::clone(&state);
    let outcome =
        tokio::task::spawn_blocking(move || request.evaluate_with(&worker.registry)).await;

    match outcome {
        Ok(Ok(dataset)) => Json(dataset).into_response(),
        Ok(Err(err)) => {
            warn!("Evaluation failed: {}", err);
            (StatusCode::UNPROCESSABLE_ENTITY, Json(format_error(&err))).into_response()
        }
        Err(join_err) => {
            warn!("Evaluation task failed: {}", join_err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "code": "internal_error",
                    "message": join_err.to_string(),
                })),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize)]
struct UnitQuery {
    expr: String,
}

/// Parse a unit expression and report its dimension and SI scale.
async fn describe_unit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UnitQuery>,
) -> Response {
    match state.registry.parse(&query.expr) {
        Ok(unit) => Json(json!({
            "symbol": unit.to_string(),
            "dimension": unit.dimension().to_string(),
            "scale": unit.scale(),
            "offset": unit.offset(),
        }))
        .into_response(),
        Err(err) => {
            let err = ContourError::from(err);
            (StatusCode::UNPROCESSABLE_ENTITY, Json(format_error(&err))).into_response()
        }
    }
}
