use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, Request, State, rejection::BytesRejection},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use kibble_core::error::LedgerError;
use kibble_core::models::{DailyStatus, FeedingReceipt};
use kibble_core::service::Ledger;
use kibble_core::store::Store;

const BODY_LIMIT: usize = 64 * 1024;

pub type SharedLedger = Arc<Mutex<Ledger<Box<dyn Store>>>>;

#[derive(Clone)]
struct AppState {
    ledger: SharedLedger,
}

// --- Request / Response types ---

#[derive(Default, Deserialize)]
struct StatusRequest {
    password: Option<String>,
}

/// Weights stay raw JSON so that strings or nulls surface as a ledger
/// validation error instead of a deserialization failure.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedRequest {
    password: Option<String>,
    weight_before: Option<Value>,
    weight_after: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordCheckResponse {
    password_set: bool,
}

#[derive(Serialize)]
struct FeedResponse {
    success: bool,
    #[serde(flatten)]
    receipt: FeedingReceipt,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    Rejected(StatusCode, String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Rejected(status, msg) => (status, msg),
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AuthRequired | LedgerError::AuthInvalid => {
                Self::Unauthorized(err.to_string())
            }
            LedgerError::InvalidInput(msg) => Self::BadRequest(msg),
            LedgerError::Internal(err) => Self::Internal(err),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        Self::Rejected(rejection.status(), rejection.body_text())
    }
}

// --- Extractors ---

/// A JSON request body that falls back to `T::default()`.
///
/// Requests without a body, or without an `application/json` content type,
/// read as `{}` and go on to the password gate. Unparsable JSON is a 400.
struct JsonBody<T>(T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"));
        let bytes = Bytes::from_request(req, state).await?;

        if !is_json || bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
    }
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    response
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

// --- Handlers ---

/// Run a ledger operation on the blocking pool while holding the store lock,
/// so one request's load-mutate-save finishes before the next one starts.
async fn with_ledger<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Ledger<Box<dyn Store>>) -> Result<T, LedgerError> + Send + 'static,
{
    let ledger = Arc::clone(&state.ledger);
    let result = tokio::task::spawn_blocking(move || {
        let ledger = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        op(&ledger)
    })
    .await
    .context("ledger task failed")?;
    Ok(result?)
}

fn number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

async fn check_password(
    State(state): State<AppState>,
) -> Result<Json<PasswordCheckResponse>, ApiError> {
    let password_set = with_ledger(&state, |ledger| ledger.password_set()).await?;
    Ok(Json(PasswordCheckResponse { password_set }))
}

async fn get_status(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<StatusRequest>,
) -> Result<Json<DailyStatus>, ApiError> {
    let status =
        with_ledger(&state, move |ledger| ledger.status(req.password.as_deref())).await?;
    Ok(Json(status))
}

async fn feed(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<FeedRequest>,
) -> Result<Json<FeedResponse>, ApiError> {
    let weight_before = number(req.weight_before.as_ref());
    let weight_after = number(req.weight_after.as_ref());
    let receipt = with_ledger(&state, move |ledger| {
        ledger.record_feeding(req.password.as_deref(), weight_before, weight_after)
    })
    .await?;
    Ok(Json(FeedResponse {
        success: true,
        receipt,
    }))
}

async fn health() -> &'static str {
    "ok"
}

// --- Router builder ---

fn build_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let mut router = Router::new()
        .route("/api/check-password", get(check_password))
        .route("/api/status", post(get_status))
        .route("/api/feed", post(feed))
        .route("/health", get(health));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(cors_layer())
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    ledger: Ledger<Box<dyn Store>>,
    port: u16,
    bind: &str,
    static_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if !ledger.password_set()? {
        warn!("No password set yet. The first client to submit one claims this tracker.");
    }

    if let Some(ref dir) = static_dir {
        if !dir.is_dir() {
            anyhow::bail!("Static directory not found: {}", dir.display());
        }
        info!(dir = %dir.display(), "serving static frontend");
    }

    let state = AppState {
        ledger: Arc::new(Mutex::new(ledger)),
    };
    let app = build_router(state, static_dir);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
