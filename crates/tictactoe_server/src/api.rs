//! REST API over the game service.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/v1/games` | All stored games |
//! | POST | `/api/v1/games` | Start a game from `{"board": ...}` |
//! | GET | `/api/v1/games/{game_id}` | One game |
//! | PUT | `/api/v1/games/{game_id}` | Submit a move as `{"board": ...}` |
//! | DELETE | `/api/v1/games/{game_id}` | Remove a game |

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use derive_new::new;
use serde::Deserialize;
use tictactoe_game::{GameError, GameErrorKind};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{Level, Span, error, info_span, instrument, warn};

use crate::GameService;

/// Largest accepted request body, in bytes.
pub const MAX_REQUEST_BODY: usize = 1024;

const APPLICATION_JSON: &str = "application/json";

/// Shared handler state.
#[derive(Debug, Clone, new)]
pub struct AppState {
    service: GameService,
    public_url: String,
}

/// Builds the router with tracing, panic recovery and a body limit.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/games", get(list_games).post(create_game))
        .route(
            "/api/v1/games/{game_id}",
            get(get_game).put(make_move).delete(delete_game),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(request_span)
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CatchPanicLayer::new()),
        )
        .with_state(state)
}

/// Span wrapping each request, including the error response it may end in.
fn request_span(req: &Request<Body>) -> Span {
    info_span!("request", method = %req.method(), uri = %req.uri())
}

/// Runs a blocking service call off the async workers, inside the
/// current span.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, GameError> + Send + 'static,
    T: Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(f))
        .await
        .map_err(|e| {
            GameError::new(
                GameErrorKind::Internal,
                format!("service task failed: {}", e),
            )
        })?
        .map_err(ApiError::from)
}

/// A game error on its way to becoming an HTTP response.
#[derive(Debug, derive_more::From)]
pub struct ApiError(GameError);

/// HTTP status for an error kind.
pub fn status_for(kind: GameErrorKind) -> StatusCode {
    match kind {
        GameErrorKind::InvalidInput | GameErrorKind::InvalidMove => StatusCode::BAD_REQUEST,
        GameErrorKind::NotFound => StatusCode::NOT_FOUND,
        GameErrorKind::Conflict => StatusCode::CONFLICT,
        GameErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        GameErrorKind::TooLarge
        | GameErrorKind::Corrupt
        | GameErrorKind::Io
        | GameErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind);

        // Internal details stay in the log.
        let reason = if status.is_server_error() {
            error!(error = %self.0, %status, "Request failed");
            "internal server error".to_string()
        } else {
            warn!(error = %self.0, %status, "Request rejected");
            self.0.message
        };

        (status, Json(serde_json::json!({ "reason": reason }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct BoardRequest {
    board: String,
}

fn parse_board_request(body: &[u8]) -> Result<BoardRequest, GameError> {
    serde_json::from_slice(body).map_err(|e| {
        GameError::new(
            GameErrorKind::InvalidInput,
            format!("can't parse request: {}", e),
        )
    })
}

fn json_bytes(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, APPLICATION_JSON)], body).into_response()
}

#[instrument(skip(state))]
async fn list_games(State(state): State<AppState>) -> Result<Response, ApiError> {
    let service = state.service.clone();
    let records = blocking(move || service.list_raw()).await?;

    let mut body = Vec::with_capacity(records.iter().map(|r| r.len() + 1).sum::<usize>() + 2);
    body.push(b'[');
    for (idx, record) in records.iter().enumerate() {
        if idx > 0 {
            body.push(b',');
        }
        body.extend_from_slice(record);
    }
    body.push(b']');

    Ok(json_bytes(StatusCode::OK, body))
}

#[instrument(skip(state, body))]
async fn create_game(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let req = parse_board_request(&body)?;
    let service = state.service.clone();
    let game = blocking(move || service.create(&req.board)).await?;

    let location = format!("{}/api/v1/games/{}", state.public_url, game.id());
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location.clone())],
        Json(serde_json::json!({ "location": location })),
    )
        .into_response())
}

#[instrument(skip(state))]
async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Response, ApiError> {
    let service = state.service.clone();
    let raw = blocking(move || service.get_raw(&game_id)).await?;
    Ok(json_bytes(StatusCode::OK, raw))
}

#[instrument(skip(state, body))]
async fn make_move(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = parse_board_request(&body)?;
    let service = state.service.clone();
    let game = blocking(move || service.submit_move(&game_id, &req.board)).await?;
    Ok(json_bytes(StatusCode::OK, game.to_json()?))
}

#[instrument(skip(state))]
async fn delete_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let service = state.service.clone();
    blocking(move || service.delete(&game_id)).await?;
    Ok(StatusCode::OK)
}
