//! Channel handlers: list, inspect, submit commands.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{ChannelListResponse, SubmitCommandRequest, SubmitCommandResponse};
use crate::app_state::AppState;
use crate::domain::{ChannelSnapshot, Command};
use crate::error::{ChannelError, ErrorResponse};

/// `GET /channels`: List all channels.
#[utoipa::path(
    get,
    path = "/api/v1/channels",
    tag = "Channels",
    summary = "List channels",
    description = "Returns a summary of every registered channel, ordered by name. Event logs are omitted.",
    responses(
        (status = 200, description = "Channel summaries", body = ChannelListResponse),
    )
)]
pub async fn list_channels(State(state): State<AppState>) -> impl IntoResponse {
    let channels = state.registry.list().await;
    Json(ChannelListResponse {
        total: channels.len(),
        channels,
    })
}

/// `GET /channels/{name}`: Full snapshot of one channel.
///
/// # Errors
///
/// Returns [`ChannelError::UnknownChannel`] if no channel has that name.
#[utoipa::path(
    get,
    path = "/api/v1/channels/{name}",
    tag = "Channels",
    summary = "Get channel snapshot",
    description = "Returns connection state, pending action, last message, last state object and the event log (newest first).",
    params(
        ("name" = String, Path, description = "Channel name"),
    ),
    responses(
        (status = 200, description = "Channel snapshot", body = ChannelSnapshot),
        (status = 404, description = "Channel not found", body = ErrorResponse),
    )
)]
pub async fn get_channel(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ChannelSnapshot>, ChannelError> {
    let channel = state.registry.get(&name).await?;
    Ok(Json(channel.snapshot()))
}

/// `POST /channels/{name}/commands`: Send or queue a command.
///
/// # Errors
///
/// Returns [`ChannelError`] for unknown, receive-only or shut-down channels
/// and for commands without a string `type`.
#[utoipa::path(
    post,
    path = "/api/v1/channels/{name}/commands",
    tag = "Channels",
    summary = "Submit a command",
    description = "Sends the command if the channel is open, otherwise queues it for delivery on the next open. With `action` set, the command becomes the channel's pending action.",
    params(
        ("name" = String, Path, description = "Channel name"),
    ),
    request_body = SubmitCommandRequest,
    responses(
        (status = 202, description = "Command sent or queued", body = SubmitCommandResponse),
        (status = 400, description = "Invalid command", body = ErrorResponse),
        (status = 404, description = "Channel not found", body = ErrorResponse),
        (status = 409, description = "Channel is receive-only or shut down", body = ErrorResponse),
    )
)]
pub async fn submit_command(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SubmitCommandRequest>,
) -> Result<impl IntoResponse, ChannelError> {
    let channel = state.registry.get(&name).await?;
    let command = Command::try_from(req.command)?;

    let outcome = match req.action.filter(|a| !a.trim().is_empty()) {
        Some(action) => channel.issue(action, command).await?,
        None => channel.send(command).await?,
    };
    tracing::debug!(channel = %name, ?outcome, "command submitted");

    let pending = channel.snapshot().pending.map(|p| p.tag);
    Ok((
        axum::http::StatusCode::ACCEPTED,
        Json(SubmitCommandResponse {
            channel: name,
            outcome,
            pending,
        }),
    ))
}

/// Channel routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/channels", get(list_channels))
        .route("/channels/{name}", get(get_channel))
        .route("/channels/{name}/commands", post(submit_command))
}
