//! Server-Sent Events transport for the realtime hub.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use tracing::{debug, warn};
use utoipa::IntoParams;

use crate::{errors::ServiceError, events::Room, AppState};

pub fn realtime_routes() -> Router<AppState> {
    Router::new().route("/", get(subscribe))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RealtimeQuery {
    /// Comma-separated room names, e.g. `branch:{id}:kitchen,branch:{id}`
    pub rooms: String,
}

pub fn parse_rooms(raw: &str) -> Result<Vec<Room>, ServiceError> {
    let rooms = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<Room>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    if rooms.is_empty() {
        return Err(ServiceError::ValidationError(
            "at least one room required".to_string(),
        ));
    }
    Ok(rooms)
}

#[utoipa::path(
    get,
    path = "/api/v1/realtime",
    summary = "Subscribe to lifecycle events",
    description = "Event stream of the joined rooms. Delivery is best effort with no replay; \
                   re-fetch orders after reconnecting.",
    params(RealtimeQuery),
    responses(
        (status = 200, description = "text/event-stream of lifecycle events", body = crate::events::LifecycleEvent, content_type = "text/event-stream"),
        (status = 400, description = "Malformed room name", body = crate::errors::ErrorResponse),
    ),
    tag = "realtime"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Query(query): Query<RealtimeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    let rooms = parse_rooms(&query.rooms)?;
    let subscription = state.hub.subscribe(rooms);
    debug!(connection_id = subscription.id(), "Realtime subscriber attached");

    // the subscription lives inside the stream; dropping the response leaves the rooms
    let events = stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        let frame = Event::default()
            .event(event.kind.as_ref())
            .id(format!("{}:{}", event.order_id, event.updated_at.timestamp_micros()))
            .json_data(&*event)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to encode lifecycle event");
                Event::default().comment("encoding error")
            });
        Some((Ok(frame), subscription))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
