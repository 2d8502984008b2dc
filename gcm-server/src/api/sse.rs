//! Server-Sent Events for project change notification

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actor::Actor;
use crate::error::ApiResult;
use crate::{db, AppState};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// GET /api/projects/:id/events
///
/// Streams every event of one project. Slow clients that fall behind the
/// bus capacity skip the missed events and keep streaming.
pub async fn project_event_stream(
    State(state): State<AppState>,
    actor: Actor,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    db::projects::require(&state.db, project_id).await?;
    info!(%project_id, user = %actor.user_id, "SSE client connected");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) if event.project_id() == project_id => {
                            let event_type = event.event_type();
                            match serde_json::to_string(&event) {
                                Ok(json) => yield Ok(Event::default().event(event_type).data(json)),
                                Err(e) => warn!("SSE: Failed to serialize event {}: {}", event_type, e),
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(%project_id, skipped, "SSE: Client lagged, events dropped");
                        }
                        Err(RecvError::Closed) => {
                            info!(%project_id, "SSE: Event bus closed");
                            break;
                        }
                    }
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat")))
}

/// Build event stream routes
pub fn event_routes() -> Router<AppState> {
    Router::new().route("/api/projects/:id/events", get(project_event_stream))
}
