//! Heartbeat endpoint.
//!
//! Each request opens a Server-Sent Events stream that emits
//! `data: heartbeat` once per interval. The stream ends when:
//!
//! - the client goes away (hyper drops the body, which drops the session),
//! - a write fails (same path, the body is dropped),
//! - the [`ShutdownBroadcast`] fires.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_stream::stream;
use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use futures_util::Stream;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use super::LiveReload;
use super::shutdown::ShutdownBroadcast;

/// Payload of every heartbeat event.
pub const HEARTBEAT_DATA: &str = "heartbeat";

const EVENT_STREAM: &str = "text/event-stream";

/// Handle GET on the heartbeat route.
pub(crate) async fn heartbeat_handler(State(live_reload): State<LiveReload>) -> impl IntoResponse {
    let session = Session::start(live_reload.session_counter());
    let stream = heartbeat_stream(
        session,
        live_reload.shutdown().clone(),
        live_reload.heartbeat_interval(),
    );

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        ],
        Sse::new(stream),
    )
}

/// One client connection. Dropping it ends the session.
struct Session {
    id: Uuid,
    started: Instant,
    beats: u64,
    active: Arc<AtomicUsize>,
}

impl Session {
    fn start(active: Arc<AtomicUsize>) -> Self {
        let id = Uuid::new_v4();
        let count = active.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(session = %id, active = count, "Heartbeat session started");
        Self {
            id,
            started: Instant::now(),
            beats: 0,
            active,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let remaining = self.active.fetch_sub(1, Ordering::AcqRel) - 1;
        tracing::debug!(
            session = %self.id,
            beats = self.beats,
            elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0,
            active = remaining,
            "Heartbeat session ended"
        );
    }
}

/// Emit one heartbeat per `period` until `shutdown` fires.
///
/// The first heartbeat is sent one full period after connecting.
fn heartbeat_stream(
    session: Session,
    shutdown: ShutdownBroadcast,
    period: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream! {
        let mut session = session;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let fired = tokio::select! {
                biased;
                () = shutdown.wait() => true,
                _ = ticker.tick() => false,
            };
            if fired {
                tracing::debug!(session = %session.id, "Closing heartbeat stream on shutdown");
                break;
            }

            session.beats += 1;
            yield Ok(Event::default().data(HEARTBEAT_DATA));
        }
    }
}
