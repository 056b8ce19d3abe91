use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use serde::Serialize;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::dto::events::{DashboardEvent, MatchEvent};

/// Payload deliverable on an SSE stream: serializable, with a stable event
/// name used as the SSE `event:` field.
pub trait StreamEvent: Clone + Serialize + Send + 'static {
    fn event_name(&self) -> &'static str;
}

impl StreamEvent for DashboardEvent {
    fn event_name(&self) -> &'static str {
        self.name()
    }
}

impl StreamEvent for MatchEvent {
    fn event_name(&self) -> &'static str {
        self.name()
    }
}

/// Convert a topic subscription into an SSE response: the snapshot events
/// first, then the live feed, until the client goes away.
///
/// Publishers never wait for this path. A subscriber that falls behind its
/// bounded buffer loses its oldest unread events and receives a `resync`
/// marker instructing it to fetch a fresh snapshot.
pub fn to_sse_stream<E: StreamEvent + Sync>(
    initial: Vec<E>,
    receiver: broadcast::Receiver<E>,
    on_disconnect: impl FnOnce() + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Small bounded channel between the forwarder task and the response.
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        pump(&tx, initial, receiver).await;
        on_disconnect();
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Forward snapshot and live events into the response channel until either
/// side disconnects.
async fn pump<E: StreamEvent>(
    tx: &mpsc::Sender<Result<Event, Infallible>>,
    initial: Vec<E>,
    mut receiver: broadcast::Receiver<E>,
) {
    for event in &initial {
        if !forward(tx, event).await {
            return;
        }
    }

    loop {
        tokio::select! {
            _ = tx.closed() => break,
            received = receiver.recv() => match received {
                Ok(event) => {
                    if !forward(tx, &event).await {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(missed)) => {
                    if !forward_resync(tx, missed).await {
                        break;
                    }
                }
            }
        }
    }
}

/// Serialize one event into the SSE channel; `false` once the client is gone.
async fn forward<E: StreamEvent>(tx: &mpsc::Sender<Result<Event, Infallible>>, event: &E) -> bool {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(event = event.event_name(), error = %err, "failed to serialize stream event");
            return true;
        }
    };
    tx.send(Ok(Event::default().event(event.event_name()).data(payload)))
        .await
        .is_ok()
}

/// Tell an overflowed subscriber how many events it missed and that it
/// should reload a snapshot.
async fn forward_resync(tx: &mpsc::Sender<Result<Event, Infallible>>, missed: u64) -> bool {
    let marker = Event::default()
        .event("resync")
        .data(format!(r#"{{"missed":{missed}}}"#));
    tx.send(Ok(marker)).await.is_ok()
}
