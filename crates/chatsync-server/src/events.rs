use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;

use crate::api::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// GET /api/events
///
/// Each connection is one bus subscriber. The first event is always
/// `connected`; closing the connection drops the subscription.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = state.documents().bus().subscribe();
    tracing::info!(subscriber = subscription.id(), "event stream opened");

    let stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            yield Ok::<_, Infallible>(Event::default().data(event.to_json()));
        }
        tracing::debug!(subscriber = subscription.id(), "event stream ended by bus");
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}
