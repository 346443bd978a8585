use crate::state::MadrassaState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use std::convert::Infallible;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

/// Which collection just changed. Fragments listen with `hx-trigger="sse:<name>"` and re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseEvent {
    Students,
    Courses,
    Attendance,
    Grades,
    Payments,
    Events,
    Admissions,
    Communications,
}

impl SseEvent {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Courses => "courses",
            Self::Attendance => "attendance",
            Self::Grades => "grades",
            Self::Payments => "payments",
            Self::Events => "events",
            Self::Admissions => "admissions",
            Self::Communications => "communications",
        }
    }
}

pub async fn sse_feed(
    State(state): State<MadrassaState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.subscribe_to_sse_feed()).filter_map(|event| match event {
        Ok(event) => Some(Ok(Event::default().event(event.name()).data(event.name()))),
        Err(e) => {
            //a lagging browser just misses a refresh or two
            debug!(?e, "SSE subscriber lagged");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
