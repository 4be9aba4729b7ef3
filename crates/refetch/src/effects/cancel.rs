use std::future::{Future, pending};

use futures_util::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::effects::http::BodyStream;
use crate::error::{Error, Result};

/// Cooperative cancellation for one download.
///
/// Combines an optional caller-owned token with an optional deadline. Every
/// network suspension point of the engine races against [`Cancellation::fired`];
/// whichever finishes first wins and the loser is dropped.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    token:    Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self { Self::default() }

    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
            || self.deadline.is_some_and(|d| d <= Instant::now())
    }

    /// Resolves with the reason once the token is cancelled or the deadline
    /// passes. Never resolves when neither is set.
    pub async fn fired(&self) -> Error {
        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Error::Cancelled,
            _ = expired => Error::DeadlineExceeded,
        }
    }

    /// Runs `fut` unless cancellation fires first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            e = self.fired() => Err(e),
            out = fut => out,
        }
    }

    /// Wraps `body` so that cancellation surfaces as an error item, after
    /// which the stream ends. A chunk or end of stream that is already ready
    /// wins over cancellation, so a body that finished is never failed.
    pub fn guard(&self, body: BodyStream) -> BodyStream {
        if self.token.is_none() && self.deadline.is_none() {
            return body;
        }

        let state = (body, self.clone(), false);
        Box::pin(futures_util::stream::unfold(state, |(mut body, cancel, done)| async move {
            if done {
                return None;
            }
            tokio::select! {
                biased;
                next = body.next() => next.map(|item| (item, (body, cancel, false))),
                e = cancel.fired() => Some((Err(e), (body, cancel, true))),
            }
        }))
    }
}
