//! Sending generated requests through a transport
//!
//! The engine does not speak HTTP itself. A [`RequestSender`] receives each
//! generated head/body pair; the replay loop records every exchange, counts
//! successes and failures, and stops early on cancellation, on a must-stop
//! transport error, or after too many errors in a row.

use crate::config::FuzzerConfig;
use crate::generator::FuzzyGenerator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Raw response handed back by a sender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Status line and headers
    pub head: String,
    pub body: String,
}

/// Transport failure for a single request
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    /// This request failed; keep sending the rest
    #[error("Request failed: {0}")]
    Request(String),

    /// The transport cannot continue; stop sending
    #[error("Sending must stop: {0}")]
    MustStop(String),
}

/// Sends one raw request
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(&self, head: &str, body: &str) -> Result<RawResponse, TransportError>;
}

/// One request together with what came back
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exchange {
    /// Position of the request in generation order
    pub index: usize,
    pub head: String,
    pub body: String,
    pub response: Option<RawResponse>,
    pub error: Option<String>,
}

/// Why a replay ended before the last request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    MustStop(String),
    TooManyErrors(u32),
}

/// Result of replaying a generator
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub ok: usize,
    pub errors: usize,
    pub stopped: Option<StopReason>,
    pub exchanges: Vec<Exchange>,
}

impl ReplayOutcome {
    /// "N ok, M errors"
    pub fn summary(&self) -> String {
        format!("{} ok, {} errors", self.ok, self.errors)
    }

    /// Responses that actually arrived
    pub fn responses(&self) -> impl Iterator<Item = &RawResponse> {
        self.exchanges.iter().filter_map(|exchange| exchange.response.as_ref())
    }

    /// Forget all recorded exchanges and counters
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Send every request of `generator` through `sender`, one at a time
pub async fn replay(
    generator: &FuzzyGenerator,
    sender: &dyn RequestSender,
    config: &FuzzerConfig,
    cancel: &CancellationToken,
) -> ReplayOutcome {
    let mut outcome = ReplayOutcome::default();
    let mut consecutive_errors = 0u32;

    info!(requests = generator.count(), "Starting replay");

    for (index, request) in generator.generate_with_cancel(cancel.clone()).enumerate() {
        let result = sender.send(&request.head, &request.body).await;

        let mut exchange = Exchange {
            index,
            head: request.head,
            body: request.body,
            response: None,
            error: None,
        };

        match result {
            Ok(response) => {
                debug!(index, status = response.status, "Request sent");
                outcome.ok += 1;
                consecutive_errors = 0;
                exchange.response = Some(response);
                outcome.exchanges.push(exchange);
            }
            Err(TransportError::Request(reason)) => {
                debug!(index, %reason, "Request failed");
                outcome.errors += 1;
                consecutive_errors += 1;
                exchange.error = Some(reason);
                outcome.exchanges.push(exchange);

                let limit = config.stop_after_consecutive_errors;
                if limit > 0 && consecutive_errors >= limit {
                    warn!(errors = consecutive_errors, "Too many consecutive errors, stopping");
                    outcome.stopped = Some(StopReason::TooManyErrors(consecutive_errors));
                    break;
                }
            }
            Err(TransportError::MustStop(reason)) => {
                warn!(index, %reason, "Stopped sending requests");
                outcome.errors += 1;
                exchange.error = Some(reason.clone());
                outcome.exchanges.push(exchange);
                outcome.stopped = Some(StopReason::MustStop(reason));
                break;
            }
        }
    }

    if outcome.stopped.is_none() && cancel.is_cancelled() {
        outcome.stopped = Some(StopReason::Cancelled);
    }

    info!(
        ok = outcome.ok,
        errors = outcome.errors,
        stopped = ?outcome.stopped,
        "Replay finished"
    );

    outcome
}
