//! Async record consumer
//!
//! Single logical consumer between the record producers and the engine.
//! Updates happen strictly one record at a time.

use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use super::engine::{MetricsEngine, RunOutcome};
use super::error::MetricsError;
use super::summary::MetricsSummary;
use crate::records::ParsedResponseRecord;

/// Drain `records` into `engine` until the channel closes or `shutdown` fires.
///
/// A shutdown finalizes the records seen so far as a partial run.
pub async fn consume(
    mut engine: MetricsEngine,
    mut records: mpsc::Receiver<ParsedResponseRecord>,
    shutdown: Arc<Notify>,
) -> Result<MetricsSummary, MetricsError> {
    info!(run_id = %engine.run_id(), "Record consumer started");

    let outcome = loop {
        tokio::select! {
            biased;

            _ = shutdown.notified() => {
                warn!(
                    records = engine.records_processed(),
                    "Shutdown requested, finalizing partial run"
                );
                break RunOutcome::Cancelled;
            }

            next = records.recv() => match next {
                Some(record) => engine.process(&record)?,
                None => break RunOutcome::Completed,
            },
        }
    };

    engine.finalize(outcome)
}
