use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use metrics::counter;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument};
use ulid::Ulid;

use crate::error::{panic_message, ServiceError};
use crate::metrics::{METRIC_PARTIAL_INSIGHT_CONSUMED_TOTAL, VALUE_NO_ERROR};
use crate::model::PartialInsightEvent;
use crate::rollup::Aggregator;
use crate::stream::STREAM_PARTIAL_INSIGHT;

/// Drives the aggregation service from the partitioned queue.
///
/// `start` spawns exactly one worker task per queue lane, preserving the
/// single-writer-per-lane discipline the producer's routing establishes.
/// Workers exit when the external shutdown signal fires, when `stop` is
/// called, or when their lane is closed and drained.
pub struct PartialInsightConsumer {
    aggregator: Arc<dyn Aggregator>,
    workers: Vec<JoinHandle<()>>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl PartialInsightConsumer {
    pub fn new(aggregator: Arc<dyn Aggregator>) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            aggregator,
            workers: Vec::new(),
            stop_tx,
            stop_rx,
        }
    }

    /// Spawns one worker per receiver. Each receiver must be the single
    /// reader of its lane.
    pub fn start(
        &mut self,
        receivers: Vec<mpsc::Receiver<PartialInsightEvent>>,
        shutdown: watch::Receiver<bool>,
    ) {
        for (partition, receiver) in receivers.into_iter().enumerate() {
            let aggregator = Arc::clone(&self.aggregator);
            let shutdown = shutdown.clone();
            let stop = self.stop_rx.clone();
            self.workers.push(tokio::spawn(run_partition_worker(
                aggregator, partition, receiver, shutdown, stop,
            )));
        }
    }

    /// Fires the internal stop signal and waits for every worker to exit.
    /// Workers finish their in-flight message and whatever their lane has
    /// already buffered; nothing is aborted. Idempotent.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
    }
}

/// Resolves when the watch observes `true`; never resolves if the sender is
/// dropped without signalling.
async fn wait_signal(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|&fired| fired).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn run_partition_worker(
    aggregator: Arc<dyn Aggregator>,
    partition: usize,
    mut receiver: mpsc::Receiver<PartialInsightEvent>,
    shutdown: watch::Receiver<bool>,
    stop: watch::Receiver<bool>,
) {
    let shutdown = wait_signal(shutdown);
    let stop = wait_signal(stop);
    tokio::pin!(shutdown, stop);

    info!(partition = partition, "Partial insight worker started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = &mut stop => break,
            event = receiver.recv() => {
                match event {
                    Some(event) => consume_event(&aggregator, partition, event).await,
                    None => break,
                }
            }
        }
    }

    // A signal can race against messages already sitting in the lane;
    // handle whatever is buffered so a closed queue always drains fully,
    // then exit.
    while let Ok(event) = receiver.try_recv() {
        consume_event(&aggregator, partition, event).await;
    }

    info!(partition = partition, "Partial insight worker stopped");
}

async fn consume_event(
    aggregator: &Arc<dyn Aggregator>,
    partition: usize,
    event: PartialInsightEvent,
) {
    let message_id = Ulid::new().to_string();
    let span = tracing::info_span!(
        "partial_insight",
        partition = partition,
        message_id = %message_id
    );

    // A panic while rolling up one message must not take the worker down;
    // it is recorded against the panic error code and the worker moves on.
    let outcome = AssertUnwindSafe(aggregator.aggregate(&event))
        .catch_unwind()
        .instrument(span)
        .await;

    match outcome {
        Ok(Ok(())) => {
            counter!(
                METRIC_PARTIAL_INSIGHT_CONSUMED_TOTAL,
                1,
                "stream_id" => STREAM_PARTIAL_INSIGHT,
                "error_code" => VALUE_NO_ERROR
            );
        }
        Ok(Err(err)) => {
            warn!(
                partition = partition,
                error_code = err.code,
                error = %err,
                "Partial insight rollup failed"
            );
            counter!(
                METRIC_PARTIAL_INSIGHT_CONSUMED_TOTAL,
                1,
                "stream_id" => STREAM_PARTIAL_INSIGHT,
                "error_code" => err.code
            );
        }
        Err(payload) => {
            let detail = panic_message(payload);
            error!(
                partition = partition,
                panic = %detail,
                "Consumer panic recovered"
            );
            let err = ServiceError::panic(detail);
            counter!(
                METRIC_PARTIAL_INSIGHT_CONSUMED_TOTAL,
                1,
                "stream_id" => STREAM_PARTIAL_INSIGHT,
                "error_code" => err.code
            );
        }
    }
}
