use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tokio::sync::mpsc;

/// Default lane count. With hour windows there are only 24 distinct bucket
/// ids, so raising this above the bucket cardinality starves lanes; keep
/// the lane count and the bucket-id scheme in sync.
pub const DEFAULT_PARTITIONS: usize = 8;
pub const DEFAULT_BUFFER: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,
}

/// Fixed set of bounded FIFO lanes with hash-routed publish.
///
/// A partition key always maps to the same lane (FNV-1a 32-bit of the key,
/// digest bytes read little-endian, modulo the lane count), so events
/// sharing a key are delivered in publication order to a single reader
/// while unrelated keys proceed in parallel. A full lane blocks the
/// publisher; that is the engine's only backpressure mechanism.
///
/// `bounded` hands back one receiver per lane; each must be read by exactly
/// one consumer. After `close`, queued elements remain readable until the
/// lanes are drained.
pub struct PartitionedQueue<T> {
    partitions: usize,
    lanes: RwLock<Option<Vec<mpsc::Sender<T>>>>,
}

impl<T> PartitionedQueue<T> {
    pub fn bounded(partitions: usize, buffer: usize) -> (Self, Vec<mpsc::Receiver<T>>) {
        assert!(partitions > 0, "partition count must be positive");
        let mut senders = Vec::with_capacity(partitions);
        let mut receivers = Vec::with_capacity(partitions);
        for _ in 0..partitions {
            let (tx, rx) = mpsc::channel(buffer);
            senders.push(tx);
            receivers.push(rx);
        }
        (
            Self {
                partitions,
                lanes: RwLock::new(Some(senders)),
            },
            receivers,
        )
    }

    pub fn with_defaults() -> (Self, Vec<mpsc::Receiver<T>>) {
        Self::bounded(DEFAULT_PARTITIONS, DEFAULT_BUFFER)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions
    }

    /// Publishes `msg` to the lane selected by `partition_key`, waiting for
    /// capacity when the lane is full.
    pub async fn publish(&self, partition_key: &str, msg: T) -> Result<(), QueueError> {
        let tx = {
            let guard = self
                .lanes
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let senders = guard.as_ref().ok_or(QueueError::Closed)?;
            senders[partition_index(partition_key, self.partitions)].clone()
        };
        tx.send(msg).await.map_err(|_| QueueError::Closed)
    }

    /// Closes every lane. Receivers keep yielding queued elements until
    /// their lane is drained, then observe end-of-stream.
    pub fn close(&self) {
        *self
            .lanes
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Lane index for a partition key: FNV-1a 32-bit, digest bytes interpreted
/// little-endian, modulo the lane count.
pub(crate) fn partition_index(key: &str, partitions: usize) -> usize {
    let digest = fnv1a_32(key.as_bytes());
    // The canonical digest byte order is big-endian; reading those bytes
    // little-endian is a byte swap of the hash value.
    (digest.swap_bytes() as usize) % partitions
}

fn fnv1a_32(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
