//! Bounded hand-off between the ingest task and the UI loop.
//!
//! When the queue is full the producer waits up to the configured
//! backpressure timeout for the consumer to make room, then drops the record
//! it was trying to push. Records already queued are never discarded.

use crate::record::ChatRecord;
use std::time::Duration;
use tokio::sync::mpsc::{
    self,
    error::{SendTimeoutError, TryRecvError, TrySendError},
};

pub const DEFAULT_CAPACITY: usize = 1024;
pub const DEFAULT_BACKPRESSURE: Duration = Duration::from_secs(1);

pub fn channel(capacity: usize, backpressure: Duration) -> (RecordSender, RecordReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        RecordSender { tx, backpressure },
        RecordReceiver {
            rx,
            disconnected: false,
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Still full after the backpressure timeout.
    Dropped,
    /// The consumer is gone.
    Closed,
}

#[derive(Debug)]
pub struct RecordSender {
    tx: mpsc::Sender<ChatRecord>,
    backpressure: Duration,
}

impl RecordSender {
    pub async fn deliver(&self, record: ChatRecord) -> Delivery {
        match self.tx.try_send(record) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
            Err(TrySendError::Full(record)) => {
                match self.tx.send_timeout(record, self.backpressure).await {
                    Ok(()) => Delivery::Queued,
                    Err(SendTimeoutError::Timeout(_)) => Delivery::Dropped,
                    Err(SendTimeoutError::Closed(_)) => Delivery::Closed,
                }
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Default)]
pub struct Drain {
    pub records: Vec<ChatRecord>,
    /// The producer has exited and every queued record has been taken.
    pub disconnected: bool,
}

#[derive(Debug)]
pub struct RecordReceiver {
    rx: mpsc::Receiver<ChatRecord>,
    disconnected: bool,
}

impl RecordReceiver {
    /// Takes everything queued right now without waiting.
    pub fn drain(&mut self) -> Drain {
        let mut drain = Drain::default();
        if self.disconnected {
            drain.disconnected = true;
            return drain;
        }
        loop {
            match self.rx.try_recv() {
                Ok(record) => drain.records.push(record),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    drain.disconnected = true;
                    break;
                }
            }
        }
        drain
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}
