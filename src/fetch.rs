//! The fetch request/response channel triple.
//!
//! `fetch` returns immediately; the partition streams its answer back
//! through these channels from a background task, matching the source
//! system's "return via channels" API re-architected onto Tokio tasks
//! and `tokio::sync` channels instead of Go goroutines.

use bytes::Bytes;
use futures::stream::{self, Stream};
use tokio::sync::{mpsc, oneshot};

use crate::error::PartitionError;

/// Default bound for the message channel when a request is built via
/// [`FetchRequest::new`]. A slow consumer backpressures the fetch
/// worker, never the writer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// A single `(id, payload)` pair, delivered in visit order.
pub type FetchedMessage = (u64, Bytes);

/// A request to stream messages starting at `start_id`.
pub struct FetchRequest {
    pub start_id: u64,
    pub count: usize,
    /// `+1` for ascending, `-1` for descending. Defaults to `+1`.
    pub direction: i8,
    pub(crate) start_tx: oneshot::Sender<usize>,
    pub(crate) message_tx: mpsc::Sender<FetchedMessage>,
    pub(crate) error_tx: oneshot::Sender<PartitionError>,
}

/// The consumer-held half of a [`FetchRequest`]'s channels.
pub struct FetchHandles {
    pub start_rx: oneshot::Receiver<usize>,
    pub message_rx: mpsc::Receiver<FetchedMessage>,
    pub error_rx: oneshot::Receiver<PartitionError>,
}

impl FetchHandles {
    /// Adapts `message_rx` into a `futures::Stream`, for callers that
    /// want to fold/zip/chain fetch results with other streams rather
    /// than `recv()`-loop by hand.
    pub fn into_message_stream(self) -> impl Stream<Item = FetchedMessage> {
        stream::unfold(self.message_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
    }
}

impl FetchRequest {
    /// Builds a fetch request and the handles its issuer will poll.
    pub fn new(start_id: u64, count: usize, direction: i8) -> (FetchRequest, FetchHandles) {
        Self::with_capacity(start_id, count, direction, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(
        start_id: u64,
        count: usize,
        direction: i8,
        channel_capacity: usize,
    ) -> (FetchRequest, FetchHandles) {
        let (start_tx, start_rx) = oneshot::channel();
        let (message_tx, message_rx) = mpsc::channel(channel_capacity.max(1));
        let (error_tx, error_rx) = oneshot::channel();

        let request = FetchRequest {
            start_id,
            count,
            direction,
            start_tx,
            message_tx,
            error_tx,
        };
        let handles = FetchHandles {
            start_rx,
            message_rx,
            error_rx,
        };
        (request, handles)
    }
}

