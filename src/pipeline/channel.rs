//! Bounded row channels between exactly one producer copy and one consumer copy.
//!
//! Built on a bounded crossbeam channel: a full channel blocks `put`, an empty one blocks `get`.
//! Blocked calls wake every poll interval to check the run's stop flag, so a stopping run never
//! leaves a worker parked forever. Dropping the sender (or [`RowSender::mark_done`]) is the
//! end-of-stream signal; the receiver still drains everything buffered before reporting it.

use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, bounded,
};
use std::fmt;
use std::sync::Arc;

use crate::error::EngineError;
use crate::pipeline::context::StopSignal;
use crate::types::{Row, RowSchema};

/// `from.copy -> to.copy`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId {
    pub from: String,
    pub from_copy: usize,
    pub to: String,
    pub to_copy: usize,
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.from, self.from_copy, self.to, self.to_copy
        )
    }
}

/// Result of [`RowReceiver::get`].
#[derive(Debug)]
pub enum Received {
    Row(Row),
    /// Producer is done and nothing is left in the buffer.
    EndOfStream,
}

/// Create a channel holding at most `capacity` rows.
pub fn row_channel(id: ChannelId, capacity: usize) -> (RowSender, RowReceiver) {
    let (tx, rx) = bounded::<Row>(capacity.max(1));
    let id = Arc::new(id);
    (
        RowSender {
            id: Arc::clone(&id),
            tx: Some(tx),
            schema: None,
            capacity: capacity.max(1),
        },
        RowReceiver {
            id,
            rx,
            done: false,
        },
    )
}

/// Producer half.
pub struct RowSender {
    id: Arc<ChannelId>,
    tx: Option<Sender<Row>>,
    /// Schema negotiated on the first row put.
    schema: Option<Arc<RowSchema>>,
    capacity: usize,
}

impl RowSender {
    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rows currently buffered.
    pub fn len(&self) -> usize {
        self.tx.as_ref().map_or(0, Sender::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_done(&self) -> bool {
        self.tx.is_none()
    }

    /// Schema established by the first row, if any.
    pub fn schema(&self) -> Option<&Arc<RowSchema>> {
        self.schema.as_ref()
    }

    /// Append `row`, blocking while the channel is full.
    ///
    /// Fails with [`EngineError::Stopped`] when the run stops while waiting, with
    /// [`EngineError::SchemaMismatch`] when the row does not match the negotiated schema and
    /// with [`EngineError::ConsumerClosed`] if the consumer went away.
    pub fn put(&mut self, row: Row, stop: &StopSignal) -> Result<(), EngineError> {
        self.check_schema(&row)?;
        let Some(tx) = self.tx.as_ref() else {
            return Err(EngineError::ConsumerClosed(format!(
                "{} (put after mark_done)",
                self.id
            )));
        };
        let mut row = row;
        loop {
            match tx.send_timeout(row, stop.poll_interval()) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(r)) => {
                    if stop.is_stopped() {
                        return Err(EngineError::Stopped);
                    }
                    row = r;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    if stop.is_stopped() {
                        return Err(EngineError::Stopped);
                    }
                    return Err(EngineError::ConsumerClosed(self.id.to_string()));
                }
            }
        }
    }

    /// Signal end of stream. Idempotent.
    pub fn mark_done(&mut self) {
        if self.tx.take().is_some() {
            log::debug!("channel {} done", self.id);
        }
    }

    fn check_schema(&mut self, row: &Row) -> Result<(), EngineError> {
        match &self.schema {
            None => {
                self.schema = Some(Arc::clone(row.schema()));
                Ok(())
            }
            Some(expected) => {
                if Arc::ptr_eq(expected, row.schema()) || **expected == **row.schema() {
                    Ok(())
                } else {
                    Err(EngineError::SchemaMismatch {
                        channel: self.id.to_string(),
                        expected: expected.to_string(),
                        got: row.schema().to_string(),
                    })
                }
            }
        }
    }
}

impl Drop for RowSender {
    fn drop(&mut self) {
        self.mark_done();
    }
}

/// Consumer half.
pub struct RowReceiver {
    id: Arc<ChannelId>,
    rx: Receiver<Row>,
    done: bool,
}

impl RowReceiver {
    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    /// Rows currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// True once [`Received::EndOfStream`] has been observed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Next row in FIFO order, blocking while empty and not done.
    pub fn get(&mut self, stop: &StopSignal) -> Result<Received, EngineError> {
        if self.done {
            return Ok(Received::EndOfStream);
        }
        loop {
            match self.rx.recv_timeout(stop.poll_interval()) {
                Ok(row) => return Ok(Received::Row(row)),
                Err(RecvTimeoutError::Timeout) => {
                    if stop.is_stopped() {
                        return Err(EngineError::Stopped);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.done = true;
                    return Ok(Received::EndOfStream);
                }
            }
        }
    }

    /// Non-blocking variant: `None` when nothing is buffered yet.
    pub fn try_get(&mut self) -> Option<Received> {
        if self.done {
            return Some(Received::EndOfStream);
        }
        match self.rx.try_recv() {
            Ok(row) => Some(Received::Row(row)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.done = true;
                Some(Received::EndOfStream)
            }
        }
    }

    pub(crate) fn receiver(&self) -> &Receiver<Row> {
        &self.rx
    }

    pub(crate) fn set_done(&mut self) {
        self.done = true;
    }
}
