//! Cloneable handle posting work to the task that owns a connection.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::core::ConnectionHandler;
use crate::transport::{TransportError, TransportResult};

/// Closure run against the engine on the owning task.
pub(crate) type EngineCall<E> = Box<dyn FnOnce(&mut E, &mut dyn ConnectionHandler) + Send>;

/// Work posted to the owning task.
pub(crate) enum Command<E> {
    /// Queue raw outbound bytes.
    Submit(Bytes),
    /// Run application code against the engine.
    Engine(EngineCall<E>),
    /// Begin a graceful close.
    Close,
}

/// Handle for driving a running [`EventedTransport`](super::EventedTransport)
/// from other tasks.
///
/// Every method only posts a message; the work happens on the task that owns
/// the connection, so the engine, buffer and queue are never touched
/// concurrently.
pub struct TransportHandle<E> {
    tx: mpsc::UnboundedSender<Command<E>>,
}

impl<E> Clone for TransportHandle<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> TransportHandle<E> {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command<E>>) -> Self {
        Self { tx }
    }

    /// Queue bytes for transmission after everything queued before them.
    pub fn submit(&self, bytes: impl Into<Bytes>) -> TransportResult<()> {
        self.post(Command::Submit(bytes.into()))
    }

    /// Run `call` against the engine on the owning task.
    ///
    /// Outbound bytes the engine emits from `call` are queued exactly as if
    /// they had been produced while parsing inbound data.
    pub fn with_engine<F>(&self, call: F) -> TransportResult<()>
    where
        F: FnOnce(&mut E, &mut dyn ConnectionHandler) + Send + 'static,
    {
        self.post(Command::Engine(Box::new(call)))
    }

    /// Ask the transport to close once in-flight output is written.
    pub fn request_close(&self) -> TransportResult<()> {
        self.post(Command::Close)
    }

    /// True once the owning task has finished.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn post(&self, command: Command<E>) -> TransportResult<()> {
        self.tx
            .send(command)
            .map_err(|_| TransportError::ConnectionClosed)
    }
}
