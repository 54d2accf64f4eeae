//! Event-driven transport adapter.
//!
//! One task owns the connection. It waits on whichever of three things
//! completes first: the in-flight write, the outstanding read, or a command
//! from a [`TransportHandle`]. Reads and writes are both outstanding at the
//! same time (full duplex), but there is never more than one of each.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::event::{EventReceiver, TransportEvent};
use super::handle::{Command, TransportHandle};
use crate::core::{AccumulationBuffer, BufferError, ConnectionHandler, OutboundQueue, ProtocolEngine};
use crate::transport::{
    ConnectionPhase, ConnectionState, EngineSignals, TransportConfig, TransportError,
    TransportResult, deliver_inbound,
};

/// A write in progress. Owns the write half and hands it back when done.
type WriteFuture<S> = Pin<Box<dyn Future<Output = (WriteHalf<S>, io::Result<()>)> + Send>>;

/// What woke the connection task.
enum Step<E, S> {
    Written(WriteHalf<S>, io::Result<()>),
    Read(io::Result<usize>),
    Command(Command<E>),
    Stalled,
}

/// Queues engine output instead of writing it, so the engine is never
/// re-entered while it parses.
struct QueueingHandler<'a> {
    queue: &'a mut OutboundQueue,
    accepting: bool,
    signals: EngineSignals,
}

impl<'a> QueueingHandler<'a> {
    fn new(queue: &'a mut OutboundQueue, accepting: bool) -> Self {
        Self {
            queue,
            accepting,
            signals: EngineSignals::default(),
        }
    }

    fn into_signals(self) -> EngineSignals {
        self.signals
    }
}

impl ConnectionHandler for QueueingHandler<'_> {
    fn on_outbound_ready(&mut self, data: &[u8]) {
        if self.accepting && !self.signals.blocks_outbound() {
            self.queue.enqueue(data);
        } else {
            self.signals.rejected_chunks += 1;
        }
    }

    fn on_handshake_complete(&mut self) {
        self.signals.handshake_complete = true;
    }

    fn on_protocol_error(&mut self, message: &str) {
        self.signals.record_error(message);
    }

    fn on_session_closed(&mut self) {
        self.signals.session_closed = true;
    }
}

/// Non-blocking transport adapter driven by a single tokio task.
///
/// # Example
///
/// ```ignore
/// use stream_conduit::prelude::*;
///
/// let (mut transport, mut events) = EventedTransport::new(engine, TransportConfig::default())?;
///
/// // Bytes emitted before the socket is ready are held and sent first.
/// transport.with_engine(|engine, handler| engine.start(handler))?;
///
/// transport.connect("localhost", 5672).await?;
/// let handle = transport.handle();
/// let task = transport.spawn();
///
/// while let Some(event) = events.recv().await {
///     if event.is_terminal() {
///         break;
///     }
/// }
/// task.await??;
/// ```
pub struct EventedTransport<E, S = TcpStream> {
    engine: E,
    config: TransportConfig,
    buffer: AccumulationBuffer,
    queue: OutboundQueue,
    state: ConnectionState,
    stream: Option<S>,
    peer: Option<SocketAddr>,
    failure: Option<TransportError>,
    events: mpsc::UnboundedSender<TransportEvent>,
    commands_tx: mpsc::UnboundedSender<Command<E>>,
    commands: mpsc::UnboundedReceiver<Command<E>>,
}

impl<E> EventedTransport<E, TcpStream> {
    /// Create an unconnected transport for `engine`.
    ///
    /// Returns the transport and the receiver for its lifecycle events, or
    /// [`TransportError::Config`] if `config` is invalid.
    pub fn new(engine: E, config: TransportConfig) -> TransportResult<(Self, EventReceiver)> {
        Self::build(engine, config)
    }

    /// Resolve `host` and connect to the first address that accepts.
    ///
    /// On failure the transport moves to `Failed` and the error is returned;
    /// no read or write is ever attempted and nothing is retried.
    pub async fn connect(&mut self, host: &str, port: u16) -> TransportResult<()> {
        if self.state.phase() != ConnectionPhase::Connecting {
            return Err(TransportError::ConnectionClosed);
        }

        let addrs: Vec<SocketAddr> = match tokio::net::lookup_host((host, port)).await {
            Ok(addrs) => addrs.collect(),
            Err(source) => {
                self.state.mark_failed();
                return Err(TransportError::Resolve {
                    host: host.to_owned(),
                    port,
                    source,
                });
            }
        };

        let mut last_error = TransportError::Resolve {
            host: host.to_owned(),
            port,
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
        };

        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    if let Err(error) = stream.set_nodelay(true) {
                        debug!(%addr, %error, "failed to set TCP_NODELAY");
                    }
                    self.peer = Some(addr);
                    return self.attach(stream);
                }
                Err(source) => {
                    debug!(%addr, error = %source, "connect attempt failed");
                    last_error = TransportError::Connect { addr, source };
                }
            }
        }

        self.state.mark_failed();
        warn!(host, port, error = %last_error, "connect failed");
        Err(last_error)
    }
}

impl<E, S> EventedTransport<E, S> {
    /// Wrap a stream that is already connected.
    ///
    /// An invalid `config` is rejected before `Connected` is emitted.
    pub fn from_stream(
        stream: S,
        engine: E,
        config: TransportConfig,
    ) -> TransportResult<(Self, EventReceiver)> {
        let (mut transport, events) = Self::build(engine, config)?;
        transport.stream = Some(stream);
        transport.state.mark_connected();
        transport.emit(TransportEvent::Connected);
        Ok((transport, events))
    }

    fn build(engine: E, config: TransportConfig) -> TransportResult<(Self, EventReceiver)> {
        config.ensure_valid()?;
        let (events, receiver) = EventReceiver::channel();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let transport = Self {
            engine,
            buffer: AccumulationBuffer::new(config.max_buffered),
            config,
            queue: OutboundQueue::new(),
            state: ConnectionState::new(),
            stream: None,
            peer: None,
            failure: None,
            events,
            commands_tx,
            commands,
        };
        Ok((transport, receiver))
    }

    fn attach(&mut self, stream: S) -> TransportResult<()> {
        if !self.state.mark_connected() {
            return Err(TransportError::ConnectionClosed);
        }
        self.stream = Some(stream);
        info!(peer = ?self.peer, queued = self.queue.len(), "transport connected");
        self.emit(TransportEvent::Connected);
        Ok(())
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.state.phase()
    }

    /// True while reads and writes are active.
    pub fn is_connected(&self) -> bool {
        self.state.phase() == ConnectionPhase::Connected
    }

    /// Whether the engine reported a completed handshake.
    pub fn is_handshake_complete(&self) -> bool {
        self.state.is_handshake_complete()
    }

    /// Remote address, when connected through [`connect`](EventedTransport::connect).
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// The configuration this transport was built with.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Chunks waiting to be written.
    pub fn pending_outbound(&self) -> usize {
        self.queue.len()
    }

    /// The protocol engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// A handle for posting work once the transport is running.
    pub fn handle(&self) -> TransportHandle<E> {
        TransportHandle::new(self.commands_tx.clone())
    }

    /// Queue bytes for transmission.
    ///
    /// Bytes queued before the stream is connected are sent as soon as the
    /// transport runs.
    pub fn submit_outbound(&mut self, bytes: &[u8]) -> TransportResult<()> {
        if !self.state.phase().accepts_outbound() {
            return Err(TransportError::ConnectionClosed);
        }
        self.queue.enqueue(bytes);
        Ok(())
    }

    /// Run `call` against the engine and apply whatever it signalled.
    pub fn with_engine<R, F>(&mut self, call: F) -> TransportResult<R>
    where
        F: FnOnce(&mut E, &mut dyn ConnectionHandler) -> R,
    {
        if self.state.phase().is_terminal() {
            return Err(TransportError::ConnectionClosed);
        }

        let mut handler = QueueingHandler::new(&mut self.queue, self.state.phase().accepts_outbound());
        let output = call(&mut self.engine, &mut handler);
        let signals = handler.into_signals();
        self.apply_signals(signals);
        Ok(output)
    }

    /// Begin a graceful close.
    ///
    /// The socket is closed once the in-flight write and anything queued
    /// ahead of the request has been written. Before a stream exists the
    /// transport closes at once and drops held output.
    pub fn request_close(&mut self) {
        if self.state.phase() == ConnectionPhase::Connecting && self.stream.is_none() {
            let dropped = self.queue.abandon();
            self.state.mark_closed();
            info!(dropped, "transport closed before connecting");
            self.emit(TransportEvent::Closed);
            return;
        }

        if self.state.close() {
            info!(
                peer = ?self.peer,
                write_in_flight = self.queue.is_write_in_flight(),
                queued = self.queue.len(),
                "transport closing"
            );
        }
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }

    fn fail(&mut self, error: TransportError) {
        if !self.state.mark_failed() {
            return;
        }

        let dropped = self.queue.abandon();
        match &error {
            TransportError::Protocol(message) => {
                warn!(peer = ?self.peer, message = %message, dropped, "protocol error");
                self.emit(TransportEvent::ProtocolError(message.clone()));
            }
            other => {
                error!(peer = ?self.peer, error = %other, dropped, "transport failed");
                self.emit(TransportEvent::Failed(other.to_string()));
            }
        }
        self.failure = Some(error);
    }

    fn apply_signals(&mut self, signals: EngineSignals) {
        if signals.rejected_chunks > 0 {
            warn!(
                rejected = signals.rejected_chunks,
                phase = %self.state.phase(),
                "dropped outbound chunks after close"
            );
        }

        if signals.handshake_complete && !self.state.is_handshake_complete() {
            self.state.complete_handshake();
            info!(peer = ?self.peer, "handshake complete");
            self.emit(TransportEvent::HandshakeComplete);
        }

        if let Some(message) = signals.protocol_error {
            self.fail(TransportError::Protocol(message));
            return;
        }

        if signals.session_closed {
            self.request_close();
        }
    }

    fn handle_command(&mut self, command: Command<E>) {
        match command {
            Command::Submit(chunk) => {
                if self.state.phase().accepts_outbound() {
                    self.queue.enqueue_bytes(chunk);
                } else {
                    warn!(bytes = chunk.len(), phase = %self.state.phase(), "dropped submitted chunk");
                }
            }
            Command::Engine(call) => {
                if let Err(error) = self.with_engine(call) {
                    debug!(%error, "engine call skipped");
                }
            }
            Command::Close => self.request_close(),
        }
    }
}

impl<E, S> EventedTransport<E, S>
where
    E: ProtocolEngine,
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Drive the connection until it closes or fails.
    ///
    /// Returns `Ok(())` after a graceful close and the failure otherwise.
    pub async fn run(mut self) -> TransportResult<()> {
        if self.state.phase().is_terminal() {
            return match self.failure.take() {
                Some(error) => Err(error),
                None => Ok(()),
            };
        }
        let Some(stream) = self.stream.take() else {
            return Err(TransportError::NotConnected);
        };

        let (mut reader, writer) = tokio::io::split(stream);
        let mut writer = Some(writer);
        let mut in_flight: Option<WriteFuture<S>> = None;
        let mut scratch = vec![0u8; self.config.scratch_read_size];

        self.pump(&mut writer, &mut in_flight).await;

        while !self.state.phase().is_terminal() {
            let reading = self.state.phase().can_read();
            let read_len = scratch.len().min(self.buffer.remaining());
            if reading && read_len == 0 {
                self.fail(
                    BufferError::CapacityExceeded {
                        requested: scratch.len(),
                        remaining: self.buffer.remaining(),
                    }
                    .into(),
                );
                break;
            }

            let step = tokio::select! {
                (half, result) = next_write_completion(&mut in_flight), if in_flight.is_some() => {
                    Step::Written(half, result)
                }
                result = reader.read(&mut scratch[..read_len]), if reading => {
                    Step::Read(result)
                }
                Some(command) = self.commands.recv() => Step::Command(command),
                else => Step::Stalled,
            };

            match step {
                Step::Written(half, result) => {
                    in_flight = None;
                    self.on_write_complete(half, result, &mut writer, &mut in_flight);
                }
                Step::Read(Ok(0)) => self.fail(TransportError::UnexpectedEof),
                Step::Read(Ok(n)) => self.ingest(&scratch[..n]),
                Step::Read(Err(error)) if error.kind() == io::ErrorKind::Interrupted => {}
                Step::Read(Err(error)) => self.fail(TransportError::Io(error)),
                Step::Command(command) => self.handle_command(command),
                Step::Stalled => break,
            }

            self.pump(&mut writer, &mut in_flight).await;
        }

        match self.failure.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Spawn [`run`](EventedTransport::run) on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<TransportResult<()>>
    where
        E: Send + 'static,
    {
        let span = info_span!("conduit", peer = ?self.peer);
        tokio::spawn(self.run().instrument(span))
    }

    fn ingest(&mut self, bytes: &[u8]) {
        let mut handler = QueueingHandler::new(&mut self.queue, self.state.phase().accepts_outbound());
        let delivered = deliver_inbound(&mut self.buffer, bytes, &mut self.engine, &mut handler);
        let signals = handler.into_signals();

        match delivered {
            Ok(consumed) => debug!(
                read = bytes.len(),
                consumed,
                retained = self.buffer.available(),
                "fed engine"
            ),
            Err(error) => {
                self.fail(error.into());
                return;
            }
        }

        self.apply_signals(signals);
    }

    fn on_write_complete(
        &mut self,
        half: WriteHalf<S>,
        result: io::Result<()>,
        writer: &mut Option<WriteHalf<S>>,
        in_flight: &mut Option<WriteFuture<S>>,
    ) {
        if let Err(error) = result {
            self.fail(TransportError::Io(error));
            return;
        }

        match self.queue.finish_write() {
            Ok(Some(next)) => *in_flight = Some(write_chunk(half, next)),
            Ok(None) => *writer = Some(half),
            Err(error) => {
                *writer = Some(half);
                self.fail(error.into());
            }
        }
    }

    /// Start the next write if the writer is idle, and finish a pending
    /// close once nothing is left to write.
    async fn pump(
        &mut self,
        writer: &mut Option<WriteHalf<S>>,
        in_flight: &mut Option<WriteFuture<S>>,
    ) {
        if in_flight.is_none() && self.state.phase().can_write() {
            if let Some(half) = writer.take() {
                match self.queue.begin_write() {
                    Some(chunk) => {
                        debug!(bytes = chunk.len(), queued = self.queue.len(), "writing chunk");
                        *in_flight = Some(write_chunk(half, chunk));
                    }
                    None => *writer = Some(half),
                }
            }
        }

        let drained = in_flight.is_none() && self.queue.is_empty();
        if self.state.phase() == ConnectionPhase::Closing && drained {
            if let Some(mut half) = writer.take() {
                if let Err(error) = half.shutdown().await {
                    debug!(%error, "shutdown after close failed");
                }
            }
            self.state.mark_closed();
            info!(peer = ?self.peer, "transport closed");
            self.emit(TransportEvent::Closed);
        }
    }
}

fn write_chunk<S>(mut writer: WriteHalf<S>, chunk: Bytes) -> WriteFuture<S>
where
    S: AsyncWrite + Send + 'static,
{
    Box::pin(async move {
        let result = async {
            writer.write_all(&chunk).await?;
            writer.flush().await
        }
        .await;
        (writer, result)
    })
}

async fn next_write_completion<S>(
    in_flight: &mut Option<WriteFuture<S>>,
) -> (WriteHalf<S>, io::Result<()>) {
    match in_flight {
        Some(write) => write.await,
        None => std::future::pending().await,
    }
}
