//! Blocking transport adapter.
//!
//! The thread that calls [`BlockingTransport::run_loop`] owns the socket: it
//! blocks on reads and feeds the engine, and engine output is written
//! synchronously from inside the engine callback.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use tracing::{debug, error, info, warn};

use super::quit::QuitHandle;
use crate::core::{AccumulationBuffer, BufferError, ConnectionHandler, ProtocolEngine};
use crate::transport::{
    ConnectionPhase, ConnectionState, EngineSignals, TransportConfig, TransportError,
    TransportResult, deliver_inbound,
};

/// Why [`BlockingTransport::run_loop`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// A quit request was observed.
    Quit,
    /// The peer shut the stream down (zero-length read).
    PeerShutdown,
    /// The engine reported a logical close.
    SessionClosed,
}

/// Writes engine output straight to the stream.
struct WritingHandler<'a, W> {
    stream: &'a mut W,
    accepting: bool,
    signals: EngineSignals,
    write_error: Option<io::Error>,
}

impl<'a, W: Write> WritingHandler<'a, W> {
    fn new(stream: &'a mut W, accepting: bool) -> Self {
        Self {
            stream,
            accepting,
            signals: EngineSignals::default(),
            write_error: None,
        }
    }

    fn finish(self) -> (EngineSignals, Option<io::Error>) {
        (self.signals, self.write_error)
    }
}

impl<W: Write> ConnectionHandler for WritingHandler<'_, W> {
    fn on_outbound_ready(&mut self, data: &[u8]) {
        if !self.accepting || self.signals.blocks_outbound() || self.write_error.is_some() {
            self.signals.rejected_chunks += 1;
            return;
        }

        match write_chunk(self.stream, data) {
            Ok(()) => debug!(bytes = data.len(), "wrote chunk"),
            Err(error) => self.write_error = Some(error),
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

fn write_chunk<W: Write>(stream: &mut W, data: &[u8]) -> io::Result<()> {
    stream.write_all(data)?;
    stream.flush()
}

/// Blocking transport adapter: one dedicated thread per connection.
///
/// # Example
///
/// ```ignore
/// use stream_conduit::prelude::*;
///
/// let mut transport = BlockingTransport::connect("localhost", 5672, engine, config)?;
/// let quit = transport.quit_handle();
///
/// transport.with_engine(|engine, handler| engine.start(handler))?;
/// match transport.run_loop()? {
///     LoopExit::SessionClosed => println!("session closed"),
///     other => println!("loop ended: {other:?}"),
/// }
/// ```
pub struct BlockingTransport<E, S = TcpStream> {
    engine: E,
    stream: S,
    buffer: AccumulationBuffer,
    scratch: Vec<u8>,
    state: ConnectionState,
    quit: QuitHandle,
    peer: Option<SocketAddr>,
}

impl<E> BlockingTransport<E, TcpStream> {
    /// Connect synchronously to the first resolved address that accepts.
    ///
    /// Applies `config.quit_poll_interval` as the socket read timeout. An
    /// invalid `config` is rejected before the host is resolved.
    pub fn connect(
        host: &str,
        port: u16,
        engine: E,
        config: TransportConfig,
    ) -> TransportResult<Self> {
        config.ensure_valid()?;

        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                host: host.to_owned(),
                port,
                source,
            })?;

        let mut last_error = TransportError::Resolve {
            host: host.to_owned(),
            port,
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
        };

        for addr in addrs {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    stream.set_read_timeout(config.quit_poll_interval)?;
                    if let Err(error) = stream.set_nodelay(true) {
                        debug!(%addr, %error, "failed to set TCP_NODELAY");
                    }
                    info!(%addr, "transport connected");
                    let mut transport = Self::from_stream(stream, engine, config)?;
                    transport.peer = Some(addr);
                    return Ok(transport);
                }
                Err(source) => {
                    debug!(%addr, error = %source, "connect attempt failed");
                    last_error = TransportError::Connect { addr, source };
                }
            }
        }

        warn!(host, port, error = %last_error, "connect failed");
        Err(last_error)
    }

    /// Remote address of the socket.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl<E, S> BlockingTransport<E, S>
where
    S: Read + Write,
{
    /// Wrap a stream that is already connected.
    ///
    /// The stream's own timeout settings are left untouched and
    /// `config.quit_poll_interval` is not applied; `WouldBlock` and
    /// `TimedOut` reads are treated as "no data yet".
    pub fn from_stream(stream: S, engine: E, config: TransportConfig) -> TransportResult<Self> {
        config.ensure_valid()?;
        let mut state = ConnectionState::new();
        state.mark_connected();
        Ok(Self {
            engine,
            stream,
            buffer: AccumulationBuffer::new(config.max_buffered),
            scratch: vec![0u8; config.scratch_read_size],
            state,
            quit: QuitHandle::new(),
            peer: None,
        })
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.state.phase()
    }

    /// Whether the engine reported a completed handshake.
    pub fn is_handshake_complete(&self) -> bool {
        self.state.is_handshake_complete()
    }

    /// The protocol engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// A handle other threads can use to stop the loop.
    pub fn quit_handle(&self) -> QuitHandle {
        self.quit.clone()
    }

    /// Ask the loop to stop at its next iteration.
    pub fn request_quit(&self) {
        self.quit.request_quit();
    }

    /// Write `bytes` synchronously on the calling thread.
    pub fn submit_outbound(&mut self, bytes: &[u8]) -> TransportResult<()> {
        if !self.state.phase().accepts_outbound() {
            return Err(TransportError::ConnectionClosed);
        }
        match write_chunk(&mut self.stream, bytes) {
            Ok(()) => Ok(()),
            Err(error) => Err(self.fail(TransportError::Io(error))),
        }
    }

    /// Run `call` against the engine on this thread, writing its output
    /// immediately.
    pub fn with_engine<R, F>(&mut self, call: F) -> TransportResult<R>
    where
        F: FnOnce(&mut E, &mut dyn ConnectionHandler) -> R,
    {
        if self.state.phase().is_terminal() {
            return Err(TransportError::ConnectionClosed);
        }

        let mut handler = WritingHandler::new(&mut self.stream, self.state.phase().accepts_outbound());
        let output = call(&mut self.engine, &mut handler);
        let (signals, write_error) = handler.finish();

        if let Some(error) = write_error {
            return Err(self.fail(TransportError::Io(error)));
        }
        self.apply_signals(signals)?;
        Ok(output)
    }

    fn fail(&mut self, error: TransportError) -> TransportError {
        if self.state.mark_failed() {
            match &error {
                TransportError::Protocol(message) => {
                    warn!(peer = ?self.peer, message = %message, "protocol error");
                }
                other => error!(peer = ?self.peer, error = %other, "transport failed"),
            }
        }
        error
    }

    /// Act on engine signals. Returns the loop exit a logical close implies.
    fn apply_signals(&mut self, signals: EngineSignals) -> TransportResult<Option<LoopExit>> {
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
        }

        if let Some(message) = signals.protocol_error {
            return Err(self.fail(TransportError::Protocol(message)));
        }

        if signals.session_closed {
            self.state.close();
            self.state.mark_closed();
            info!(peer = ?self.peer, "session closed");
            return Ok(Some(LoopExit::SessionClosed));
        }

        Ok(None)
    }
}

impl<E, S> BlockingTransport<E, S>
where
    E: ProtocolEngine,
    S: Read + Write,
{
    /// Read and feed the engine until quit, peer shutdown, logical close or
    /// failure.
    ///
    /// Unconsumed bytes are retained and presented again with the next read.
    pub fn run_loop(&mut self) -> TransportResult<LoopExit> {
        if self.state.phase().is_terminal() {
            return Err(TransportError::ConnectionClosed);
        }

        loop {
            if self.quit.is_requested() {
                self.state.mark_closed();
                info!(peer = ?self.peer, "quit requested");
                return Ok(LoopExit::Quit);
            }

            let read_len = self.scratch.len().min(self.buffer.remaining());
            if read_len == 0 {
                let error = BufferError::CapacityExceeded {
                    requested: self.scratch.len(),
                    remaining: self.buffer.remaining(),
                };
                return Err(self.fail(error.into()));
            }

            let n = match self.stream.read(&mut self.scratch[..read_len]) {
                Ok(0) => {
                    self.state.mark_closed();
                    info!(peer = ?self.peer, "peer shut down the stream");
                    return Ok(LoopExit::PeerShutdown);
                }
                Ok(n) => n,
                Err(error) if is_retryable(&error) => continue,
                Err(error) => return Err(self.fail(TransportError::Io(error))),
            };

            let mut handler =
                WritingHandler::new(&mut self.stream, self.state.phase().accepts_outbound());
            let delivered = deliver_inbound(
                &mut self.buffer,
                &self.scratch[..n],
                &mut self.engine,
                &mut handler,
            );
            let (signals, write_error) = handler.finish();

            match delivered {
                Ok(consumed) => debug!(
                    read = n,
                    consumed,
                    retained = self.buffer.available(),
                    "fed engine"
                ),
                Err(error) => return Err(self.fail(error.into())),
            }

            if let Some(error) = write_error {
                return Err(self.fail(TransportError::Io(error)));
            }
            if let Some(exit) = self.apply_signals(signals)? {
                return Ok(exit);
            }
        }
    }
}

fn is_retryable(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
