//! Traits connecting the transport adapters to a protocol engine.
//!
//! The engine is an external, stateful parser/encoder. The adapters only see
//! it through [`ProtocolEngine::feed`], and the engine only sees the adapters
//! through [`ConnectionHandler`].

/// Capability interface the adapters expose to a protocol engine.
///
/// Both the event-driven and the blocking adapter implement this; an engine
/// never needs to know which one it is talking to.
///
/// # Example
///
/// ```ignore
/// impl ProtocolEngine for Greeter {
///     fn feed(&mut self, data: &[u8], handler: &mut dyn ConnectionHandler) -> usize {
///         if data.starts_with(b"HELLO\n") {
///             handler.on_outbound_ready(b"WELCOME\n");
///             handler.on_handshake_complete();
///             return 6;
///         }
///         0
///     }
/// }
/// ```
pub trait ConnectionHandler {
    /// Bytes the engine wants transmitted.
    ///
    /// The adapter transmits every accepted chunk in call order, or fails the
    /// connection.
    fn on_outbound_ready(&mut self, data: &[u8]);

    /// The session is usable for application-level exchange.
    fn on_handshake_complete(&mut self);

    /// Unrecoverable protocol violation.
    ///
    /// The adapter stops reading and writing and surfaces `message` to its
    /// owner.
    fn on_protocol_error(&mut self, message: &str);

    /// The peer closed the session logically.
    fn on_session_closed(&mut self);
}

/// An incremental protocol parser fed with arbitrarily segmented bytes.
pub trait ProtocolEngine {
    /// Interpret as many complete units as possible from the front of `data`.
    ///
    /// Returns the number of bytes consumed, which MUST NOT exceed
    /// `data.len()`. The adapter keeps `data[consumed..]` and presents it
    /// again, followed by newly received bytes, on the next call.
    ///
    /// Side effects (outbound bytes, handshake, errors, close) are reported
    /// synchronously through `handler`.
    fn feed(&mut self, data: &[u8], handler: &mut dyn ConnectionHandler) -> usize;
}

impl<E: ProtocolEngine + ?Sized> ProtocolEngine for Box<E> {
    fn feed(&mut self, data: &[u8], handler: &mut dyn ConnectionHandler) -> usize {
        (**self).feed(data, handler)
    }
}
