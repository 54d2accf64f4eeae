//! Engine side effects collected during one engine invocation.

use crate::core::{AccumulationBuffer, BufferError, ConnectionHandler, ProtocolEngine};

/// What the engine reported through its [`ConnectionHandler`] while it ran.
///
/// Adapters record the signals during `feed` and act on them afterwards, so
/// the engine never re-enters the adapter while it is being driven.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EngineSignals {
    /// The engine reported `on_handshake_complete`.
    pub handshake_complete: bool,
    /// First message passed to `on_protocol_error`.
    pub protocol_error: Option<String>,
    /// The engine reported `on_session_closed`.
    pub session_closed: bool,
    /// Outbound chunks refused because the session no longer accepts them.
    pub rejected_chunks: usize,
}

impl EngineSignals {
    /// True once outbound bytes from the engine must be refused.
    pub fn blocks_outbound(&self) -> bool {
        self.session_closed || self.protocol_error.is_some()
    }

    /// Keep the first protocol error only.
    pub fn record_error(&mut self, message: &str) {
        if self.protocol_error.is_none() {
            self.protocol_error = Some(message.to_owned());
        }
    }
}

/// Append `bytes`, feed the engine the whole readable view, and compact by
/// what it consumed.
///
/// Returns the consumed count. An engine claiming more than it was given
/// yields [`BufferError::CompactOutOfRange`].
pub(crate) fn deliver_inbound<E>(
    buffer: &mut AccumulationBuffer,
    bytes: &[u8],
    engine: &mut E,
    handler: &mut dyn ConnectionHandler,
) -> Result<usize, BufferError>
where
    E: ProtocolEngine + ?Sized,
{
    buffer.append(bytes)?;
    let consumed = engine.feed(buffer.data(), handler);
    buffer.compact(consumed)?;
    Ok(consumed)
}
