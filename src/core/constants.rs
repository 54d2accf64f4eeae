//! Default sizing constants for the transport adapters.
//!
//! These are defaults only. Every adapter takes its sizes from
//! [`TransportConfig`](crate::transport::TransportConfig) at construction.

use std::time::Duration;

// =============================================================================
// INBOUND BUFFERING
// =============================================================================

/// Default size of the scratch region each socket read fills (4 KiB).
pub const DEFAULT_SCRATCH_READ_SIZE: usize = 4 * 1024;

/// Default maximum accumulation capacity (two scratch reads).
///
/// Unconsumed residue is bounded by roughly one frame in practice, so two
/// scratch regions leave room for one partial frame plus a full read.
pub const DEFAULT_MAX_BUFFERED: usize = DEFAULT_SCRATCH_READ_SIZE * 2;

/// Smallest accepted scratch read size.
pub const MIN_SCRATCH_READ_SIZE: usize = 1;

// =============================================================================
// BLOCKING ADAPTER
// =============================================================================

/// Suggested quit poll interval when one is wanted.
///
/// Not applied by default: blocking reads wait indefinitely unless the
/// configuration asks for a poll interval.
pub const SUGGESTED_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// Environment variable overriding the scratch read size (bytes).
pub const ENV_SCRATCH_READ_SIZE: &str = "CONDUIT_SCRATCH_READ_SIZE";

/// Environment variable overriding the maximum accumulation capacity (bytes).
pub const ENV_MAX_BUFFERED: &str = "CONDUIT_MAX_BUFFERED";

/// Environment variable setting the blocking quit poll interval (milliseconds).
pub const ENV_QUIT_POLL_MS: &str = "CONDUIT_QUIT_POLL_MS";
