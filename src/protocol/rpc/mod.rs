//! ONC RPC message layer (RFC 5531).
//!
//! Everything between raw transport bytes and a decoded procedure call
//! lives here: record-marked stream framing, envelope decoding, the
//! authentication and version gates that answer bad calls before any
//! filesystem code runs, retransmission tracking, and routing of accepted
//! calls to the NFS and MOUNT programs. The layer holds no filesystem
//! state of its own.

mod context;
mod transaction_tracker;
mod wire;

pub use context::Context;
pub use transaction_tracker::TransactionTracker;
pub use wire::{write_fragment, SocketMessageHandler};

/// Upper bound on one reassembled RPC record. A fragment stream declaring
/// more than this is treated as an unrecoverable framing error and drops
/// the connection.
pub const MAX_RPC_RECORD_LENGTH: usize = 8 * 1024 * 1024;
