//! Per-connection request context.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::TransactionTracker;
use crate::dispatch::nfs::NfsDispatcher;
use crate::protocol::xdr;

/// Everything a protocol handler needs to service one call, passed
/// explicitly down every request path. There is no ambient server state.
#[derive(Clone)]
pub struct Context {
    /// Port the server accepted this connection on.
    pub local_port: u16,

    /// Client address, for logging and retransmission keys.
    pub client_addr: String,

    /// Decoded AUTH_UNIX credential of the current call, default when the
    /// call used AUTH_NONE.
    pub auth: xdr::rpc::auth_unix,

    /// The mount's dispatcher. Shared across every in-flight request.
    pub dispatcher: Arc<NfsDispatcher>,

    /// Export path served to MOUNT clients.
    pub export_name: Arc<String>,

    /// Notified with `true` on MNT and `false` on UMNT.
    pub mount_signal: Option<mpsc::Sender<bool>>,

    /// Duplicate-call detection shared by all connections.
    pub transaction_tracker: Arc<TransactionTracker>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("rpc::Context")
            .field("local_port", &self.local_port)
            .field("client_addr", &self.client_addr)
            .field("auth", &self.auth)
            .finish()
    }
}
