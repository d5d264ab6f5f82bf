//! Per-mount dispatcher construction.
//!
//! Exactly one dispatcher variant serves a mount, chosen here when the
//! mount comes up and owned until unmount. The native-hook constructors
//! are compiled only on platforms that have the hook; the NFS variant is
//! the fallback that exists everywhere, since the server behind it is
//! this process rather than the kernel.

use std::sync::Arc;

use tracing::info;

#[cfg(any(target_os = "linux", target_os = "macos"))]
use super::bridge::BridgeDispatcher;
use super::nfs::NfsDispatcher;
#[cfg(target_os = "windows")]
use super::projected::ProjectedDispatcher;
use super::MountAccess;
use crate::store::SharedStore;

pub struct DispatcherFactory;

impl DispatcherFactory {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    pub fn make_bridge_dispatcher(
        store: SharedStore,
        access: MountAccess,
    ) -> Arc<BridgeDispatcher> {
        info!("constructing kernel-bridge dispatcher");
        Arc::new(BridgeDispatcher::new(store, access))
    }

    #[cfg(target_os = "windows")]
    pub fn make_projected_dispatcher(
        store: SharedStore,
        access: MountAccess,
    ) -> Arc<ProjectedDispatcher> {
        info!("constructing projection dispatcher");
        Arc::new(ProjectedDispatcher::new(store, access))
    }

    pub fn make_nfs_dispatcher(store: SharedStore, access: MountAccess) -> Arc<NfsDispatcher> {
        info!("constructing nfs dispatcher");
        Arc::new(NfsDispatcher::new(store, access))
    }
}
