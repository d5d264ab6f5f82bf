use std::sync::Arc;

use latentfs::dispatch::factory::DispatcherFactory;
use latentfs::dispatch::MountAccess;
use latentfs::tcp::{NfsTcp, NfsTcpListener};

/// The static tree the server exports
mod fs;

/// Port number on which the NFS server will listen
const HOSTPORT: u32 = 11111;

/// Serves a small read-only in-memory tree over loopback NFS.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .init();

    println!("Starting NFS server on 0.0.0.0:{HOSTPORT}");
    println!("You can mount it with: sudo mount -o proto=tcp,port={HOSTPORT},mountport={HOSTPORT},nolock,addr=127.0.0.1 127.0.0.1:/ /mnt/memfs");

    let dispatcher =
        DispatcherFactory::make_nfs_dispatcher(Arc::new(fs::DemoStore), MountAccess::ReadOnly);
    let listener = NfsTcpListener::bind(&format!("0.0.0.0:{HOSTPORT}"), dispatcher)
        .await
        .unwrap();
    listener.handle_forever().await.unwrap();
}
