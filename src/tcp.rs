//! TCP transport for the NFS and MOUNT programs.
//!
//! Each accepted connection gets its own [`rpc::Context`] and task.
//! Incoming bytes are fed to a [`rpc::SocketMessageHandler`], which
//! reassembles record-marked messages and dispatches each one; replies
//! come back over a channel and are framed onto the socket by the
//! connection's single writer.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use std::{io, io::ErrorKind};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::dispatch::nfs::NfsDispatcher;
use crate::protocol::{rpc, xdr};

/// How long a processed transaction id is remembered for retransmission
/// detection.
const TRANSACTION_RETENTION: Duration = Duration::from_secs(60);

/// Serves one mount's dispatcher to NFS clients over TCP.
pub struct NfsTcpListener {
    listener: TcpListener,
    port: u16,
    dispatcher: Arc<NfsDispatcher>,
    mount_signal: Option<mpsc::Sender<bool>>,
    export_name: Arc<String>,
    transaction_tracker: Arc<rpc::TransactionTracker>,
}

/// Maps a 16-bit host number into the 127.88.x.y loopback range, so
/// several mounts can listen on the same port without colliding.
pub fn generate_host_ip(hostnum: u16) -> String {
    format!("127.88.{}.{}", ((hostnum >> 8) & 0xFF) as u8, (hostnum & 0xFF) as u8)
}

/// Shuttles bytes between one client socket and its message handler
/// until the client hangs up or the stream turns unparseable.
async fn process_socket(
    mut socket: tokio::net::TcpStream,
    context: rpc::Context,
) -> Result<(), anyhow::Error> {
    let (mut message_handler, mut socksend, mut msgrecvchan) =
        rpc::SocketMessageHandler::new(&context);
    let _ = socket.set_nodelay(true);

    tokio::spawn(async move {
        loop {
            if let Err(err) = message_handler.read().await {
                debug!(?err, "message loop ended");
                break;
            }
        }
    });
    loop {
        tokio::select! {
            _ = socket.readable() => {
                let mut buf = [0; 128_000];

                match socket.try_read(&mut buf) {
                    Ok(0) => {
                        return Ok(());
                    }
                    Ok(n) => {
                        let _ = socksend.write_all(&buf[..n]).await;
                    }
                    Err(ref e) if e.kind() == ErrorKind::WouldBlock => {}
                    Err(e) => {
                        debug!(?e, "socket read failed");
                        return Err(e.into());
                    }
                }
            },
            reply = msgrecvchan.recv() => {
                match reply {
                    Some(Err(e)) => {
                        debug!(?e, "dispatch failed, closing connection");
                        return Err(e);
                    }
                    Some(Ok(msg)) => {
                        if let Err(e) = rpc::write_fragment(&mut socket, &msg).await {
                            error!(?e, "reply write failed");
                        }
                    }
                    None => {
                        return Err(anyhow::anyhow!("unexpected socket context termination"));
                    }
                }
            }
        }
    }
}

/// Operations a running NFS transport exposes to its host process.
#[async_trait]
pub trait NfsTcp: Send + Sync {
    /// The port actually bound, which matters when binding port 0.
    fn get_listen_port(&self) -> u16;

    /// The address actually bound, which matters with "auto" binding.
    fn get_listen_ip(&self) -> IpAddr;

    /// Registers a channel receiving `true` on MNT and `false` on UMNT.
    fn set_mount_listener(&mut self, signal: mpsc::Sender<bool>);

    /// Accepts and serves client connections until the listener fails.
    async fn handle_forever(&self) -> io::Result<()>;
}

impl NfsTcpListener {
    /// Binds to `ipstr` ("ip:port", or "auto:port" to probe the
    /// 127.88.0.0/16 loopback range for a free address).
    pub async fn bind(ipstr: &str, dispatcher: Arc<NfsDispatcher>) -> io::Result<NfsTcpListener> {
        let (ip, port) = ipstr.split_once(':').ok_or_else(|| {
            io::Error::new(ErrorKind::AddrNotAvailable, "address must be of form ip:port")
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            io::Error::new(ErrorKind::AddrNotAvailable, "port not in range 0..=65535")
        })?;

        if ip != "auto" {
            return NfsTcpListener::bind_internal(ip, port, dispatcher).await;
        }

        const NUM_TRIES: u16 = 32;
        for try_ip in 1..=NUM_TRIES {
            let ip = generate_host_ip(try_ip);
            let result = NfsTcpListener::bind_internal(&ip, port, dispatcher.clone()).await;

            if result.is_ok() {
                return result;
            }
        }

        Err(io::Error::other("can't bind automatically"))
    }

    async fn bind_internal(
        ip: &str,
        port: u16,
        dispatcher: Arc<NfsDispatcher>,
    ) -> io::Result<NfsTcpListener> {
        let ipstr = format!("{ip}:{port}");
        let listener = TcpListener::bind(&ipstr).await?;
        info!(addr = %ipstr, "listening");

        let port = match listener.local_addr()? {
            SocketAddr::V4(s) => s.port(),
            SocketAddr::V6(s) => s.port(),
        };
        Ok(NfsTcpListener {
            listener,
            port,
            dispatcher,
            mount_signal: None,
            export_name: Arc::new("/".to_string()),
            transaction_tracker: Arc::new(rpc::TransactionTracker::new(TRANSACTION_RETENTION)),
        })
    }

    /// Sets the export path served to MOUNT clients, normalized to a
    /// single leading slash and no trailing slash.
    pub fn with_export_name<S: AsRef<str>>(&mut self, export_name: S) {
        self.export_name = Arc::new(format!(
            "/{}",
            export_name.as_ref().trim_end_matches('/').trim_start_matches('/')
        ));
    }
}

#[async_trait]
impl NfsTcp for NfsTcpListener {
    fn get_listen_port(&self) -> u16 {
        self.port
    }

    fn get_listen_ip(&self) -> IpAddr {
        // local_addr on a bound listener does not fail.
        self.listener.local_addr().map(|a| a.ip()).unwrap_or(IpAddr::from([127, 0, 0, 1]))
    }

    fn set_mount_listener(&mut self, signal: mpsc::Sender<bool>) {
        self.mount_signal = Some(signal);
    }

    async fn handle_forever(&self) -> io::Result<()> {
        loop {
            let (socket, _) = self.listener.accept().await?;
            // A client can reset between accept and here; that is its
            // problem, not the listener's.
            let client_addr = match socket.peer_addr() {
                Ok(addr) => addr.to_string(),
                Err(err) => {
                    debug!(?err, "client gone before peer_addr, dropping connection");
                    continue;
                }
            };
            let context = rpc::Context {
                local_port: self.port,
                client_addr,
                auth: xdr::rpc::auth_unix::default(),
                dispatcher: self.dispatcher.clone(),
                export_name: self.export_name.clone(),
                mount_signal: self.mount_signal.clone(),
                transaction_tracker: self.transaction_tracker.clone(),
            };
            info!(client = %context.client_addr, "accepted connection");
            debug!(?context, "connection context");
            tokio::spawn(async move {
                let _ = process_socket(socket, context).await;
            });
        }
    }
}
