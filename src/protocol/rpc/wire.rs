//! Record-marked framing and the per-message gates (RFC 5531 section 11).
//!
//! A stream transport carries RPC messages as a sequence of fragments,
//! each prefixed by a 4-byte header whose high bit marks the final
//! fragment and whose low 31 bits carry the byte count. Fragments of one
//! message are reassembled strictly in arrival order; once a message is
//! complete it is handed to its own task, so distinct messages on the
//! same connection dispatch concurrently. Each task encodes its reply
//! into a private buffer and the connection's single writer emits whole
//! records, which keeps the output stream well formed no matter how
//! replies interleave in time.

use std::io::{Cursor, Read, Write};

use anyhow::anyhow;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::protocol::xdr::{self, deserialize, mount, nfs3, Serialize};
use crate::protocol::{nfs, rpc};

/// Auxiliary programs NFS clients commonly probe on the same port. They
/// are not served; each probe gets PROG_UNAVAIL instead of being logged
/// as an unknown program.
const NFS_ACL_PROGRAM: u32 = 100227;
const NFS_ID_MAP_PROGRAM: u32 = 100270;
const NFS_METADATA_PROGRAM: u32 = 200024;
const NFS_LOCALIO_PROGRAM: u32 = 400122;

/// Initial capacity of a reply buffer.
const DEFAULT_RESPONSE_CAPACITY: usize = 8192;

/// Processes one complete RPC message.
///
/// Decodes the envelope, then runs the gates in order: RPC protocol
/// version, credential flavor, duplicate detection. Only a call that
/// passes all three is routed to a program handler; everything else is
/// answered (or, for a retransmission, dropped) right here, and no
/// dispatcher code runs.
///
/// Returns true when a reply was written to `output`.
pub async fn handle_rpc(
    input: &mut impl Read,
    output: &mut impl Write,
    mut context: rpc::Context,
) -> Result<bool, anyhow::Error> {
    let message = deserialize::<xdr::rpc::rpc_msg>(input)?;
    let xid = message.xid;
    let xdr::rpc::rpc_body::CALL(call) = message.body else {
        return Err(anyhow!("received a reply where a call was expected"));
    };

    if call.rpcvers != xdr::rpc::RPC_VERSION {
        warn!(rpcvers = call.rpcvers, "unsupported rpc protocol version");
        xdr::rpc::version_mismatch_reply(xid, xdr::rpc::RPC_VERSION, xdr::rpc::RPC_VERSION)
            .serialize(output)?;
        return Ok(true);
    }

    match call.cred.flavor {
        xdr::rpc::auth_flavor::AUTH_NONE => {}
        xdr::rpc::auth_flavor::AUTH_UNIX => {
            match deserialize(&mut Cursor::new(&call.cred.body)) {
                Ok(auth) => context.auth = auth,
                Err(err) => {
                    warn!(?err, "malformed AUTH_UNIX credential body");
                    xdr::rpc::auth_error_reply(xid, xdr::rpc::auth_stat::AUTH_BADCRED)
                        .serialize(output)?;
                    return Ok(true);
                }
            }
        }
        flavor => {
            warn!(?flavor, "unsupported credential flavor");
            xdr::rpc::auth_error_reply(xid, xdr::rpc::auth_stat::AUTH_TOOWEAK)
                .serialize(output)?;
            return Ok(true);
        }
    }

    if context.transaction_tracker.is_retransmission(xid, &context.client_addr) {
        debug!(xid, client = %context.client_addr, "dropping retransmitted call");
        return Ok(false);
    }

    let result = match call.prog {
        nfs3::PROGRAM => nfs::v3::handle_nfs(xid, call, input, output, &context).await,
        mount::PROGRAM => nfs::mount::handle_mount(xid, call, input, output, &context).await,
        NFS_ACL_PROGRAM | NFS_ID_MAP_PROGRAM | NFS_METADATA_PROGRAM | NFS_LOCALIO_PROGRAM => {
            trace!(prog = call.prog, "ignoring auxiliary program probe");
            xdr::rpc::prog_unavail_reply(xid).serialize(output)?;
            Ok(())
        }
        unknown => {
            warn!(prog = unknown, "unknown program number");
            xdr::rpc::prog_unavail_reply(xid).serialize(output)?;
            Ok(())
        }
    }
    .map(|()| true);
    context.transaction_tracker.mark_processed(xid, &context.client_addr);
    result
}

/// Reads one fragment from the stream, appending its payload to
/// `append_to`. Returns true when the fragment was the message's last.
///
/// A stream whose declared record length exceeds
/// [`rpc::MAX_RPC_RECORD_LENGTH`] fails here, and the caller drops the
/// connection; there is no way to resynchronize with a framing-confused
/// peer.
async fn read_fragment(
    socket: &mut (impl AsyncRead + Unpin),
    append_to: &mut Vec<u8>,
) -> Result<bool, anyhow::Error> {
    let mut header_buf = [0_u8; 4];
    socket.read_exact(&mut header_buf).await?;
    let fragment_header = u32::from_be_bytes(header_buf);
    let is_last = (fragment_header & (1 << 31)) > 0;
    let length = (fragment_header & ((1 << 31) - 1)) as usize;
    trace!(length, is_last, "reading fragment");
    if append_to.len().saturating_add(length) > rpc::MAX_RPC_RECORD_LENGTH {
        return Err(anyhow!(
            "rpc record length {} exceeds maximum {}",
            append_to.len().saturating_add(length),
            rpc::MAX_RPC_RECORD_LENGTH
        ));
    }
    let start_offset = append_to.len();
    append_to.resize(start_offset + length, 0);
    socket.read_exact(&mut append_to[start_offset..]).await?;
    Ok(is_last)
}

/// Writes `buf` to the stream as record-marked fragments.
///
/// Splits at the 31-bit fragment size limit; only the final fragment
/// carries the last-fragment bit.
pub async fn write_fragment(
    socket: &mut (impl AsyncWrite + Unpin),
    buf: &[u8],
) -> Result<(), anyhow::Error> {
    const MAX_FRAGMENT_SIZE: usize = (1 << 31) - 1;

    let mut offset = 0;
    loop {
        let remaining = buf.len() - offset;
        let fragment_size = std::cmp::min(remaining, MAX_FRAGMENT_SIZE);
        let is_last = offset + fragment_size >= buf.len();
        let fragment_header =
            if is_last { fragment_size as u32 | (1 << 31) } else { fragment_size as u32 };

        socket.write_all(&u32::to_be_bytes(fragment_header)).await?;
        trace!(fragment_size, is_last, "writing fragment");
        socket.write_all(&buf[offset..offset + fragment_size]).await?;

        offset += fragment_size;
        if is_last {
            break;
        }
    }
    Ok(())
}

pub type SocketMessageType = Result<Vec<u8>, anyhow::Error>;

/// Drives one connection's receive side.
///
/// Owns the connection's fragment buffer (reassembly is sequential per
/// connection) and spawns one task per completed message. Replies come
/// back through the channel as whole records for the connection's writer
/// to frame.
pub struct SocketMessageHandler {
    cur_fragment: Vec<u8>,
    socket_receive_channel: DuplexStream,
    context: rpc::Context,
    reply_sender: mpsc::UnboundedSender<SocketMessageType>,
}

impl SocketMessageHandler {
    /// Creates the handler plus the write half the transport feeds bytes
    /// into and the receiver the transport drains replies from.
    pub fn new(
        context: &rpc::Context,
    ) -> (Self, DuplexStream, mpsc::UnboundedReceiver<SocketMessageType>) {
        let (socksend, sockrecv) = tokio::io::duplex(256_000);
        let (msgsend, msgrecv) = mpsc::unbounded_channel();
        (
            Self {
                cur_fragment: Vec::new(),
                socket_receive_channel: sockrecv,
                context: context.clone(),
                reply_sender: msgsend,
            },
            socksend,
            msgrecv,
        )
    }

    /// Reads one fragment; on the message's last fragment, hands the
    /// completed record to its own dispatch task. Call in a loop.
    pub async fn read(&mut self) -> Result<(), anyhow::Error> {
        let is_last =
            read_fragment(&mut self.socket_receive_channel, &mut self.cur_fragment).await?;
        if is_last {
            let message = std::mem::take(&mut self.cur_fragment);
            let context = self.context.clone();
            let sender = self.reply_sender.clone();
            tokio::spawn(async move {
                let mut input = Cursor::new(message);
                let mut response = Vec::with_capacity(DEFAULT_RESPONSE_CAPACITY);
                match handle_rpc(&mut input, &mut response, context).await {
                    Ok(true) => {
                        let _ = sender.send(Ok(response));
                    }
                    Ok(false) => {}
                    Err(err) => {
                        let _ = sender.send(Err(err));
                    }
                }
            });
        }
        Ok(())
    }
}
