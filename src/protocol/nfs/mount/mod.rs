//! MOUNT version 3 procedure handlers (RFC 1813 Appendix I).
//!
//! MOUNT is the bootstrap program: MNT hands the client the root file
//! handle, everything after that happens over the NFS program. DUMP is
//! not served; clients get PROC_UNAVAIL for it.

use std::io::{Read, Write};

use num_traits::cast::FromPrimitive;
use tracing::warn;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, mount, Serialize};

mod export;
mod mnt;
mod null;
mod umnt;
mod umnt_all;

use export::mountproc3_export;
use mnt::mountproc3_mnt;
use null::mountproc3_null;
use umnt::mountproc3_umnt;
use umnt_all::mountproc3_umnt_all;

/// Routes one accepted MOUNT call to its procedure handler.
pub async fn handle_mount(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != mount::VERSION {
        warn!(vers = call.vers, supported = mount::VERSION, "unsupported mount program version");
        xdr::rpc::version_mismatch_reply(xid, mount::VERSION, mount::VERSION).serialize(output)?;
        return Ok(());
    }
    let proc = mount::MountProc3::from_u32(call.proc).unwrap_or(mount::MountProc3::INVALID);

    match proc {
        mount::MountProc3::NULL => mountproc3_null(xid, output)?,
        mount::MountProc3::MNT => mountproc3_mnt(xid, input, output, context).await?,
        mount::MountProc3::UMNT => mountproc3_umnt(xid, input, output, context).await?,
        mount::MountProc3::UMNTALL => mountproc3_umnt_all(xid, output, context).await?,
        mount::MountProc3::EXPORT => mountproc3_export(xid, output, context)?,
        _ => {
            warn!(proc = call.proc, "unsupported mount procedure");
            xdr::rpc::proc_unavail_reply(xid).serialize(output)?;
        }
    }
    Ok(())
}
