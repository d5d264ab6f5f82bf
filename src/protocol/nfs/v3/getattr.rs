//! GETATTR procedure (RFC 1813 section 3.3.1).

use std::io::{Read, Write};

use tracing::debug;

use super::{resolve_fh, status_of, to_fattr3};
use crate::dispatch::VfsDispatcher;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_getattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!(xid, ?handle, "nfsproc3_getattr");

    let id = match resolve_fh(context, &handle) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };

    match context.dispatcher.getattr(id).await {
        Ok(attr) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            to_fattr3(&attr).serialize(output)?;
        }
        Err(err) => {
            debug!(xid, %id, %err, "getattr failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
        }
    }
    Ok(())
}
