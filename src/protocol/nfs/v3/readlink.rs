//! READLINK procedure (RFC 1813 section 3.3.5).

use std::io::{Read, Write};

use tracing::debug;

use super::{post_attr_for, resolve_fh, status_of};
use crate::dispatch::VfsDispatcher;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_readlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!(xid, ?handle, "nfsproc3_readlink");

    let id = match resolve_fh(context, &handle) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    let attr = post_attr_for(context, id).await;

    match context.dispatcher.readlink(id).await {
        Ok(target) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            attr.serialize(output)?;
            nfs3::nfspath3::from(target).serialize(output)?;
        }
        Err(err) => {
            debug!(xid, %id, %err, "readlink failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            attr.serialize(output)?;
        }
    }
    Ok(())
}
