//! FSSTAT procedure (RFC 1813 section 3.3.18): volatile filesystem
//! statistics.

use std::io::{Read, Write};

use tracing::debug;

use super::{post_attr_for, resolve_fh, status_of};
use crate::dispatch::VfsDispatcher;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_fsstat(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let fsroot = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!(xid, ?fsroot, "nfsproc3_fsstat");

    let id = match resolve_fh(context, &fsroot) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    let obj_attributes = post_attr_for(context, id).await;

    match context.dispatcher.statfs(id).await {
        Ok(stats) => {
            let res = nfs3::fs::FSSTAT3resok {
                obj_attributes,
                tbytes: stats.total_bytes,
                fbytes: stats.free_bytes,
                abytes: stats.avail_bytes,
                tfiles: stats.total_objects,
                ffiles: stats.free_objects,
                afiles: stats.free_objects,
                invarsec: 0,
            };
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(err) => {
            debug!(xid, %err, "statfs failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            obj_attributes.serialize(output)?;
        }
    }
    Ok(())
}
