//! LOOKUP procedure (RFC 1813 section 3.3.3): translate a name within a
//! directory into the handle used by every later operation on the object.

use std::io::{Read, Write};

use tracing::debug;

use super::{post_attr_for, resolve_fh, status_of, to_fattr3};
use crate::dispatch::VfsDispatcher;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_lookup(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let dirops = deserialize::<nfs3::diropargs3>(input)?;
    debug!(xid, ?dirops, "nfsproc3_lookup");

    let dirid = match resolve_fh(context, &dirops.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    let dir_attr = post_attr_for(context, dirid).await;

    match context.dispatcher.lookup(dirid, &dirops.name).await {
        Ok(attr) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            nfs3::nfs_fh3 { data: context.dispatcher.handle_for(attr.id) }.serialize(output)?;
            nfs3::post_op_attr::attributes(to_fattr3(&attr)).serialize(output)?;
            dir_attr.serialize(output)?;
        }
        Err(err) => {
            debug!(xid, name = %dirops.name, %err, "lookup failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            dir_attr.serialize(output)?;
        }
    }
    Ok(())
}
