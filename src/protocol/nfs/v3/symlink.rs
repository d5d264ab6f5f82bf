//! SYMLINK procedure (RFC 1813 section 3.3.10).

use std::io::{Read, Write};

use tracing::{debug, warn};

use super::{post_attr_for, pre_attr_for, resolve_fh, status_of, to_fattr3};
use crate::dispatch::{MountAccess, VfsDispatcher};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_symlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::SYMLINK3args>(input)?;
    debug!(xid, ?args, "nfsproc3_symlink");

    if context.dispatcher.access() == MountAccess::ReadOnly {
        warn!(xid, "symlink on read-only mount");
        xdr::rpc::success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let dirid = match resolve_fh(context, &args.dirops.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let before = pre_attr_for(context, dirid).await;

    match context
        .dispatcher
        .symlink(dirid, &args.dirops.name, &args.symlink.symlink_data)
        .await
    {
        Ok(attr) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            nfs3::post_op_fh3::handle(nfs3::nfs_fh3 {
                data: context.dispatcher.handle_for(attr.id),
            })
            .serialize(output)?;
            nfs3::post_op_attr::attributes(to_fattr3(&attr)).serialize(output)?;
            nfs3::wcc_data { before, after: post_attr_for(context, dirid).await }
                .serialize(output)?;
        }
        Err(err) => {
            debug!(xid, name = %args.dirops.name, %err, "symlink failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            nfs3::wcc_data { before, after: post_attr_for(context, dirid).await }
                .serialize(output)?;
        }
    }
    Ok(())
}
