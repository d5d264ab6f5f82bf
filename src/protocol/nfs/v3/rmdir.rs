//! RMDIR procedure (RFC 1813 section 3.3.13): remove an empty directory.

use std::io::{Read, Write};

use tracing::{debug, warn};

use super::{post_attr_for, pre_attr_for, resolve_fh, status_of};
use crate::dispatch::{MountAccess, VfsDispatcher};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_rmdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let dirops = deserialize::<nfs3::diropargs3>(input)?;
    debug!(xid, ?dirops, "nfsproc3_rmdir");

    if context.dispatcher.access() == MountAccess::ReadOnly {
        warn!(xid, "rmdir on read-only mount");
        xdr::rpc::success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let dirid = match resolve_fh(context, &dirops.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let before = pre_attr_for(context, dirid).await;

    let status = match context.dispatcher.rmdir(dirid, &dirops.name).await {
        Ok(()) => nfs3::nfsstat3::NFS3_OK,
        Err(err) => {
            debug!(xid, name = %dirops.name, %err, "rmdir failed");
            status_of(&err)
        }
    };
    xdr::rpc::success_reply(xid).serialize(output)?;
    status.serialize(output)?;
    nfs3::wcc_data { before, after: post_attr_for(context, dirid).await }.serialize(output)?;
    Ok(())
}
