//! SETATTR procedure (RFC 1813 section 3.3.2).

use std::io::{Read, Write};

use tracing::debug;

use super::{post_attr_for, pre_attr_for, resolve_fh, status_of, to_nfstime, to_patch};
use crate::dispatch::VfsDispatcher;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_setattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::SETATTR3args>(input)?;
    debug!(xid, ?args, "nfsproc3_setattr");

    let id = match resolve_fh(context, &args.object) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let before = pre_attr_for(context, id).await;

    // The guard makes SETATTR conditional on the ctime the client last saw.
    if let nfs3::sattrguard3::obj_ctime(expected) = args.guard {
        let current = context.dispatcher.getattr(id).await.map(|attr| to_nfstime(attr.ctime));
        if current.map_or(true, |ctime| ctime != expected) {
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3ERR_NOT_SYNC.serialize(output)?;
            nfs3::wcc_data { before, after: post_attr_for(context, id).await }
                .serialize(output)?;
            return Ok(());
        }
    }

    match context.dispatcher.setattr(id, to_patch(&args.new_attributes)).await {
        Ok(attr) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            nfs3::wcc_data {
                before,
                after: nfs3::post_op_attr::attributes(super::to_fattr3(&attr)),
            }
            .serialize(output)?;
        }
        Err(err) => {
            debug!(xid, %id, %err, "setattr failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            nfs3::wcc_data { before, after: post_attr_for(context, id).await }
                .serialize(output)?;
        }
    }
    Ok(())
}
