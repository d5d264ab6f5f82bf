//! RENAME procedure (RFC 1813 section 3.3.14).

use std::io::{Read, Write};

use tracing::{debug, warn};

use super::{post_attr_for, pre_attr_for, resolve_fh, status_of};
use crate::dispatch::{MountAccess, VfsDispatcher};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_rename(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::RENAME3args>(input)?;
    debug!(xid, ?args, "nfsproc3_rename");

    if context.dispatcher.access() == MountAccess::ReadOnly {
        warn!(xid, "rename on read-only mount");
        xdr::rpc::success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let (from_dir, to_dir) =
        match (resolve_fh(context, &args.from.dir), resolve_fh(context, &args.to.dir)) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(stat), _) | (_, Err(stat)) => {
                xdr::rpc::success_reply(xid).serialize(output)?;
                stat.serialize(output)?;
                nfs3::wcc_data::default().serialize(output)?;
                nfs3::wcc_data::default().serialize(output)?;
                return Ok(());
            }
        };

    let from_before = pre_attr_for(context, from_dir).await;
    let to_before = pre_attr_for(context, to_dir).await;

    let status = match context
        .dispatcher
        .rename(from_dir, &args.from.name, to_dir, &args.to.name)
        .await
    {
        Ok(()) => nfs3::nfsstat3::NFS3_OK,
        Err(err) => {
            debug!(xid, from = %args.from.name, to = %args.to.name, %err, "rename failed");
            status_of(&err)
        }
    };
    xdr::rpc::success_reply(xid).serialize(output)?;
    status.serialize(output)?;
    nfs3::wcc_data { before: from_before, after: post_attr_for(context, from_dir).await }
        .serialize(output)?;
    nfs3::wcc_data { before: to_before, after: post_attr_for(context, to_dir).await }
        .serialize(output)?;
    Ok(())
}
