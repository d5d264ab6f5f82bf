//! LINK procedure (RFC 1813 section 3.3.15): add a hard link to an
//! existing file.

use std::io::{Read, Write};

use tracing::{debug, warn};

use super::{post_attr_for, pre_attr_for, resolve_fh, status_of, to_fattr3};
use crate::dispatch::{MountAccess, VfsDispatcher};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_link(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::LINK3args>(input)?;
    debug!(xid, ?args, "nfsproc3_link");

    if context.dispatcher.access() == MountAccess::ReadOnly {
        warn!(xid, "link on read-only mount");
        xdr::rpc::success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::post_op_attr::Void.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let (id, dirid) =
        match (resolve_fh(context, &args.file), resolve_fh(context, &args.link.dir)) {
            (Ok(id), Ok(dirid)) => (id, dirid),
            (Err(stat), _) | (_, Err(stat)) => {
                xdr::rpc::success_reply(xid).serialize(output)?;
                stat.serialize(output)?;
                nfs3::post_op_attr::Void.serialize(output)?;
                nfs3::wcc_data::default().serialize(output)?;
                return Ok(());
            }
        };

    let before = pre_attr_for(context, dirid).await;

    match context.dispatcher.link(id, dirid, &args.link.name).await {
        Ok(attr) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            nfs3::post_op_attr::attributes(to_fattr3(&attr)).serialize(output)?;
            nfs3::wcc_data { before, after: post_attr_for(context, dirid).await }
                .serialize(output)?;
        }
        Err(err) => {
            debug!(xid, name = %args.link.name, %err, "link failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            post_attr_for(context, id).await.serialize(output)?;
            nfs3::wcc_data { before, after: post_attr_for(context, dirid).await }
                .serialize(output)?;
        }
    }
    Ok(())
}
