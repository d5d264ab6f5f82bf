//! COMMIT procedure (RFC 1813 section 3.3.21): flush unstable writes to
//! stable storage. The verifier lets clients detect a server restart
//! between WRITE and COMMIT and replay what was lost.

use std::io::{Read, Write};

use tracing::debug;

use super::{post_attr_for, pre_attr_for, resolve_fh, status_of, write_verf};
use crate::dispatch::VfsDispatcher;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_commit(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::COMMIT3args>(input)?;
    debug!(xid, offset = args.offset, count = args.count, "nfsproc3_commit");

    let id = match resolve_fh(context, &args.file) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let before = pre_attr_for(context, id).await;

    match context.dispatcher.fsync(id).await {
        Ok(()) => {
            let res = nfs3::file::COMMIT3resok {
                file_wcc: nfs3::wcc_data { before, after: post_attr_for(context, id).await },
                verf: write_verf(context),
            };
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(err) => {
            debug!(xid, %id, %err, "commit failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            nfs3::wcc_data { before, after: post_attr_for(context, id).await }
                .serialize(output)?;
        }
    }
    Ok(())
}
