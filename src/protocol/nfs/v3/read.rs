//! READ procedure (RFC 1813 section 3.3.6).

use std::io::{Read, Write};

use tracing::debug;

use super::{post_attr_for, resolve_fh, status_of};
use crate::dispatch::VfsDispatcher;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_read(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::READ3args>(input)?;
    debug!(xid, offset = args.offset, count = args.count, "nfsproc3_read");

    let id = match resolve_fh(context, &args.file) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    match context.dispatcher.read(id, args.offset, args.count).await {
        Ok((data, eof)) => {
            let res = nfs3::file::READ3resok {
                file_attributes: post_attr_for(context, id).await,
                count: data.len() as u32,
                eof,
                data,
            };
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(err) => {
            debug!(xid, %id, %err, "read failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            post_attr_for(context, id).await.serialize(output)?;
        }
    }
    Ok(())
}
