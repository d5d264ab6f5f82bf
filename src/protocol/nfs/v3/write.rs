//! WRITE procedure (RFC 1813 section 3.3.7).
//!
//! The reply's count is the number of bytes the store actually committed,
//! which is allowed to be short of the request. All writes are answered
//! FILE_SYNC; the store journals mutations durably before returning.

use std::io::{Read, Write};

use tracing::{debug, warn};

use super::{pre_attr_for, resolve_fh, status_of, to_fattr3, write_verf};
use crate::dispatch::{MountAccess, VfsDispatcher};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_write(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if context.dispatcher.access() == MountAccess::ReadOnly {
        warn!(xid, "write on read-only mount");
        xdr::rpc::success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let args = deserialize::<nfs3::file::WRITE3args>(input)?;
    debug!(xid, offset = args.offset, count = args.count, "nfsproc3_write");

    // A count that disagrees with the opaque payload is a codec-level
    // problem, not a filesystem error.
    if args.data.len() != args.count as usize {
        xdr::rpc::garbage_args_reply(xid).serialize(output)?;
        return Ok(());
    }

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

    match context.dispatcher.write(id, args.offset, &args.data).await {
        Ok((committed, attr)) => {
            let res = nfs3::file::WRITE3resok {
                file_wcc: nfs3::wcc_data {
                    before,
                    after: nfs3::post_op_attr::attributes(to_fattr3(&attr)),
                },
                count: committed,
                committed: nfs3::file::stable_how::FILE_SYNC,
                verf: write_verf(context),
            };
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(err) => {
            debug!(xid, %id, %err, "write failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            nfs3::wcc_data { before, ..Default::default() }.serialize(output)?;
        }
    }
    Ok(())
}
