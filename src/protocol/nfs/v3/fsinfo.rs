//! FSINFO procedure (RFC 1813 section 3.3.19): static server limits and
//! preferences, fetched once at mount time.

use std::io::{Read, Write};

use tracing::debug;

use super::{post_attr_for, resolve_fh};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_fsinfo(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let fsroot = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!(xid, ?fsroot, "nfsproc3_fsinfo");

    let id = match resolve_fh(context, &fsroot) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    let res = nfs3::fs::FSINFO3resok {
        obj_attributes: post_attr_for(context, id).await,
        rtmax: 1024 * 1024,
        rtpref: 1024 * 1024,
        rtmult: 1,
        wtmax: 1024 * 1024,
        wtpref: 1024 * 1024,
        wtmult: 1,
        dtpref: 1024 * 1024,
        maxfilesize: u64::MAX,
        time_delta: nfs3::nfstime3 { seconds: 0, nseconds: 1 },
        properties: nfs3::fs::FSF_SYMLINK | nfs3::fs::FSF_HOMOGENEOUS | nfs3::fs::FSF_CANSETTIME,
    };
    xdr::rpc::success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}
