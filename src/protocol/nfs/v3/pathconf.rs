//! PATHCONF procedure (RFC 1813 section 3.3.20): POSIX pathname limits.

use std::io::{Read, Write};

use tracing::debug;

use super::{post_attr_for, resolve_fh};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_pathconf(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let object = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!(xid, ?object, "nfsproc3_pathconf");

    let id = match resolve_fh(context, &object) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    let res = nfs3::fs::PATHCONF3resok {
        obj_attributes: post_attr_for(context, id).await,
        linkmax: 32,
        name_max: nfs3::NFS3_NAMEMAX,
        no_trunc: true,
        chown_restricted: true,
        case_insensitive: false,
        case_preserving: true,
    };
    xdr::rpc::success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}
