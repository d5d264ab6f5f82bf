//! MKNOD procedure (RFC 1813 section 3.3.11).
//!
//! The working copy never materializes device nodes, sockets or fifos,
//! so MKNOD decodes its arguments and answers NFS3ERR_NOTSUPP.

use std::io::{Read, Write};

use tracing::debug;

use super::{post_attr_for, pre_attr_for, resolve_fh};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_mknod(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::MKNOD3args>(input)?;
    debug!(xid, ?args, "nfsproc3_mknod (unsupported)");

    let wcc = match resolve_fh(context, &args.dirops.dir) {
        Ok(dirid) => nfs3::wcc_data {
            before: pre_attr_for(context, dirid).await,
            after: post_attr_for(context, dirid).await,
        },
        Err(_) => nfs3::wcc_data::default(),
    };

    xdr::rpc::success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3ERR_NOTSUPP.serialize(output)?;
    wcc.serialize(output)?;
    Ok(())
}
