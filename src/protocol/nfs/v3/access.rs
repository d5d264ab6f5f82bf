//! ACCESS procedure (RFC 1813 section 3.3.4).
//!
//! Reports which of the client's requested permission bits the server
//! would allow, so clients can fail operations locally instead of
//! round-tripping a doomed call.

use std::io::{Read, Write};

use tracing::debug;

use super::{resolve_fh, status_of, to_fattr3};
use crate::dispatch::{MountAccess, ObjectKind, VfsDispatcher};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_access(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    let requested = deserialize::<u32>(input)?;
    debug!(xid, requested, "nfsproc3_access");

    let id = match resolve_fh(context, &handle) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    match context.dispatcher.getattr(id).await {
        Ok(attr) => {
            let mut allowed = match attr.kind {
                ObjectKind::Directory => {
                    nfs3::ACCESS3_READ
                        | nfs3::ACCESS3_LOOKUP
                        | nfs3::ACCESS3_MODIFY
                        | nfs3::ACCESS3_EXTEND
                        | nfs3::ACCESS3_DELETE
                }
                _ => {
                    nfs3::ACCESS3_READ
                        | nfs3::ACCESS3_MODIFY
                        | nfs3::ACCESS3_EXTEND
                        | nfs3::ACCESS3_EXECUTE
                }
            };
            if context.dispatcher.access() == MountAccess::ReadOnly {
                allowed &= !(nfs3::ACCESS3_MODIFY | nfs3::ACCESS3_EXTEND | nfs3::ACCESS3_DELETE);
            }
            xdr::rpc::success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            nfs3::post_op_attr::attributes(to_fattr3(&attr)).serialize(output)?;
            (requested & allowed).serialize(output)?;
        }
        Err(err) => {
            debug!(xid, %id, %err, "access failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
        }
    }
    Ok(())
}
