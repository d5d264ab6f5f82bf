//! MNT procedure (RFC 1813 section 5.2.1): validate the export path and
//! hand back the root file handle with the accepted auth flavors.

use std::io::{Read, Write};

use tracing::debug;

use crate::dispatch::VfsDispatcher;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, mount, Serialize};

pub async fn mountproc3_mnt(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let path = deserialize::<mount::dirpath>(input)?;
    let utf8path = std::str::from_utf8(&path.0).unwrap_or_default();
    debug!(xid, path = utf8path, "mountproc3_mnt");

    // Only the one configured export is served; anything else does not
    // exist as far as MOUNT is concerned.
    if utf8path.trim_end_matches('/') != context.export_name.trim_end_matches('/') {
        debug!(xid, path = utf8path, export = %context.export_name, "no matching export");
        xdr::rpc::success_reply(xid).serialize(output)?;
        mount::mountstat3::MNT3ERR_NOENT.serialize(output)?;
        return Ok(());
    }

    let root = context.dispatcher.root();
    let response = mount::mountres3_ok {
        fhandle: context.dispatcher.handle_for(root),
        auth_flavors: vec![
            xdr::rpc::auth_flavor::AUTH_NONE.code(),
            xdr::rpc::auth_flavor::AUTH_UNIX.code(),
        ],
    };
    debug!(xid, ?response, "mount accepted");
    if let Some(ref chan) = context.mount_signal {
        let _ = chan.send(true).await;
    }
    xdr::rpc::success_reply(xid).serialize(output)?;
    mount::mountstat3::MNT3_OK.serialize(output)?;
    response.serialize(output)?;
    Ok(())
}
