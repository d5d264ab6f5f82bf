//! EXPORT procedure (RFC 1813 section 5.2.5): list the served exports.
//! There is exactly one, with no client groups.

use std::io::Write;

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, Serialize};

pub fn mountproc3_export(
    xid: u32,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    debug!(xid, "mountproc3_export");
    xdr::rpc::success_reply(xid).serialize(output)?;
    // One list node: the export path, an empty group list, end of list.
    true.serialize(output)?;
    context.export_name.as_bytes().serialize(output)?;
    false.serialize(output)?;
    false.serialize(output)?;
    Ok(())
}
