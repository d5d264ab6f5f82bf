//! NULL procedure (RFC 1813 section 5.2.0): round-trip probe, no work.

use std::io::Write;

use tracing::debug;

use crate::protocol::xdr::{self, Serialize};

pub fn mountproc3_null(xid: u32, output: &mut impl Write) -> Result<(), anyhow::Error> {
    debug!(xid, "mountproc3_null");
    xdr::rpc::success_reply(xid).serialize(output)?;
    Ok(())
}
