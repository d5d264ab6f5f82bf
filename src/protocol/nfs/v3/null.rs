//! NULL procedure (RFC 1813 section 3.3.0): a ping with no arguments and
//! no result beyond the accepted reply itself.

use std::io::Write;

use tracing::debug;

use crate::protocol::xdr::{self, Serialize};

pub fn nfsproc3_null(xid: u32, output: &mut impl Write) -> Result<(), anyhow::Error> {
    debug!(xid, "nfsproc3_null");
    xdr::rpc::success_reply(xid).serialize(output)?;
    Ok(())
}
