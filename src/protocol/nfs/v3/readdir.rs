//! READDIR procedure (RFC 1813 section 3.3.16).
//!
//! Cookies are entry positions: a reply entry's cookie is the count of
//! entries consumed once that entry is taken, so the client hands it back
//! as the next page's starting point. A resumed page must present the
//! verifier issued with its cookie; anything else is answered
//! NFS3ERR_BAD_COOKIE before the store is asked for entries.
//!
//! The reply is budgeted in bytes. Entries are staged one at a time and
//! committed only while the encoded reply stays under the client's limit.

use std::io::{Read, Write};

use tracing::{debug, trace};

use super::{post_attr_for, resolve_fh, status_of};
use crate::dispatch::VfsDispatcher;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};
use crate::write_counter::WriteCounter;

/// Bytes reserved for the reply's trailing list terminator and eof flag.
const REPLY_TAIL_RESERVE: usize = 128;

pub async fn nfsproc3_readdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::READDIR3args>(input)?;
    debug!(xid, cookie = args.cookie, count = args.count, "nfsproc3_readdir");

    let dirid = match resolve_fh(context, &args.dir) {
        Ok(id) => id,
        Err(stat) => {
            xdr::rpc::success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::Void.serialize(output)?;
            return Ok(());
        }
    };

    let dir_attr = post_attr_for(context, dirid).await;

    let verifier = match context.dispatcher.open_dir_page(dirid, args.cookie, args.cookieverf) {
        Ok(verifier) => verifier,
        Err(err) => {
            debug!(xid, cookie = args.cookie, %err, "cookie verifier mismatch");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            dir_attr.serialize(output)?;
            return Ok(());
        }
    };

    let max_bytes_allowed = (args.count as usize).saturating_sub(REPLY_TAIL_RESERVE);
    // The byte budget covers encoded entries, which cannot be sized
    // before encoding; a conservative estimate bounds the store query.
    let estimated_max_results = (args.count / 16) as usize;

    match context.dispatcher.readdir(dirid, args.cookie, estimated_max_results).await {
        Ok(page) => {
            let mut all_entries_written = true;
            let mut counting_output = WriteCounter::new(output);

            xdr::rpc::success_reply(xid).serialize(&mut counting_output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(&mut counting_output)?;
            dir_attr.serialize(&mut counting_output)?;
            verifier.serialize(&mut counting_output)?;

            for (index, entry) in page.entries.iter().enumerate() {
                let wire_entry = nfs3::dir::entry3 {
                    fileid: entry.id.0,
                    name: entry.name.as_slice().into(),
                    cookie: args.cookie + index as u64 + 1,
                };
                let mut staged: Vec<u8> = Vec::new();
                true.serialize(&mut staged)?;
                wire_entry.serialize(&mut staged)?;
                if counting_output.bytes_written() + staged.len() >= max_bytes_allowed {
                    trace!(committed = index, "entry budget exhausted, truncating");
                    all_entries_written = false;
                    break;
                }
                counting_output.write_all(&staged)?;
            }
            // List terminator, then eof, which only holds if nothing
            // was truncated away.
            false.serialize(&mut counting_output)?;
            (page.eof && all_entries_written).serialize(&mut counting_output)?;
        }
        Err(err) => {
            debug!(xid, %dirid, %err, "readdir failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            dir_attr.serialize(output)?;
        }
    }
    Ok(())
}
