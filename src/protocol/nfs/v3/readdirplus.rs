//! READDIRPLUS procedure (RFC 1813 section 3.3.17): READDIR with
//! attributes and a handle attached to every entry, saving the client a
//! LOOKUP per name.

use std::io::{Read, Write};

use tracing::{debug, trace};

use super::{post_attr_for, resolve_fh, status_of};
use crate::dispatch::VfsDispatcher;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};
use crate::write_counter::WriteCounter;

const REPLY_TAIL_RESERVE: usize = 128;

pub async fn nfsproc3_readdirplus(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::READDIRPLUS3args>(input)?;
    debug!(
        xid,
        cookie = args.cookie,
        dircount = args.dircount,
        maxcount = args.maxcount,
        "nfsproc3_readdirplus"
    );

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

    let max_bytes_allowed = (args.maxcount as usize).saturating_sub(REPLY_TAIL_RESERVE);
    // dircount budgets only the READDIR subset of each entry: fileid,
    // name and cookie.
    let max_dircount_bytes = args.dircount as usize;
    let estimated_max_results = (args.maxcount / 16) as usize;

    match context.dispatcher.readdir(dirid, args.cookie, estimated_max_results).await {
        Ok(page) => {
            let mut all_entries_written = true;
            let mut accumulated_dircount = 0_usize;
            let mut counting_output = WriteCounter::new(output);

            xdr::rpc::success_reply(xid).serialize(&mut counting_output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(&mut counting_output)?;
            dir_attr.serialize(&mut counting_output)?;
            verifier.serialize(&mut counting_output)?;

            for (index, entry) in page.entries.iter().enumerate() {
                let name_attributes = post_attr_for(context, entry.id).await;
                let wire_entry = nfs3::dir::entryplus3 {
                    fileid: entry.id.0,
                    name: entry.name.as_slice().into(),
                    cookie: args.cookie + index as u64 + 1,
                    name_attributes,
                    name_handle: nfs3::post_op_fh3::handle(nfs3::nfs_fh3 {
                        data: context.dispatcher.handle_for(entry.id),
                    }),
                };
                let mut staged: Vec<u8> = Vec::new();
                true.serialize(&mut staged)?;
                wire_entry.serialize(&mut staged)?;
                let entry_dircount = std::mem::size_of::<nfs3::fileid3>()
                    + std::mem::size_of::<u32>()
                    + entry.name.len()
                    + std::mem::size_of::<nfs3::cookie3>();
                if counting_output.bytes_written() + staged.len() >= max_bytes_allowed
                    || accumulated_dircount + entry_dircount >= max_dircount_bytes
                {
                    trace!(committed = index, "entry budget exhausted, truncating");
                    all_entries_written = false;
                    break;
                }
                counting_output.write_all(&staged)?;
                accumulated_dircount += entry_dircount;
            }
            false.serialize(&mut counting_output)?;
            (page.eof && all_entries_written).serialize(&mut counting_output)?;
        }
        Err(err) => {
            debug!(xid, %dirid, %err, "readdirplus failed");
            xdr::rpc::success_reply(xid).serialize(output)?;
            status_of(&err).serialize(output)?;
            dir_attr.serialize(output)?;
        }
    }
    Ok(())
}
