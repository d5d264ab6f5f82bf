//! NFS version 3 procedure handlers (RFC 1813).
//!
//! One module per procedure, all routed through [`handle_nfs`]. Every
//! handler follows the same shape: decode the argument structure, resolve
//! file handles through the mount's dispatcher, run one canonical
//! operation, and encode either the success payload or the status code
//! the dispatcher error maps to. Handlers never terminate the connection;
//! a failed call is a well-formed error reply.

use std::io::{Read, Write};

use num_traits::cast::FromPrimitive;
use tracing::warn;

use crate::dispatch::{
    AttrPatch, DispatchError, ObjectAttr, ObjectId, ObjectKind, TimePatch, Timestamp,
    VfsDispatcher,
};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, nfs3, Serialize};

mod access;
mod commit;
mod create;
mod fsinfo;
mod fsstat;
mod getattr;
mod link;
mod lookup;
mod mkdir;
mod mknod;
mod null;
mod pathconf;
mod read;
mod readdir;
mod readdirplus;
mod readlink;
mod remove;
mod rename;
mod rmdir;
mod setattr;
mod symlink;
mod write;

use access::nfsproc3_access;
use commit::nfsproc3_commit;
use create::nfsproc3_create;
use fsinfo::nfsproc3_fsinfo;
use fsstat::nfsproc3_fsstat;
use getattr::nfsproc3_getattr;
use link::nfsproc3_link;
use lookup::nfsproc3_lookup;
use mkdir::nfsproc3_mkdir;
use mknod::nfsproc3_mknod;
use null::nfsproc3_null;
use pathconf::nfsproc3_pathconf;
use read::nfsproc3_read;
use readdir::nfsproc3_readdir;
use readdirplus::nfsproc3_readdirplus;
use readlink::nfsproc3_readlink;
use remove::nfsproc3_remove;
use rename::nfsproc3_rename;
use rmdir::nfsproc3_rmdir;
use setattr::nfsproc3_setattr;
use symlink::nfsproc3_symlink;
use write::nfsproc3_write;

/// Routes one accepted NFS call to its procedure handler.
///
/// A call for any program version other than [`nfs3::VERSION`] is denied
/// with RPC_MISMATCH carrying exactly the supported bounds; a procedure
/// number outside the table is answered PROC_UNAVAIL. Neither reaches a
/// handler.
pub async fn handle_nfs(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != nfs3::VERSION {
        warn!(vers = call.vers, supported = nfs3::VERSION, "unsupported nfs program version");
        xdr::rpc::version_mismatch_reply(xid, nfs3::VERSION, nfs3::VERSION).serialize(output)?;
        return Ok(());
    }
    let proc = nfs3::NfsProc3::from_u32(call.proc).unwrap_or(nfs3::NfsProc3::INVALID);

    match proc {
        nfs3::NfsProc3::NULL => nfsproc3_null(xid, output)?,
        nfs3::NfsProc3::GETATTR => nfsproc3_getattr(xid, input, output, context).await?,
        nfs3::NfsProc3::SETATTR => nfsproc3_setattr(xid, input, output, context).await?,
        nfs3::NfsProc3::LOOKUP => nfsproc3_lookup(xid, input, output, context).await?,
        nfs3::NfsProc3::ACCESS => nfsproc3_access(xid, input, output, context).await?,
        nfs3::NfsProc3::READLINK => nfsproc3_readlink(xid, input, output, context).await?,
        nfs3::NfsProc3::READ => nfsproc3_read(xid, input, output, context).await?,
        nfs3::NfsProc3::WRITE => nfsproc3_write(xid, input, output, context).await?,
        nfs3::NfsProc3::CREATE => nfsproc3_create(xid, input, output, context).await?,
        nfs3::NfsProc3::MKDIR => nfsproc3_mkdir(xid, input, output, context).await?,
        nfs3::NfsProc3::SYMLINK => nfsproc3_symlink(xid, input, output, context).await?,
        nfs3::NfsProc3::MKNOD => nfsproc3_mknod(xid, input, output, context).await?,
        nfs3::NfsProc3::REMOVE => nfsproc3_remove(xid, input, output, context).await?,
        nfs3::NfsProc3::RMDIR => nfsproc3_rmdir(xid, input, output, context).await?,
        nfs3::NfsProc3::RENAME => nfsproc3_rename(xid, input, output, context).await?,
        nfs3::NfsProc3::LINK => nfsproc3_link(xid, input, output, context).await?,
        nfs3::NfsProc3::READDIR => nfsproc3_readdir(xid, input, output, context).await?,
        nfs3::NfsProc3::READDIRPLUS => nfsproc3_readdirplus(xid, input, output, context).await?,
        nfs3::NfsProc3::FSSTAT => nfsproc3_fsstat(xid, input, output, context).await?,
        nfs3::NfsProc3::FSINFO => nfsproc3_fsinfo(xid, input, output, context).await?,
        nfs3::NfsProc3::PATHCONF => nfsproc3_pathconf(xid, input, output, context).await?,
        nfs3::NfsProc3::COMMIT => nfsproc3_commit(xid, input, output, context).await?,
        nfs3::NfsProc3::INVALID => {
            warn!(proc = call.proc, "unknown nfs procedure");
            xdr::rpc::proc_unavail_reply(xid).serialize(output)?;
        }
    }
    Ok(())
}

/// Fixed, total mapping from the dispatcher taxonomy to NFS status codes.
fn status_of(err: &DispatchError) -> nfs3::nfsstat3 {
    match err {
        DispatchError::NotFound => nfs3::nfsstat3::NFS3ERR_NOENT,
        DispatchError::NotADirectory => nfs3::nfsstat3::NFS3ERR_NOTDIR,
        DispatchError::IsADirectory => nfs3::nfsstat3::NFS3ERR_ISDIR,
        DispatchError::AlreadyExists => nfs3::nfsstat3::NFS3ERR_EXIST,
        DispatchError::StaleHandle => nfs3::nfsstat3::NFS3ERR_STALE,
        DispatchError::StaleCookie => nfs3::nfsstat3::NFS3ERR_BAD_COOKIE,
        DispatchError::PermissionDenied => nfs3::nfsstat3::NFS3ERR_ACCES,
        DispatchError::NoSpace => nfs3::nfsstat3::NFS3ERR_NOSPC,
        DispatchError::IoFailure(_) => nfs3::nfsstat3::NFS3ERR_IO,
        DispatchError::Unimplemented => nfs3::nfsstat3::NFS3ERR_NOTSUPP,
    }
}

fn to_nfstime(time: Timestamp) -> nfs3::nfstime3 {
    nfs3::nfstime3 { seconds: time.seconds as u32, nseconds: time.nanos }
}

fn to_fattr3(attr: &ObjectAttr) -> nfs3::fattr3 {
    let ftype = match attr.kind {
        ObjectKind::Regular => nfs3::ftype3::NF3REG,
        ObjectKind::Directory => nfs3::ftype3::NF3DIR,
        ObjectKind::Symlink => nfs3::ftype3::NF3LNK,
    };
    nfs3::fattr3 {
        ftype,
        mode: attr.mode,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        size: attr.size,
        used: attr.size,
        rdev: nfs3::specdata3::default(),
        fsid: 0,
        fileid: attr.id.0,
        atime: to_nfstime(attr.atime),
        mtime: to_nfstime(attr.mtime),
        ctime: to_nfstime(attr.ctime),
    }
}

fn to_wcc_attr(attr: &ObjectAttr) -> nfs3::wcc_attr {
    nfs3::wcc_attr {
        size: attr.size,
        mtime: to_nfstime(attr.mtime),
        ctime: to_nfstime(attr.ctime),
    }
}

fn to_patch(sattr: &nfs3::sattr3) -> AttrPatch {
    let time_patch = |time: &nfs3::set_time| match time {
        nfs3::set_time::DONT_CHANGE => None,
        nfs3::set_time::SET_TO_SERVER_TIME => Some(TimePatch::Now),
        nfs3::set_time::SET_TO_CLIENT_TIME(t) => Some(TimePatch::At(Timestamp {
            seconds: t.seconds as u64,
            nanos: t.nseconds,
        })),
    };
    AttrPatch {
        mode: match sattr.mode {
            nfs3::set_mode3::mode(mode) => Some(mode),
            nfs3::set_mode3::Void => None,
        },
        uid: match sattr.uid {
            nfs3::set_uid3::uid(uid) => Some(uid),
            nfs3::set_uid3::Void => None,
        },
        gid: match sattr.gid {
            nfs3::set_gid3::gid(gid) => Some(gid),
            nfs3::set_gid3::Void => None,
        },
        size: match sattr.size {
            nfs3::set_size3::size(size) => Some(size),
            nfs3::set_size3::Void => None,
        },
        atime: time_patch(&sattr.atime),
        mtime: time_patch(&sattr.mtime),
    }
}

/// Resolves a wire handle to an object id, or the status to answer with.
fn resolve_fh(context: &rpc::Context, fh: &nfs3::nfs_fh3) -> Result<ObjectId, nfs3::nfsstat3> {
    context.dispatcher.object_for_handle(&fh.data).map_err(|err| status_of(&err))
}

/// Object attributes as the optional post-operation field, Void when the
/// dispatcher cannot produce them.
async fn post_attr_for(context: &rpc::Context, id: ObjectId) -> nfs3::post_op_attr {
    context.dispatcher.getattr(id).await.ok().map(|attr| to_fattr3(&attr)).into()
}

/// Object attributes as the optional pre-operation field.
async fn pre_attr_for(context: &rpc::Context, id: ObjectId) -> nfs3::pre_op_attr {
    match context.dispatcher.getattr(id).await {
        Ok(attr) => nfs3::pre_op_attr::attributes(to_wcc_attr(&attr)),
        Err(_) => nfs3::pre_op_attr::Void,
    }
}

/// Verifier detecting server restarts between WRITE and COMMIT: the
/// session generation, which changes exactly when handles go stale.
fn write_verf(context: &rpc::Context) -> nfs3::writeverf3 {
    context.dispatcher.generation().to_be_bytes()
}
