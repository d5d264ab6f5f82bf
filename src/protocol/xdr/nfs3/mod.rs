//! XDR wire structures and constants for NFS version 3 (RFC 1813).
//!
//! Only the shapes the protocol puts on the wire live here: status codes,
//! attributes, handles, and the per-procedure argument/result structures in
//! the [`file`], [`dir`] and [`fs`] submodules. Translating these to and
//! from the canonical dispatcher types is the NFS procedure layer's job;
//! nothing in this module reaches outside the codec.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::{
    deserialize, deserialize_bounded_opaque, Deserialize, DeserializeBoolUnion, DeserializeEnum,
    DeserializeStruct, Serialize, SerializeBoolUnion, SerializeEnum, SerializeStruct,
};

pub mod dir;
pub mod file;
pub mod fs;

/// RPC program number of the NFS service.
pub const PROGRAM: u32 = 100003;
/// The only program version served; doubles as both bounds of the
/// mismatch report when a client asks for anything else.
pub const VERSION: u32 = 3;

/// Maximum size in bytes of an opaque file handle.
pub const NFS3_FHSIZE: u32 = 64;
/// Size in bytes of the READDIR/READDIRPLUS cookie verifier.
pub const NFS3_COOKIEVERFSIZE: u32 = 8;
/// Size in bytes of the exclusive-CREATE verifier.
pub const NFS3_CREATEVERFSIZE: u32 = 8;
/// Size in bytes of the asynchronous-WRITE verifier.
pub const NFS3_WRITEVERFSIZE: u32 = 8;

/// Maximum declared length accepted for a filename or path string.
/// Anything longer fails decode rather than being truncated.
pub const NFS3_NAMEMAX: u32 = 4096;

/// Byte string used for filenames and symlink targets.
///
/// NFS names are octet sequences with no mandated character set, so this
/// wraps raw bytes rather than `String`. Decoding enforces
/// [`NFS3_NAMEMAX`].
#[derive(Default, Clone, PartialEq, Eq)]
pub struct nfsstring(pub Vec<u8>);

impl nfsstring {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for nfsstring {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for nfsstring {
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl From<&str> for nfsstring {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().into())
    }
}

impl AsRef<[u8]> for nfsstring {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for nfsstring {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for nfsstring {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.as_slice().serialize(dest)
    }
}

impl Deserialize for nfsstring {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0 = deserialize_bounded_opaque(src, NFS3_NAMEMAX as usize)?;
        Ok(())
    }
}

/// NFSv3 procedure numbers.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum NfsProc3 {
    NULL = 0,
    GETATTR = 1,
    SETATTR = 2,
    LOOKUP = 3,
    ACCESS = 4,
    READLINK = 5,
    READ = 6,
    WRITE = 7,
    CREATE = 8,
    MKDIR = 9,
    SYMLINK = 10,
    MKNOD = 11,
    REMOVE = 12,
    RMDIR = 13,
    RENAME = 14,
    LINK = 15,
    READDIR = 16,
    READDIRPLUS = 17,
    FSSTAT = 18,
    FSINFO = 19,
    PATHCONF = 20,
    COMMIT = 21,
    /// Sentinel for procedure numbers outside the table; answered with
    /// PROC_UNAVAIL and never dispatched.
    INVALID = 22,
}

/// A component filename.
pub type filename3 = nfsstring;
/// A pathname or symlink target.
pub type nfspath3 = nfsstring;
/// File identifier, unique within the mount (inode number).
pub type fileid3 = u64;
/// Directory iteration position.
pub type cookie3 = u64;
/// Verifier proving a directory cookie is still meaningful.
pub type cookieverf3 = [u8; NFS3_COOKIEVERFSIZE as usize];
/// Verifier for exclusive CREATE idempotency.
pub type createverf3 = [u8; NFS3_CREATEVERFSIZE as usize];
/// Verifier detecting server restarts between WRITE and COMMIT.
pub type writeverf3 = [u8; NFS3_WRITEVERFSIZE as usize];
pub type uid3 = u32;
pub type gid3 = u32;
pub type size3 = u64;
pub type offset3 = u64;
pub type mode3 = u32;
pub type count3 = u32;

/// NFSv3 status codes. The dispatcher's error taxonomy maps onto these at
/// the point a reply is encoded; the mapping is total, with unrecognized
/// internal failures becoming [`nfsstat3::NFS3ERR_IO`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat3 {
    NFS3_OK = 0,
    /// Caller is neither a privileged user nor the owner.
    NFS3ERR_PERM = 1,
    /// No such file or directory.
    NFS3ERR_NOENT = 2,
    /// Hard I/O error while servicing the request.
    NFS3ERR_IO = 5,
    NFS3ERR_NXIO = 6,
    /// Permission denied for reasons other than ownership.
    NFS3ERR_ACCES = 13,
    NFS3ERR_EXIST = 17,
    NFS3ERR_XDEV = 18,
    NFS3ERR_NODEV = 19,
    /// A non-directory was named where a directory is required.
    NFS3ERR_NOTDIR = 20,
    /// A directory was named in a non-directory operation.
    NFS3ERR_ISDIR = 21,
    NFS3ERR_INVAL = 22,
    NFS3ERR_FBIG = 27,
    /// No space left on the backing store.
    NFS3ERR_NOSPC = 28,
    /// Mutation attempted on a read-only mount.
    NFS3ERR_ROFS = 30,
    NFS3ERR_MLINK = 31,
    NFS3ERR_NAMETOOLONG = 63,
    NFS3ERR_NOTEMPTY = 66,
    NFS3ERR_DQUOT = 69,
    /// The handle's object no longer exists, or the handle predates this
    /// server instance.
    NFS3ERR_STALE = 70,
    NFS3ERR_REMOTE = 71,
    /// Handle failed internal consistency checks.
    NFS3ERR_BADHANDLE = 10001,
    NFS3ERR_NOT_SYNC = 10002,
    /// READDIR cookie or verifier no longer matches the directory.
    NFS3ERR_BAD_COOKIE = 10003,
    /// Operation not supported by this server.
    NFS3ERR_NOTSUPP = 10004,
    NFS3ERR_TOOSMALL = 10005,
    NFS3ERR_SERVERFAULT = 10006,
    NFS3ERR_BADTYPE = 10007,
    NFS3ERR_JUKEBOX = 10008,
}
impl SerializeEnum for nfsstat3 {}
impl DeserializeEnum for nfsstat3 {}

/// File type of a filesystem object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype3 {
    #[default]
    NF3REG = 1,
    NF3DIR = 2,
    NF3BLK = 3,
    NF3CHR = 4,
    NF3LNK = 5,
    NF3SOCK = 6,
    NF3FIFO = 7,
}
impl SerializeEnum for ftype3 {}
impl DeserializeEnum for ftype3 {}

/// Major/minor numbers for device nodes. Always zero on this server; the
/// working copy never materializes device files.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct specdata3 {
    pub specdata1: u32,
    pub specdata2: u32,
}
DeserializeStruct!(specdata3, specdata1, specdata2);
SerializeStruct!(specdata3, specdata1, specdata2);

/// Opaque server-minted name for a filesystem object, stable for the
/// object's lifetime within one mount session.
///
/// The transport never reinterprets the bytes; decode only enforces the
/// [`NFS3_FHSIZE`] maximum so a hostile length prefix cannot balloon the
/// buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct nfs_fh3 {
    pub data: Vec<u8>,
}

impl Serialize for nfs_fh3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.data.as_slice().serialize(dest)
    }
}

impl Deserialize for nfs_fh3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.data = deserialize_bounded_opaque(src, NFS3_FHSIZE as usize)?;
        Ok(())
    }
}

/// Seconds/nanoseconds timestamp.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct nfstime3 {
    pub seconds: u32,
    pub nseconds: u32,
}
DeserializeStruct!(nfstime3, seconds, nseconds);
SerializeStruct!(nfstime3, seconds, nseconds);

/// Full attribute set of a filesystem object.
#[derive(Copy, Clone, Debug, Default)]
pub struct fattr3 {
    pub ftype: ftype3,
    pub mode: mode3,
    pub nlink: u32,
    pub uid: uid3,
    pub gid: gid3,
    pub size: size3,
    /// Bytes actually allocated; reported equal to `size` here.
    pub used: size3,
    pub rdev: specdata3,
    pub fsid: u64,
    pub fileid: fileid3,
    pub atime: nfstime3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
DeserializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);
SerializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);

/// Attribute subset used for weak cache consistency comparisons.
#[derive(Copy, Clone, Debug, Default)]
pub struct wcc_attr {
    pub size: size3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
DeserializeStruct!(wcc_attr, size, mtime, ctime);
SerializeStruct!(wcc_attr, size, mtime, ctime);

/// Object state before an operation, when the server had it on hand.
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum pre_op_attr {
    #[default]
    Void,
    attributes(wcc_attr),
}
DeserializeBoolUnion!(pre_op_attr, attributes);
SerializeBoolUnion!(pre_op_attr, attributes);

/// Object state after an operation, when the server had it on hand.
/// Returned on nearly every reply so clients can keep caches warm.
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum post_op_attr {
    #[default]
    Void,
    attributes(fattr3),
}
DeserializeBoolUnion!(post_op_attr, attributes);
SerializeBoolUnion!(post_op_attr, attributes);

impl From<Option<fattr3>> for post_op_attr {
    fn from(value: Option<fattr3>) -> Self {
        match value {
            Some(attr) => post_op_attr::attributes(attr),
            None => post_op_attr::Void,
        }
    }
}

/// Before/after attribute pair for operations that mutate an object.
#[derive(Copy, Clone, Debug, Default)]
pub struct wcc_data {
    pub before: pre_op_attr,
    pub after: post_op_attr,
}
DeserializeStruct!(wcc_data, before, after);
SerializeStruct!(wcc_data, before, after);

/// Optional file handle in creation replies.
#[derive(Clone, Debug, Default)]
#[repr(u32)]
pub enum post_op_fh3 {
    #[default]
    Void,
    handle(nfs_fh3),
}
DeserializeBoolUnion!(post_op_fh3, handle);
SerializeBoolUnion!(post_op_fh3, handle);

#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_mode3 {
    #[default]
    Void,
    mode(mode3),
}
DeserializeBoolUnion!(set_mode3, mode);
SerializeBoolUnion!(set_mode3, mode);

#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_uid3 {
    #[default]
    Void,
    uid(uid3),
}
DeserializeBoolUnion!(set_uid3, uid);
SerializeBoolUnion!(set_uid3, uid);

#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_gid3 {
    #[default]
    Void,
    gid(gid3),
}
DeserializeBoolUnion!(set_gid3, gid);
SerializeBoolUnion!(set_gid3, gid);

#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_size3 {
    #[default]
    Void,
    size(size3),
}
DeserializeBoolUnion!(set_size3, size);
SerializeBoolUnion!(set_size3, size);

/// How SETATTR should adjust a timestamp: leave it, stamp server time, or
/// take the client's value.
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum set_time {
    #[default]
    DONT_CHANGE,
    SET_TO_SERVER_TIME,
    SET_TO_CLIENT_TIME(nfstime3),
}

impl Serialize for set_time {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            set_time::DONT_CHANGE => 0_u32.serialize(dest),
            set_time::SET_TO_SERVER_TIME => 1_u32.serialize(dest),
            set_time::SET_TO_CLIENT_TIME(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for set_time {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = set_time::DONT_CHANGE,
            1 => *self = set_time::SET_TO_SERVER_TIME,
            2 => *self = set_time::SET_TO_CLIENT_TIME(deserialize(src)?),
            tag => {
                return Err(super::utils::invalid_data(format!("invalid time_how {tag}")));
            }
        }
        Ok(())
    }
}

/// Attribute changes requested by SETATTR and creation procedures.
#[derive(Copy, Clone, Debug, Default)]
pub struct sattr3 {
    pub mode: set_mode3,
    pub uid: set_uid3,
    pub gid: set_gid3,
    pub size: set_size3,
    pub atime: set_time,
    pub mtime: set_time,
}
DeserializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);
SerializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);

/// Directory handle plus a name within it; the argument shape shared by
/// LOOKUP, REMOVE, RMDIR and friends.
#[derive(Clone, Debug, Default)]
pub struct diropargs3 {
    pub dir: nfs_fh3,
    pub name: filename3,
}
DeserializeStruct!(diropargs3, dir, name);
SerializeStruct!(diropargs3, dir, name);

/// Target and initial attributes for SYMLINK.
#[derive(Clone, Debug, Default)]
pub struct symlinkdata3 {
    pub symlink_attributes: sattr3,
    pub symlink_data: nfspath3,
}
DeserializeStruct!(symlinkdata3, symlink_attributes, symlink_data);
SerializeStruct!(symlinkdata3, symlink_attributes, symlink_data);

/// Guard for conditional SETATTR: only apply if ctime matches.
#[derive(Copy, Clone, Debug, Default)]
#[repr(u32)]
pub enum sattrguard3 {
    #[default]
    Void,
    obj_ctime(nfstime3),
}
DeserializeBoolUnion!(sattrguard3, obj_ctime);
SerializeBoolUnion!(sattrguard3, obj_ctime);

/// SETATTR arguments.
#[derive(Clone, Debug, Default)]
pub struct SETATTR3args {
    pub object: nfs_fh3,
    pub new_attributes: sattr3,
    pub guard: sattrguard3,
}
DeserializeStruct!(SETATTR3args, object, new_attributes, guard);
SerializeStruct!(SETATTR3args, object, new_attributes, guard);

/// File creation disposition.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum createmode3 {
    /// Succeed whether or not the name exists.
    #[default]
    UNCHECKED = 0,
    /// Fail if the name exists.
    GUARDED = 1,
    /// Idempotent create keyed on a client verifier. Not supported here.
    EXCLUSIVE = 2,
}
impl SerializeEnum for createmode3 {}
impl DeserializeEnum for createmode3 {}

// ACCESS permission bits (RFC 1813 section 3.3.4).
pub const ACCESS3_READ: u32 = 0x0001;
pub const ACCESS3_LOOKUP: u32 = 0x0002;
pub const ACCESS3_MODIFY: u32 = 0x0004;
pub const ACCESS3_EXTEND: u32 = 0x0008;
pub const ACCESS3_DELETE: u32 = 0x0010;
pub const ACCESS3_EXECUTE: u32 = 0x0020;
