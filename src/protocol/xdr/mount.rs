//! XDR structures for the MOUNT protocol (RFC 1813 Appendix I).
//!
//! MOUNT bootstraps an NFS session: a client names an export path and
//! receives the file handle that roots everything it will ever address on
//! this server.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::{
    deserialize, deserialize_bounded_opaque, Deserialize, DeserializeEnum, DeserializeStruct,
    Serialize, SerializeEnum, SerializeStruct,
};

/// RPC program number of the MOUNT service.
pub const PROGRAM: u32 = 100005;
/// The only MOUNT version served.
pub const VERSION: u32 = 3;

/// Maximum bytes in an export path.
pub const MNTPATHLEN: u32 = 1024;
/// Maximum bytes in a client hostname.
pub const MNTNAMLEN: u32 = 255;
/// Maximum bytes in a version 3 file handle.
pub const FHSIZE3: u32 = 64;

/// File handle returned by MNT; byte-identical to the NFS `nfs_fh3`.
pub type fhandle3 = Vec<u8>;

/// Export path named by the client. Decoded with the [`MNTPATHLEN`] bound.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct dirpath(pub Vec<u8>);

impl From<&str> for dirpath {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().into())
    }
}

impl Serialize for dirpath {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.as_slice().serialize(dest)
    }
}

impl Deserialize for dirpath {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0 = deserialize_bounded_opaque(src, MNTPATHLEN as usize)?;
        Ok(())
    }
}

/// MOUNT status codes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum mountstat3 {
    #[default]
    MNT3_OK = 0,
    MNT3ERR_PERM = 1,
    MNT3ERR_NOENT = 2,
    MNT3ERR_IO = 5,
    MNT3ERR_ACCES = 13,
    MNT3ERR_NOTDIR = 20,
    MNT3ERR_INVAL = 22,
    MNT3ERR_NAMETOOLONG = 63,
    MNT3ERR_NOTSUPP = 10004,
    MNT3ERR_SERVERFAULT = 10006,
}
impl SerializeEnum for mountstat3 {}
impl DeserializeEnum for mountstat3 {}

/// Successful MNT result: the root handle plus the auth flavors the server
/// will accept on the NFS program.
#[derive(Clone, Debug, Default)]
pub struct mountres3_ok {
    pub fhandle: fhandle3,
    pub auth_flavors: Vec<u32>,
}
DeserializeStruct!(mountres3_ok, fhandle, auth_flavors);
SerializeStruct!(mountres3_ok, fhandle, auth_flavors);

/// MOUNT version 3 procedure numbers.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum MountProc3 {
    NULL = 0,
    MNT = 1,
    DUMP = 2,
    UMNT = 3,
    UMNTALL = 4,
    EXPORT = 5,
    /// Sentinel for out-of-table procedure numbers; answered with
    /// PROC_UNAVAIL.
    INVALID = 6,
}
impl SerializeEnum for MountProc3 {}
impl DeserializeEnum for MountProc3 {}
