//! Argument and result structures for the directory procedures: CREATE,
//! MKDIR, SYMLINK, MKNOD, RENAME, READDIR and READDIRPLUS.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// How CREATE describes the new file: initial attributes for UNCHECKED
/// and GUARDED, a client verifier for EXCLUSIVE.
#[derive(Clone, Debug)]
pub enum createhow3 {
    UNCHECKED(sattr3),
    GUARDED(sattr3),
    EXCLUSIVE(createverf3),
}

impl Default for createhow3 {
    fn default() -> createhow3 {
        createhow3::UNCHECKED(sattr3::default())
    }
}

impl Serialize for createhow3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            createhow3::UNCHECKED(attr) => {
                0_u32.serialize(dest)?;
                attr.serialize(dest)
            }
            createhow3::GUARDED(attr) => {
                1_u32.serialize(dest)?;
                attr.serialize(dest)
            }
            createhow3::EXCLUSIVE(verf) => {
                2_u32.serialize(dest)?;
                verf.serialize(dest)
            }
        }
    }
}

impl Deserialize for createhow3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = createhow3::UNCHECKED(deserialize(src)?),
            1 => *self = createhow3::GUARDED(deserialize(src)?),
            2 => *self = createhow3::EXCLUSIVE(deserialize(src)?),
            tag => {
                return Err(super::super::utils::invalid_data(format!(
                    "invalid createmode3 {tag}"
                )))
            }
        }
        Ok(())
    }
}

/// CREATE arguments.
#[derive(Clone, Debug, Default)]
pub struct CREATE3args {
    pub dirops: diropargs3,
    pub how: createhow3,
}
DeserializeStruct!(CREATE3args, dirops, how);
SerializeStruct!(CREATE3args, dirops, how);

/// MKDIR arguments.
#[derive(Clone, Debug, Default)]
pub struct MKDIR3args {
    pub dirops: diropargs3,
    pub attributes: sattr3,
}
DeserializeStruct!(MKDIR3args, dirops, attributes);
SerializeStruct!(MKDIR3args, dirops, attributes);

/// SYMLINK arguments.
#[derive(Clone, Debug, Default)]
pub struct SYMLINK3args {
    pub dirops: diropargs3,
    pub symlink: symlinkdata3,
}
DeserializeStruct!(SYMLINK3args, dirops, symlink);
SerializeStruct!(SYMLINK3args, dirops, symlink);

/// RENAME arguments: source and destination directory/name pairs.
#[derive(Clone, Debug, Default)]
pub struct RENAME3args {
    pub from: diropargs3,
    pub to: diropargs3,
}
DeserializeStruct!(RENAME3args, from, to);
SerializeStruct!(RENAME3args, from, to);

/// Device class for MKNOD. Decoded for completeness; this server answers
/// MKNOD with NFS3ERR_NOTSUPP.
#[derive(Copy, Clone, Debug, Default, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum devicetype3 {
    #[default]
    NF3CHR = 0,
    NF3BLK = 1,
    NF3SOCK = 2,
    NF3FIFO = 3,
}
impl SerializeEnum for devicetype3 {}
impl DeserializeEnum for devicetype3 {}

/// Attributes plus device numbers for a character or block node.
#[derive(Clone, Debug, Default)]
pub struct devicedata3 {
    pub dev_attributes: sattr3,
    pub spec: specdata3,
}
DeserializeStruct!(devicedata3, dev_attributes, spec);
SerializeStruct!(devicedata3, dev_attributes, spec);

/// What MKNOD is asked to create, discriminated by [`devicetype3`].
#[derive(Clone, Debug)]
pub enum mknoddata3 {
    CHR(devicedata3),
    BLK(devicedata3),
    SOCK(sattr3),
    FIFO(sattr3),
}

impl Default for mknoddata3 {
    fn default() -> mknoddata3 {
        mknoddata3::FIFO(sattr3::default())
    }
}

impl Serialize for mknoddata3 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            mknoddata3::CHR(dev) => {
                devicetype3::NF3CHR.serialize(dest)?;
                dev.serialize(dest)
            }
            mknoddata3::BLK(dev) => {
                devicetype3::NF3BLK.serialize(dest)?;
                dev.serialize(dest)
            }
            mknoddata3::SOCK(attr) => {
                devicetype3::NF3SOCK.serialize(dest)?;
                attr.serialize(dest)
            }
            mknoddata3::FIFO(attr) => {
                devicetype3::NF3FIFO.serialize(dest)?;
                attr.serialize(dest)
            }
        }
    }
}

impl Deserialize for mknoddata3 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<devicetype3>(src)? {
            devicetype3::NF3CHR => mknoddata3::CHR(deserialize(src)?),
            devicetype3::NF3BLK => mknoddata3::BLK(deserialize(src)?),
            devicetype3::NF3SOCK => mknoddata3::SOCK(deserialize(src)?),
            devicetype3::NF3FIFO => mknoddata3::FIFO(deserialize(src)?),
        };
        Ok(())
    }
}

/// MKNOD arguments. Decoded in full; the server answers MKNOD with
/// NFS3ERR_NOTSUPP, since a working copy never contains device nodes.
#[derive(Clone, Debug, Default)]
pub struct MKNOD3args {
    pub dirops: diropargs3,
    pub what: mknoddata3,
}
DeserializeStruct!(MKNOD3args, dirops, what);
SerializeStruct!(MKNOD3args, dirops, what);

/// One READDIR entry: id, name, and the cookie resuming iteration after
/// this entry.
#[derive(Clone, Debug, Default)]
pub struct entry3 {
    pub fileid: fileid3,
    pub name: filename3,
    pub cookie: cookie3,
}
DeserializeStruct!(entry3, fileid, name, cookie);
SerializeStruct!(entry3, fileid, name, cookie);

/// READDIR arguments. `cookie` 0 starts from the beginning; otherwise
/// `cookieverf` must equal the verifier issued with the cookie.
#[derive(Clone, Debug, Default)]
pub struct READDIR3args {
    pub dir: nfs_fh3,
    pub cookie: cookie3,
    pub cookieverf: cookieverf3,
    /// Reply byte budget covering the entry list.
    pub count: count3,
}
DeserializeStruct!(READDIR3args, dir, cookie, cookieverf, count);
SerializeStruct!(READDIR3args, dir, cookie, cookieverf, count);

/// One READDIRPLUS entry: like [`entry3`] with attributes and a handle.
#[derive(Clone, Debug, Default)]
pub struct entryplus3 {
    pub fileid: fileid3,
    pub name: filename3,
    pub cookie: cookie3,
    pub name_attributes: post_op_attr,
    pub name_handle: post_op_fh3,
}
DeserializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);
SerializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);

/// READDIRPLUS arguments. `dircount` budgets the directory portion of the
/// reply, `maxcount` the whole reply.
#[derive(Clone, Debug, Default)]
pub struct READDIRPLUS3args {
    pub dir: nfs_fh3,
    pub cookie: cookie3,
    pub cookieverf: cookieverf3,
    pub dircount: count3,
    pub maxcount: count3,
}
DeserializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);
SerializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);
