//! Argument and result structures for the file data procedures: READ,
//! WRITE and COMMIT (RFC 1813 sections 3.3.6, 3.3.7, 3.3.21), plus LINK.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::*;

/// READ arguments: handle, starting offset, byte count.
#[derive(Clone, Debug, Default)]
pub struct READ3args {
    pub file: nfs_fh3,
    pub offset: offset3,
    pub count: count3,
}
DeserializeStruct!(READ3args, file, offset, count);
SerializeStruct!(READ3args, file, offset, count);

/// Successful READ result. `count` is the bytes actually returned, which
/// is short of the request when `eof` is reached.
#[derive(Clone, Debug, Default)]
pub struct READ3resok {
    pub file_attributes: post_op_attr,
    pub count: count3,
    pub eof: bool,
    pub data: Vec<u8>,
}
DeserializeStruct!(READ3resok, file_attributes, count, eof, data);
SerializeStruct!(READ3resok, file_attributes, count, eof, data);

/// Requested durability of a WRITE.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum stable_how {
    /// Server may buffer; client must COMMIT later.
    #[default]
    UNSTABLE = 0,
    /// This request's data reaches stable storage before the reply.
    DATA_SYNC = 1,
    /// Data and metadata reach stable storage before the reply.
    FILE_SYNC = 2,
}
impl SerializeEnum for stable_how {}
impl DeserializeEnum for stable_how {}

/// WRITE arguments. `count` must match `data.len()`; a disagreement is
/// answered as garbage arguments.
#[derive(Clone, Debug, Default)]
pub struct WRITE3args {
    pub file: nfs_fh3,
    pub offset: offset3,
    pub count: count3,
    pub stable: u32,
    pub data: Vec<u8>,
}
DeserializeStruct!(WRITE3args, file, offset, count, stable, data);
SerializeStruct!(WRITE3args, file, offset, count, stable, data);

/// Successful WRITE result. `count` is the bytes actually committed and
/// may be less than requested.
#[derive(Clone, Debug, Default)]
pub struct WRITE3resok {
    pub file_wcc: wcc_data,
    pub count: count3,
    pub committed: stable_how,
    pub verf: writeverf3,
}
DeserializeStruct!(WRITE3resok, file_wcc, count, committed, verf);
SerializeStruct!(WRITE3resok, file_wcc, count, committed, verf);

/// COMMIT arguments: flush the byte range to stable storage.
#[derive(Clone, Debug, Default)]
pub struct COMMIT3args {
    pub file: nfs_fh3,
    pub offset: offset3,
    pub count: count3,
}
DeserializeStruct!(COMMIT3args, file, offset, count);
SerializeStruct!(COMMIT3args, file, offset, count);

/// Successful COMMIT result.
#[derive(Clone, Debug, Default)]
pub struct COMMIT3resok {
    pub file_wcc: wcc_data,
    pub verf: writeverf3,
}
DeserializeStruct!(COMMIT3resok, file_wcc, verf);
SerializeStruct!(COMMIT3resok, file_wcc, verf);

/// LINK arguments: existing file plus the directory/name of the new link.
#[derive(Clone, Debug, Default)]
pub struct LINK3args {
    pub file: nfs_fh3,
    pub link: diropargs3,
}
DeserializeStruct!(LINK3args, file, link);
SerializeStruct!(LINK3args, file, link);
