//! Argument and result structures for the filesystem information
//! procedures: FSSTAT, FSINFO and PATHCONF (RFC 1813 sections 3.3.18-20).

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use super::*;

// FSINFO property bits.
/// Hard links are supported.
pub const FSF_LINK: u32 = 0x0001;
/// Symbolic links are supported.
pub const FSF_SYMLINK: u32 = 0x0002;
/// PATHCONF answers are the same for every object in the filesystem.
pub const FSF_HOMOGENEOUS: u32 = 0x0008;
/// SETATTR can set time to the nanosecond.
pub const FSF_CANSETTIME: u32 = 0x0010;

/// Successful FSSTAT result: volatile usage counters for the filesystem.
#[derive(Clone, Debug, Default)]
pub struct FSSTAT3resok {
    pub obj_attributes: post_op_attr,
    /// Total bytes in the filesystem.
    pub tbytes: size3,
    /// Free bytes.
    pub fbytes: size3,
    /// Free bytes available to the caller.
    pub abytes: size3,
    /// Total file slots.
    pub tfiles: size3,
    /// Free file slots.
    pub ffiles: size3,
    /// Free file slots available to the caller.
    pub afiles: size3,
    /// Seconds the counters are expected to stay valid.
    pub invarsec: u32,
}
DeserializeStruct!(
    FSSTAT3resok,
    obj_attributes,
    tbytes,
    fbytes,
    abytes,
    tfiles,
    ffiles,
    afiles,
    invarsec
);
SerializeStruct!(
    FSSTAT3resok,
    obj_attributes,
    tbytes,
    fbytes,
    abytes,
    tfiles,
    ffiles,
    afiles,
    invarsec
);

/// Successful FSINFO result: static limits and preferences of the server.
#[derive(Clone, Debug, Default)]
pub struct FSINFO3resok {
    pub obj_attributes: post_op_attr,
    /// Maximum READ request size honored.
    pub rtmax: u32,
    /// Preferred READ request size.
    pub rtpref: u32,
    /// Suggested READ size multiple.
    pub rtmult: u32,
    /// Maximum WRITE request size honored.
    pub wtmax: u32,
    /// Preferred WRITE request size.
    pub wtpref: u32,
    /// Suggested WRITE size multiple.
    pub wtmult: u32,
    /// Preferred READDIR request size.
    pub dtpref: u32,
    /// Maximum file size.
    pub maxfilesize: size3,
    /// Server time granularity.
    pub time_delta: nfstime3,
    /// FSF_* property bits.
    pub properties: u32,
}
DeserializeStruct!(
    FSINFO3resok,
    obj_attributes,
    rtmax,
    rtpref,
    rtmult,
    wtmax,
    wtpref,
    wtmult,
    dtpref,
    maxfilesize,
    time_delta,
    properties
);
SerializeStruct!(
    FSINFO3resok,
    obj_attributes,
    rtmax,
    rtpref,
    rtmult,
    wtmax,
    wtpref,
    wtmult,
    dtpref,
    maxfilesize,
    time_delta,
    properties
);

/// Successful PATHCONF result: POSIX pathconf values for the object.
#[derive(Clone, Debug, Default)]
pub struct PATHCONF3resok {
    pub obj_attributes: post_op_attr,
    pub linkmax: u32,
    pub name_max: u32,
    pub no_trunc: bool,
    pub chown_restricted: bool,
    pub case_insensitive: bool,
    pub case_preserving: bool,
}
DeserializeStruct!(
    PATHCONF3resok,
    obj_attributes,
    linkmax,
    name_max,
    no_trunc,
    chown_restricted,
    case_insensitive,
    case_preserving
);
SerializeStruct!(
    PATHCONF3resok,
    obj_attributes,
    linkmax,
    name_max,
    no_trunc,
    chown_restricted,
    case_insensitive,
    case_preserving
);
