//! ONC RPC message envelopes (RFC 5531).
//!
//! Every message starts with a transaction id followed by a discriminated
//! call/reply body. The xid is opaque to the server: it is echoed verbatim
//! in the reply, accepted or denied alike, and is the client's only means
//! of matching replies to calls. Nothing here interprets it.

#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use super::*;

/// The one RPC protocol version this server speaks; also the `{low, high}`
/// bounds reported in an RPC_MISMATCH rejection.
pub const RPC_VERSION: u32 = 2;

/// Authentication failure codes carried by an AUTH_ERROR rejection.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, num_derive::FromPrimitive, num_derive::ToPrimitive)]
#[repr(u32)]
pub enum auth_stat {
    /// Bad credential (seal broken).
    #[default]
    AUTH_BADCRED = 1,
    /// Client must begin a new session.
    AUTH_REJECTEDCRED = 2,
    /// Bad verifier (seal broken).
    AUTH_BADVERF = 3,
    /// Verifier expired or replayed.
    AUTH_REJECTEDVERF = 4,
    /// Rejected for security reasons; also the answer for flavors this
    /// server does not support.
    AUTH_TOOWEAK = 5,
    /// Invalid server response verifier.
    AUTH_INVALIDRESP = 6,
    /// Unknown failure.
    AUTH_FAILED = 7,
}
impl SerializeEnum for auth_stat {}
impl DeserializeEnum for auth_stat {}

/// Credential flavor of an [`opaque_auth`].
///
/// Decoding keeps flavors this server has no notion of instead of failing:
/// an unsupported flavor is a policy decision for the authentication gate
/// (answered with AUTH_ERROR), not a malformed message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum auth_flavor {
    AUTH_NONE,
    AUTH_UNIX,
    AUTH_SHORT,
    AUTH_DES,
    /// A flavor number with no registered meaning here.
    UNKNOWN(u32),
}

impl Default for auth_flavor {
    fn default() -> auth_flavor {
        auth_flavor::AUTH_NONE
    }
}

impl auth_flavor {
    pub fn code(self) -> u32 {
        match self {
            auth_flavor::AUTH_NONE => 0,
            auth_flavor::AUTH_UNIX => 1,
            auth_flavor::AUTH_SHORT => 2,
            auth_flavor::AUTH_DES => 3,
            auth_flavor::UNKNOWN(code) => code,
        }
    }
}

impl Serialize for auth_flavor {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.code().serialize(dest)
    }
}

impl Deserialize for auth_flavor {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<u32>(src)? {
            0 => auth_flavor::AUTH_NONE,
            1 => auth_flavor::AUTH_UNIX,
            2 => auth_flavor::AUTH_SHORT,
            3 => auth_flavor::AUTH_DES,
            code => auth_flavor::UNKNOWN(code),
        };
        Ok(())
    }
}

/// AUTH_UNIX credential body: caller identity as uid/gid numbers.
#[derive(Clone, Debug, Default)]
pub struct auth_unix {
    /// Arbitrary client stamp.
    pub stamp: u32,
    /// Name of the calling machine.
    pub machinename: Vec<u8>,
    /// Effective user id of the caller.
    pub uid: u32,
    /// Effective group id of the caller.
    pub gid: u32,
    /// Supplementary group ids.
    pub gids: Vec<u32>,
}
DeserializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);
SerializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);

/// A flavor tag plus the opaque credential body carried on every call.
///
/// The body's interpretation belongs to the flavor; the envelope codec
/// moves it as bytes. The server accepts only flavors it recognizes and
/// answers everything else with an AUTH_ERROR rejection before dispatch.
#[derive(Clone, Debug, Default)]
pub struct opaque_auth {
    pub flavor: auth_flavor,
    pub body: Vec<u8>,
}
DeserializeStruct!(opaque_auth, flavor, body);
SerializeStruct!(opaque_auth, flavor, body);

/// The RPC message envelope: transaction id plus call or reply body.
#[derive(Clone, Debug, Default)]
pub struct rpc_msg {
    /// Matched by clients, echoed by servers, interpreted by neither.
    pub xid: u32,
    pub body: rpc_body,
}
DeserializeStruct!(rpc_msg, xid, body);
SerializeStruct!(rpc_msg, xid, body);

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug)]
pub enum rpc_body {
    CALL(call_body),
    REPLY(reply_body),
}

impl Default for rpc_body {
    fn default() -> rpc_body {
        rpc_body::CALL(call_body::default())
    }
}

impl Serialize for rpc_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            rpc_body::CALL(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            rpc_body::REPLY(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for rpc_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = rpc_body::CALL(deserialize(src)?),
            1 => *self = rpc_body::REPLY(deserialize(src)?),
            tag => return Err(utils::invalid_data(format!("invalid msg_type {tag}"))),
        }
        Ok(())
    }
}

/// Addressing and credentials of one remote procedure call.
///
/// Every field except the enclosing xid is validated before dispatch:
/// `rpcvers` must be [`RPC_VERSION`], the credential flavor must be
/// supported, and `prog`/`vers`/`proc` must name a procedure this server
/// implements.
#[derive(Clone, Debug, Default)]
pub struct call_body {
    pub rpcvers: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
    pub cred: opaque_auth,
    pub verf: opaque_auth,
    /* procedure-specific arguments follow on the wire */
}
DeserializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);
SerializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);

/// Top-level accepted/denied discriminant of a reply.
#[derive(Clone, Debug)]
pub enum reply_body {
    MSG_ACCEPTED(accepted_reply),
    MSG_DENIED(rejected_reply),
}

impl Default for reply_body {
    fn default() -> reply_body {
        reply_body::MSG_ACCEPTED(accepted_reply::default())
    }
}

impl Serialize for reply_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            reply_body::MSG_ACCEPTED(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            reply_body::MSG_DENIED(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for reply_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = reply_body::MSG_ACCEPTED(deserialize(src)?),
            1 => *self = reply_body::MSG_DENIED(deserialize(src)?),
            tag => return Err(utils::invalid_data(format!("invalid reply_stat {tag}"))),
        }
        Ok(())
    }
}

/// Lowest and highest version the server supports, reported on a mismatch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct mismatch_info {
    pub low: u32,
    pub high: u32,
}
DeserializeStruct!(mismatch_info, low, high);
SerializeStruct!(mismatch_info, low, high);

/// Reply to a call the server agreed to process. Processing can still fail;
/// the `reply_data` union says how.
#[derive(Clone, Debug, Default)]
pub struct accepted_reply {
    /// Server verifier; AUTH_NONE with an empty body here.
    pub verf: opaque_auth,
    pub reply_data: accept_body,
}
DeserializeStruct!(accepted_reply, verf, reply_data);
SerializeStruct!(accepted_reply, verf, reply_data);

/// Outcome union of an accepted call. SUCCESS is followed on the wire by
/// the procedure's own result structure.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Default)]
pub enum accept_body {
    #[default]
    SUCCESS,
    /// Program number not served here.
    PROG_UNAVAIL,
    /// Program served, requested version is not; carries supported bounds.
    PROG_MISMATCH(mismatch_info),
    /// Procedure number unknown within the program.
    PROC_UNAVAIL,
    /// Arguments failed to decode.
    GARBAGE_ARGS,
}

impl Serialize for accept_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            accept_body::SUCCESS => 0_u32.serialize(dest),
            accept_body::PROG_UNAVAIL => 1_u32.serialize(dest),
            accept_body::PROG_MISMATCH(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)
            }
            accept_body::PROC_UNAVAIL => 3_u32.serialize(dest),
            accept_body::GARBAGE_ARGS => 4_u32.serialize(dest),
        }
    }
}

impl Deserialize for accept_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = accept_body::SUCCESS,
            1 => *self = accept_body::PROG_UNAVAIL,
            2 => *self = accept_body::PROG_MISMATCH(deserialize(src)?),
            3 => *self = accept_body::PROC_UNAVAIL,
            4 => *self = accept_body::GARBAGE_ARGS,
            tag => return Err(utils::invalid_data(format!("invalid accept_stat {tag}"))),
        }
        Ok(())
    }
}

/// Why a call was denied. Exactly one arm is populated, selected by the
/// `reject_stat` discriminant on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum rejected_reply {
    /// Caller spoke an RPC protocol version (or, for a known program, a
    /// program version) outside the supported bounds.
    RPC_MISMATCH(mismatch_info),
    /// Caller's credentials were refused.
    AUTH_ERROR(auth_stat),
}

impl Default for rejected_reply {
    fn default() -> rejected_reply {
        rejected_reply::AUTH_ERROR(auth_stat::default())
    }
}

impl Serialize for rejected_reply {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            rejected_reply::RPC_MISMATCH(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)
            }
            rejected_reply::AUTH_ERROR(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)
            }
        }
    }
}

impl Deserialize for rejected_reply {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = rejected_reply::RPC_MISMATCH(deserialize(src)?),
            1 => *self = rejected_reply::AUTH_ERROR(deserialize(src)?),
            tag => return Err(utils::invalid_data(format!("invalid reject_stat {tag}"))),
        }
        Ok(())
    }
}

fn accepted(xid: u32, reply_data: accept_body) -> rpc_msg {
    let reply =
        reply_body::MSG_ACCEPTED(accepted_reply { verf: opaque_auth::default(), reply_data });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Accepted reply whose SUCCESS payload the caller appends next.
pub fn success_reply(xid: u32) -> rpc_msg {
    accepted(xid, accept_body::SUCCESS)
}

/// Accepted reply: program number not served.
pub fn prog_unavail_reply(xid: u32) -> rpc_msg {
    accepted(xid, accept_body::PROG_UNAVAIL)
}

/// Accepted reply: procedure number unknown within the program.
pub fn proc_unavail_reply(xid: u32) -> rpc_msg {
    accepted(xid, accept_body::PROC_UNAVAIL)
}

/// Accepted reply: the procedure's arguments failed to decode.
pub fn garbage_args_reply(xid: u32) -> rpc_msg {
    accepted(xid, accept_body::GARBAGE_ARGS)
}

/// Denied reply carrying the supported version bounds. Used both for an
/// unsupported RPC protocol version and for a known program called at an
/// unsupported program version.
pub fn version_mismatch_reply(xid: u32, low: u32, high: u32) -> rpc_msg {
    let reply = reply_body::MSG_DENIED(rejected_reply::RPC_MISMATCH(mismatch_info { low, high }));
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Denied reply for a credential flavor the server refuses.
pub fn auth_error_reply(xid: u32, stat: auth_stat) -> rpc_msg {
    let reply = reply_body::MSG_DENIED(rejected_reply::AUTH_ERROR(stat));
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}
