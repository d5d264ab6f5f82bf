//! The wire-protocol stack: XDR codec, ONC RPC message layer, and the NFS
//! and MOUNT program handlers built on them.

pub mod nfs;
pub mod rpc;
pub mod xdr;
