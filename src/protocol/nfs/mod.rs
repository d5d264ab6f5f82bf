//! Program handlers the RPC layer routes accepted calls to.

pub mod mount;
pub mod v3;
