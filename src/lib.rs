//! Request dispatch and wire protocol core for a lazily materialized
//! working-copy filesystem.
//!
//! A mounted working copy looks complete to the operating system while
//! file content is fetched on demand from a backing store. This crate is
//! the layer between the two: it speaks NFS version 3 to the kernel over
//! a loopback TCP transport and translates every call into one of a
//! small set of canonical filesystem operations served by a platform
//! dispatcher.
//!
//! ## Main Components
//!
//! - `dispatch`: the canonical operation set ([`dispatch::VfsDispatcher`])
//!   and its platform-shaped variants, selected through
//!   [`dispatch::factory::DispatcherFactory`].
//!
//! - `store`: the [`store::BackingStore`] trait a content provider
//!   implements to expose objects through a dispatcher.
//!
//! - `protocol`: XDR encoding and decoding, the ONC RPC message layer
//!   with record-marked framing, and the NFS and MOUNT program handlers.
//!
//! - `tcp`: the loopback listener that serves a dispatcher to the
//!   kernel's NFS client.
//!
//! ## Standards Compliance
//!
//! - RFC 1813: NFS Version 3 Protocol Specification
//! - RFC 5531: RPC: Remote Procedure Call Protocol Specification Version 2
//! - RFC 1832: XDR: External Data Representation Standard

pub mod dispatch;
pub mod protocol;
pub mod store;
pub mod tcp;
mod write_counter;

pub use protocol::xdr;
