//! The dispatcher abstraction: one canonical set of virtual-filesystem
//! operations behind which three platform transports converge.
//!
//! A mount is driven by whichever hook mechanism the host OS offers: a
//! kernel bridge that streams framed requests ([`bridge`]), a projection
//! API that fires callbacks ([`projected`]), or, where neither exists, a
//! loopback NFS server this process runs itself ([`nfs`]). Each variant
//! translates its transport's native request shapes into the canonical
//! [`VfsDispatcher`] operations and executes them against the backing
//! store. The [`factory`] constructs exactly one variant per mount;
//! nothing in request-handling code ever branches on platform identity.
//!
//! The dependency points one way only: protocol code calls into this
//! module, and this module calls the store. No dispatcher type knows that
//! RPC or XDR exist.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub mod bridge;
pub mod factory;
pub mod nfs;
pub mod projected;

/// Identifier the backing store mints for a filesystem object, unique
/// within a mount session. Zero is reserved and never names an object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of object a working copy materializes. Device nodes, sockets
/// and fifos are never minted by the store.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ObjectKind {
    #[default]
    Regular,
    Directory,
    Symlink,
}

/// Seconds and nanoseconds since the Unix epoch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub seconds: u64,
    pub nanos: u32,
}

/// Canonical attributes of a filesystem object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectAttr {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: Timestamp,
    pub mtime: Timestamp,
    pub ctime: Timestamp,
}

/// How an attribute-change request adjusts one timestamp.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimePatch {
    /// Stamp the server's current time.
    Now,
    /// Take the caller's value.
    At(Timestamp),
}

/// Partial attribute update. `None` fields are left untouched.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AttrPatch {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub size: Option<u64>,
    pub atime: Option<TimePatch>,
    pub mtime: Option<TimePatch>,
}

impl AttrPatch {
    pub fn is_empty(&self) -> bool {
        *self == AttrPatch::default()
    }
}

/// One directory entry as the canonical layer sees it.
#[derive(Clone, Debug, Default)]
pub struct DirEntry {
    pub id: ObjectId,
    pub name: Vec<u8>,
    pub kind: ObjectKind,
}

/// A page of directory entries starting at a caller-chosen position.
#[derive(Clone, Debug, Default)]
pub struct ReaddirPage {
    pub entries: Vec<DirEntry>,
    /// True when the page reaches the end of the directory.
    pub eof: bool,
}

/// Usage counters reported by `statfs`.
#[derive(Copy, Clone, Debug, Default)]
pub struct FsStats {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub avail_bytes: u64,
    pub total_objects: u64,
    pub free_objects: u64,
}

/// Whether a mount accepts mutations.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MountAccess {
    ReadOnly,
    ReadWrite,
}

/// What a dispatcher operation can fail with.
///
/// The set is closed: every protocol has a fixed, total mapping from these
/// to its wire status vocabulary, so a store failure can never reach a
/// client as silent success. Envelope-level failures (malformed XDR, bad
/// auth, version mismatch) are not represented here; they are answered
/// before any dispatcher runs.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("object not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("file handle is stale")]
    StaleHandle,
    #[error("directory cookie is stale")]
    StaleCookie,
    #[error("permission denied")]
    PermissionDenied,
    #[error("no space left in backing store")]
    NoSpace,
    #[error("i/o failure: {0}")]
    IoFailure(String),
    #[error("operation not implemented")]
    Unimplemented,
}

/// The canonical virtual-filesystem operation set.
///
/// Implemented by exactly three variants ([`bridge::BridgeDispatcher`],
/// [`projected::ProjectedDispatcher`] and [`nfs::NfsDispatcher`]), each of
/// which fronts the same backing store for a different transport. An
/// instance is constructed once per mount and shared across every request
/// in flight on that mount, so all operations take `&self`; the store it
/// wraps synchronizes its own mutations.
#[async_trait]
pub trait VfsDispatcher: Send + Sync {
    /// The directory every name resolution starts from.
    fn root(&self) -> ObjectId;

    fn access(&self) -> MountAccess;

    /// Resolves `name` inside the directory `dir`.
    async fn lookup(&self, dir: ObjectId, name: &[u8]) -> Result<ObjectAttr, DispatchError>;

    async fn getattr(&self, id: ObjectId) -> Result<ObjectAttr, DispatchError>;

    /// Applies `patch` and returns the resulting attributes.
    async fn setattr(&self, id: ObjectId, patch: AttrPatch) -> Result<ObjectAttr, DispatchError>;

    /// Reads up to `count` bytes at `offset`. The flag is true when the
    /// read reached end of file.
    async fn read(
        &self,
        id: ObjectId,
        offset: u64,
        count: u32,
    ) -> Result<(Vec<u8>, bool), DispatchError>;

    /// Writes `data` at `offset`, returning the byte count actually
    /// committed, which may be short, and the post-write attributes.
    async fn write(
        &self,
        id: ObjectId,
        offset: u64,
        data: &[u8],
    ) -> Result<(u32, ObjectAttr), DispatchError>;

    /// Creates a regular file named `name` in `dir`.
    async fn create(
        &self,
        dir: ObjectId,
        name: &[u8],
        patch: AttrPatch,
    ) -> Result<ObjectAttr, DispatchError>;

    async fn mkdir(
        &self,
        dir: ObjectId,
        name: &[u8],
        patch: AttrPatch,
    ) -> Result<ObjectAttr, DispatchError>;

    async fn symlink(
        &self,
        dir: ObjectId,
        name: &[u8],
        target: &[u8],
    ) -> Result<ObjectAttr, DispatchError>;

    async fn readlink(&self, id: ObjectId) -> Result<Vec<u8>, DispatchError>;

    /// Removes the non-directory entry `name` from `dir`.
    async fn unlink(&self, dir: ObjectId, name: &[u8]) -> Result<(), DispatchError>;

    /// Removes the empty directory `name` from `dir`.
    async fn rmdir(&self, dir: ObjectId, name: &[u8]) -> Result<(), DispatchError>;

    async fn rename(
        &self,
        from_dir: ObjectId,
        from_name: &[u8],
        to_dir: ObjectId,
        to_name: &[u8],
    ) -> Result<(), DispatchError>;

    /// Adds a second directory entry for an existing file.
    async fn link(
        &self,
        id: ObjectId,
        dir: ObjectId,
        name: &[u8],
    ) -> Result<ObjectAttr, DispatchError>;

    /// Lists entries of `dir` starting after position `start` (0 starts
    /// from the beginning), at most `max` entries per page.
    async fn readdir(
        &self,
        dir: ObjectId,
        start: u64,
        max: usize,
    ) -> Result<ReaddirPage, DispatchError>;

    /// Flushes buffered writes for `id` to stable storage.
    async fn fsync(&self, id: ObjectId) -> Result<(), DispatchError>;

    async fn statfs(&self, id: ObjectId) -> Result<FsStats, DispatchError>;
}
