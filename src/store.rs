//! Interface boundary to the backing object store and mutation overlay.
//!
//! The store owns everything this crate treats as opaque: how tree and
//! blob data is fetched, how local mutations are journaled, and how
//! object identifiers map to any of that. Dispatchers call through this
//! trait and never look behind it. Implementations synchronize their own
//! mutable state; dispatchers share one instance across all in-flight
//! requests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::{AttrPatch, DispatchError, FsStats, ObjectAttr, ObjectId, ReaddirPage};

/// The operations a mount needs from its store, one per canonical
/// dispatcher operation. Failures use the dispatcher taxonomy directly so
/// no translation layer sits between store and dispatcher.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// The object id of the working copy root directory.
    fn root(&self) -> ObjectId;

    async fn lookup(&self, dir: ObjectId, name: &[u8]) -> Result<ObjectAttr, DispatchError>;

    async fn getattr(&self, id: ObjectId) -> Result<ObjectAttr, DispatchError>;

    async fn setattr(&self, id: ObjectId, patch: AttrPatch) -> Result<ObjectAttr, DispatchError>;

    async fn read(
        &self,
        id: ObjectId,
        offset: u64,
        count: u32,
    ) -> Result<(Vec<u8>, bool), DispatchError>;

    async fn write(
        &self,
        id: ObjectId,
        offset: u64,
        data: &[u8],
    ) -> Result<(u32, ObjectAttr), DispatchError>;

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

    async fn unlink(&self, dir: ObjectId, name: &[u8]) -> Result<(), DispatchError>;

    async fn rmdir(&self, dir: ObjectId, name: &[u8]) -> Result<(), DispatchError>;

    async fn rename(
        &self,
        from_dir: ObjectId,
        from_name: &[u8],
        to_dir: ObjectId,
        to_name: &[u8],
    ) -> Result<(), DispatchError>;

    async fn link(
        &self,
        id: ObjectId,
        dir: ObjectId,
        name: &[u8],
    ) -> Result<ObjectAttr, DispatchError>;

    async fn readdir(
        &self,
        dir: ObjectId,
        start: u64,
        max: usize,
    ) -> Result<ReaddirPage, DispatchError>;

    async fn fsync(&self, id: ObjectId) -> Result<(), DispatchError>;

    async fn statfs(&self, id: ObjectId) -> Result<FsStats, DispatchError>;
}

/// Shared handle to a store, as the factory passes it to dispatchers.
pub type SharedStore = Arc<dyn BackingStore>;
