//! Kernel-bridge-backed dispatcher variant.
//!
//! On platforms with a character-device bridge into the kernel's VFS, the
//! transport delivers one already-parsed request per kernel operation and
//! expects one reply. The plumbing that frames those requests is outside
//! this crate; this variant receives them as [`BridgeRequest`] values,
//! routes each to the matching canonical operation, and shapes the result
//! into the [`BridgeReply`] the transport writes back.

use async_trait::async_trait;
use tracing::trace;

use super::{
    AttrPatch, DispatchError, FsStats, MountAccess, ObjectAttr, ObjectId, ReaddirPage,
    VfsDispatcher,
};
use crate::store::SharedStore;

/// One decoded kernel-bridge request.
#[derive(Clone, Debug)]
pub enum BridgeRequest {
    Lookup { dir: ObjectId, name: Vec<u8> },
    Getattr { id: ObjectId },
    Setattr { id: ObjectId, patch: AttrPatch },
    Read { id: ObjectId, offset: u64, count: u32 },
    Write { id: ObjectId, offset: u64, data: Vec<u8> },
    Create { dir: ObjectId, name: Vec<u8>, patch: AttrPatch },
    Mkdir { dir: ObjectId, name: Vec<u8>, patch: AttrPatch },
    Symlink { dir: ObjectId, name: Vec<u8>, target: Vec<u8> },
    Readlink { id: ObjectId },
    Unlink { dir: ObjectId, name: Vec<u8> },
    Rmdir { dir: ObjectId, name: Vec<u8> },
    Rename { from_dir: ObjectId, from_name: Vec<u8>, to_dir: ObjectId, to_name: Vec<u8> },
    Link { id: ObjectId, dir: ObjectId, name: Vec<u8> },
    Readdir { dir: ObjectId, start: u64, max: usize },
    Fsync { id: ObjectId },
    Statfs { id: ObjectId },
}

/// The reply shape for each request kind.
#[derive(Clone, Debug)]
pub enum BridgeReply {
    Attr(ObjectAttr),
    Data { data: Vec<u8>, eof: bool },
    Written { count: u32, attr: ObjectAttr },
    Target(Vec<u8>),
    Entries(ReaddirPage),
    Stats(FsStats),
    Done,
}

pub struct BridgeDispatcher {
    store: SharedStore,
    access: MountAccess,
}

impl BridgeDispatcher {
    pub fn new(store: SharedStore, access: MountAccess) -> BridgeDispatcher {
        BridgeDispatcher { store, access }
    }

    /// Executes one bridge request against the canonical operation set.
    pub async fn handle(&self, request: BridgeRequest) -> Result<BridgeReply, DispatchError> {
        trace!(?request, "bridge request");
        match request {
            BridgeRequest::Lookup { dir, name } => {
                self.lookup(dir, &name).await.map(BridgeReply::Attr)
            }
            BridgeRequest::Getattr { id } => self.getattr(id).await.map(BridgeReply::Attr),
            BridgeRequest::Setattr { id, patch } => {
                self.setattr(id, patch).await.map(BridgeReply::Attr)
            }
            BridgeRequest::Read { id, offset, count } => self
                .read(id, offset, count)
                .await
                .map(|(data, eof)| BridgeReply::Data { data, eof }),
            BridgeRequest::Write { id, offset, data } => self
                .write(id, offset, &data)
                .await
                .map(|(count, attr)| BridgeReply::Written { count, attr }),
            BridgeRequest::Create { dir, name, patch } => {
                self.create(dir, &name, patch).await.map(BridgeReply::Attr)
            }
            BridgeRequest::Mkdir { dir, name, patch } => {
                self.mkdir(dir, &name, patch).await.map(BridgeReply::Attr)
            }
            BridgeRequest::Symlink { dir, name, target } => {
                self.symlink(dir, &name, &target).await.map(BridgeReply::Attr)
            }
            BridgeRequest::Readlink { id } => self.readlink(id).await.map(BridgeReply::Target),
            BridgeRequest::Unlink { dir, name } => {
                self.unlink(dir, &name).await.map(|()| BridgeReply::Done)
            }
            BridgeRequest::Rmdir { dir, name } => {
                self.rmdir(dir, &name).await.map(|()| BridgeReply::Done)
            }
            BridgeRequest::Rename { from_dir, from_name, to_dir, to_name } => self
                .rename(from_dir, &from_name, to_dir, &to_name)
                .await
                .map(|()| BridgeReply::Done),
            BridgeRequest::Link { id, dir, name } => {
                self.link(id, dir, &name).await.map(BridgeReply::Attr)
            }
            BridgeRequest::Readdir { dir, start, max } => {
                self.readdir(dir, start, max).await.map(BridgeReply::Entries)
            }
            BridgeRequest::Fsync { id } => self.fsync(id).await.map(|()| BridgeReply::Done),
            BridgeRequest::Statfs { id } => self.statfs(id).await.map(BridgeReply::Stats),
        }
    }

    fn check_writable(&self) -> Result<(), DispatchError> {
        match self.access {
            MountAccess::ReadWrite => Ok(()),
            MountAccess::ReadOnly => Err(DispatchError::PermissionDenied),
        }
    }
}

#[async_trait]
impl VfsDispatcher for BridgeDispatcher {
    fn root(&self) -> ObjectId {
        self.store.root()
    }

    fn access(&self) -> MountAccess {
        self.access
    }

    async fn lookup(&self, dir: ObjectId, name: &[u8]) -> Result<ObjectAttr, DispatchError> {
        self.store.lookup(dir, name).await
    }

    async fn getattr(&self, id: ObjectId) -> Result<ObjectAttr, DispatchError> {
        self.store.getattr(id).await
    }

    async fn setattr(&self, id: ObjectId, patch: AttrPatch) -> Result<ObjectAttr, DispatchError> {
        self.check_writable()?;
        self.store.setattr(id, patch).await
    }

    async fn read(
        &self,
        id: ObjectId,
        offset: u64,
        count: u32,
    ) -> Result<(Vec<u8>, bool), DispatchError> {
        self.store.read(id, offset, count).await
    }

    async fn write(
        &self,
        id: ObjectId,
        offset: u64,
        data: &[u8],
    ) -> Result<(u32, ObjectAttr), DispatchError> {
        self.check_writable()?;
        self.store.write(id, offset, data).await
    }

    async fn create(
        &self,
        dir: ObjectId,
        name: &[u8],
        patch: AttrPatch,
    ) -> Result<ObjectAttr, DispatchError> {
        self.check_writable()?;
        self.store.create(dir, name, patch).await
    }

    async fn mkdir(
        &self,
        dir: ObjectId,
        name: &[u8],
        patch: AttrPatch,
    ) -> Result<ObjectAttr, DispatchError> {
        self.check_writable()?;
        self.store.mkdir(dir, name, patch).await
    }

    async fn symlink(
        &self,
        dir: ObjectId,
        name: &[u8],
        target: &[u8],
    ) -> Result<ObjectAttr, DispatchError> {
        self.check_writable()?;
        self.store.symlink(dir, name, target).await
    }

    async fn readlink(&self, id: ObjectId) -> Result<Vec<u8>, DispatchError> {
        self.store.readlink(id).await
    }

    async fn unlink(&self, dir: ObjectId, name: &[u8]) -> Result<(), DispatchError> {
        self.check_writable()?;
        self.store.unlink(dir, name).await
    }

    async fn rmdir(&self, dir: ObjectId, name: &[u8]) -> Result<(), DispatchError> {
        self.check_writable()?;
        self.store.rmdir(dir, name).await
    }

    async fn rename(
        &self,
        from_dir: ObjectId,
        from_name: &[u8],
        to_dir: ObjectId,
        to_name: &[u8],
    ) -> Result<(), DispatchError> {
        self.check_writable()?;
        self.store.rename(from_dir, from_name, to_dir, to_name).await
    }

    async fn link(
        &self,
        id: ObjectId,
        dir: ObjectId,
        name: &[u8],
    ) -> Result<ObjectAttr, DispatchError> {
        self.check_writable()?;
        self.store.link(id, dir, name).await
    }

    async fn readdir(
        &self,
        dir: ObjectId,
        start: u64,
        max: usize,
    ) -> Result<ReaddirPage, DispatchError> {
        self.store.readdir(dir, start, max).await
    }

    async fn fsync(&self, id: ObjectId) -> Result<(), DispatchError> {
        self.store.fsync(id).await
    }

    async fn statfs(&self, id: ObjectId) -> Result<FsStats, DispatchError> {
        self.store.statfs(id).await
    }
}
