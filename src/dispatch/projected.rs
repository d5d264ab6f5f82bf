//! Projection-API-backed dispatcher variant.
//!
//! On platforms whose filesystem virtualization is a callback API, the OS
//! asks this process to back placeholders it projects into the tree: it
//! requests placeholder metadata on first access, file content ranges on
//! first read, and directory listings through restartable enumeration
//! sessions. Mutations flow the other way as after-the-fact
//! notifications. Each of those callback shapes is translated here into
//! the canonical operation set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::trace;

use super::{
    AttrPatch, DirEntry, DispatchError, FsStats, MountAccess, ObjectAttr, ObjectId, ObjectKind,
    ReaddirPage, VfsDispatcher,
};
use crate::store::SharedStore;

/// Metadata the projection layer needs to stamp a placeholder.
#[derive(Clone, Debug)]
pub struct Placeholder {
    pub attr: ObjectAttr,
    /// Present when the placeholder is a symlink.
    pub symlink_target: Option<Vec<u8>>,
}

/// A mutation the projection layer reports after the OS has applied it
/// locally.
#[derive(Clone, Debug)]
pub enum ProjectedNotification {
    FileCreated { dir: ObjectId, name: Vec<u8> },
    DirCreated { dir: ObjectId, name: Vec<u8> },
    FileModified { id: ObjectId, offset: u64, data: Vec<u8> },
    EntryRemoved { dir: ObjectId, name: Vec<u8>, is_dir: bool },
    EntryRenamed { from_dir: ObjectId, from_name: Vec<u8>, to_dir: ObjectId, to_name: Vec<u8> },
}

pub struct ProjectedDispatcher {
    store: SharedStore,
    access: MountAccess,
    /// Snapshots behind open enumeration sessions. The projection API
    /// may rewind a session to its start at any time, so the listing is
    /// captured once per session.
    enumerations: Mutex<HashMap<u64, Vec<DirEntry>>>,
    next_session: AtomicU64,
}

impl ProjectedDispatcher {
    pub fn new(store: SharedStore, access: MountAccess) -> ProjectedDispatcher {
        ProjectedDispatcher {
            store,
            access,
            enumerations: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(1),
        }
    }

    /// First-access callback: metadata for the placeholder of `name`.
    pub async fn placeholder_info(
        &self,
        dir: ObjectId,
        name: &[u8],
    ) -> Result<Placeholder, DispatchError> {
        let attr = self.lookup(dir, name).await?;
        let symlink_target = match attr.kind {
            ObjectKind::Symlink => Some(self.readlink(attr.id).await?),
            _ => None,
        };
        Ok(Placeholder { attr, symlink_target })
    }

    /// First-read callback: one content range of a projected file.
    pub async fn file_data(
        &self,
        id: ObjectId,
        offset: u64,
        length: u32,
    ) -> Result<Vec<u8>, DispatchError> {
        let (data, _eof) = self.read(id, offset, length).await?;
        Ok(data)
    }

    /// Opens an enumeration session over `dir`, capturing the full
    /// listing so later rewinds replay a consistent snapshot.
    pub async fn start_enumeration(&self, dir: ObjectId) -> Result<u64, DispatchError> {
        let mut entries = Vec::new();
        let mut start = 0;
        loop {
            let page = self.readdir(dir, start, usize::MAX).await?;
            start += page.entries.len() as u64;
            let eof = page.eof;
            entries.extend(page.entries);
            if eof {
                break;
            }
        }
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.enumerations.lock().unwrap().insert(session, entries);
        trace!(%dir, session, "enumeration opened");
        Ok(session)
    }

    /// Returns the session's entries from `index` on. An `index` of zero
    /// is the rewind the projection API is allowed to request.
    pub fn read_enumeration(
        &self,
        session: u64,
        index: usize,
    ) -> Result<Vec<DirEntry>, DispatchError> {
        let enumerations = self.enumerations.lock().unwrap();
        let entries = enumerations.get(&session).ok_or(DispatchError::StaleCookie)?;
        Ok(entries.get(index..).unwrap_or(&[]).to_vec())
    }

    pub fn end_enumeration(&self, session: u64) {
        self.enumerations.lock().unwrap().remove(&session);
    }

    /// Routes one local-mutation notification into the canonical
    /// operation set so the store observes what the OS already did.
    pub async fn notify(&self, event: ProjectedNotification) -> Result<(), DispatchError> {
        match event {
            ProjectedNotification::FileCreated { dir, name } => {
                self.create(dir, &name, AttrPatch::default()).await.map(|_| ())
            }
            ProjectedNotification::DirCreated { dir, name } => {
                self.mkdir(dir, &name, AttrPatch::default()).await.map(|_| ())
            }
            ProjectedNotification::FileModified { id, offset, data } => {
                self.write(id, offset, &data).await.map(|_| ())
            }
            ProjectedNotification::EntryRemoved { dir, name, is_dir } => {
                if is_dir {
                    self.rmdir(dir, &name).await
                } else {
                    self.unlink(dir, &name).await
                }
            }
            ProjectedNotification::EntryRenamed { from_dir, from_name, to_dir, to_name } => {
                self.rename(from_dir, &from_name, to_dir, &to_name).await
            }
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
impl VfsDispatcher for ProjectedDispatcher {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BackingStore;

    const LINK_ID: ObjectId = ObjectId(5);

    struct TwoEntryStore;

    #[async_trait]
    impl BackingStore for TwoEntryStore {
        fn root(&self) -> ObjectId {
            ObjectId(1)
        }

        async fn lookup(&self, _: ObjectId, name: &[u8]) -> Result<ObjectAttr, DispatchError> {
            if name == b"link" {
                return Ok(ObjectAttr {
                    id: LINK_ID,
                    kind: ObjectKind::Symlink,
                    ..Default::default()
                });
            }
            Err(DispatchError::NotFound)
        }

        async fn getattr(&self, id: ObjectId) -> Result<ObjectAttr, DispatchError> {
            Ok(ObjectAttr { id, ..Default::default() })
        }

        async fn setattr(&self, _: ObjectId, _: AttrPatch) -> Result<ObjectAttr, DispatchError> {
            Err(DispatchError::Unimplemented)
        }

        async fn read(
            &self,
            _: ObjectId,
            _: u64,
            _: u32,
        ) -> Result<(Vec<u8>, bool), DispatchError> {
            Ok((Vec::new(), true))
        }

        async fn write(
            &self,
            _: ObjectId,
            _: u64,
            _: &[u8],
        ) -> Result<(u32, ObjectAttr), DispatchError> {
            Err(DispatchError::Unimplemented)
        }

        async fn create(
            &self,
            _: ObjectId,
            _: &[u8],
            _: AttrPatch,
        ) -> Result<ObjectAttr, DispatchError> {
            Err(DispatchError::Unimplemented)
        }

        async fn mkdir(
            &self,
            _: ObjectId,
            _: &[u8],
            _: AttrPatch,
        ) -> Result<ObjectAttr, DispatchError> {
            Err(DispatchError::Unimplemented)
        }

        async fn symlink(
            &self,
            _: ObjectId,
            _: &[u8],
            _: &[u8],
        ) -> Result<ObjectAttr, DispatchError> {
            Err(DispatchError::Unimplemented)
        }

        async fn readlink(&self, id: ObjectId) -> Result<Vec<u8>, DispatchError> {
            if id == LINK_ID {
                return Ok(b"target".to_vec());
            }
            Err(DispatchError::NotFound)
        }

        async fn unlink(&self, _: ObjectId, _: &[u8]) -> Result<(), DispatchError> {
            Err(DispatchError::Unimplemented)
        }

        async fn rmdir(&self, _: ObjectId, _: &[u8]) -> Result<(), DispatchError> {
            Err(DispatchError::Unimplemented)
        }

        async fn rename(
            &self,
            _: ObjectId,
            _: &[u8],
            _: ObjectId,
            _: &[u8],
        ) -> Result<(), DispatchError> {
            Err(DispatchError::Unimplemented)
        }

        async fn link(
            &self,
            _: ObjectId,
            _: ObjectId,
            _: &[u8],
        ) -> Result<ObjectAttr, DispatchError> {
            Err(DispatchError::Unimplemented)
        }

        async fn readdir(
            &self,
            _: ObjectId,
            start: u64,
            _: usize,
        ) -> Result<ReaddirPage, DispatchError> {
            let all = [
                DirEntry { id: ObjectId(2), name: b"a".to_vec(), kind: ObjectKind::Regular },
                DirEntry { id: ObjectId(3), name: b"b".to_vec(), kind: ObjectKind::Regular },
            ];
            Ok(ReaddirPage {
                entries: all.iter().skip(start as usize).cloned().collect(),
                eof: true,
            })
        }

        async fn fsync(&self, _: ObjectId) -> Result<(), DispatchError> {
            Ok(())
        }

        async fn statfs(&self, _: ObjectId) -> Result<FsStats, DispatchError> {
            Ok(FsStats::default())
        }
    }

    fn dispatcher() -> ProjectedDispatcher {
        ProjectedDispatcher::new(std::sync::Arc::new(TwoEntryStore), MountAccess::ReadWrite)
    }

    #[tokio::test]
    async fn enumeration_snapshot_supports_rewind() {
        let d = dispatcher();
        let session = d.start_enumeration(ObjectId(1)).await.unwrap();

        let from_start = d.read_enumeration(session, 0).unwrap();
        assert_eq!(from_start.len(), 2);
        let resumed = d.read_enumeration(session, 1).unwrap();
        assert_eq!(resumed.len(), 1);
        assert_eq!(resumed[0].name, b"b");

        // A rewind replays the same snapshot.
        assert_eq!(d.read_enumeration(session, 0).unwrap().len(), 2);

        d.end_enumeration(session);
        assert!(matches!(
            d.read_enumeration(session, 0),
            Err(DispatchError::StaleCookie)
        ));
    }

    #[tokio::test]
    async fn symlink_placeholder_carries_target() {
        let d = dispatcher();
        let placeholder = d.placeholder_info(ObjectId(1), b"link").await.unwrap();
        assert_eq!(placeholder.attr.kind, ObjectKind::Symlink);
        assert_eq!(placeholder.symlink_target.as_deref(), Some(&b"target"[..]));
    }
}
