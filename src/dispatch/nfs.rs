//! NFS-backed dispatcher variant.
//!
//! Serves the platforms with no native filesystem hook: the mount is a
//! loopback NFS export and this dispatcher is what the in-process NFS
//! server executes against. Beyond the canonical operations it owns the
//! session state the NFS protocol needs and the store does not know
//! about: minting and resolving opaque file handles, and the cookie
//! verifiers that guard resumed directory iteration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::debug;

use super::{
    AttrPatch, DispatchError, FsStats, MountAccess, ObjectAttr, ObjectId, ReaddirPage,
    VfsDispatcher,
};
use crate::store::SharedStore;

/// Bytes in a minted file handle: generation then object id.
pub const HANDLE_LEN: usize = 16;

/// Bytes in a directory cookie verifier.
pub const VERIFIER_LEN: usize = 8;

pub struct NfsDispatcher {
    store: SharedStore,
    access: MountAccess,
    /// Minted once per server instance so handles from a previous
    /// instance resolve as stale instead of aliasing live objects.
    generation: u64,
    /// Last verifier issued per directory. Iteration resumed with any
    /// other verifier is answered as stale.
    issued_verifiers: Mutex<HashMap<ObjectId, u64>>,
    next_verifier: AtomicU64,
}

impl NfsDispatcher {
    pub fn new(store: SharedStore, access: MountAccess) -> NfsDispatcher {
        // Startup time plus an in-process counter: instances created in
        // the same microsecond still get distinct generations.
        static INSTANCE: AtomicU64 = AtomicU64::new(0);
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(1);
        let generation = micros.wrapping_add(INSTANCE.fetch_add(1, Ordering::Relaxed));
        NfsDispatcher {
            store,
            access,
            generation,
            issued_verifiers: Mutex::new(HashMap::new()),
            next_verifier: AtomicU64::new(1),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mints the opaque handle naming `id` for this session.
    pub fn handle_for(&self, id: ObjectId) -> Vec<u8> {
        let mut data = Vec::with_capacity(HANDLE_LEN);
        data.extend_from_slice(&self.generation.to_be_bytes());
        data.extend_from_slice(&id.0.to_be_bytes());
        data
    }

    /// Resolves a handle back to its object id.
    ///
    /// A handle of the wrong shape or from another server instance fails
    /// with [`DispatchError::StaleHandle`]; whether the object still
    /// exists is the store's call to make.
    pub fn object_for_handle(&self, data: &[u8]) -> Result<ObjectId, DispatchError> {
        if data.len() != HANDLE_LEN {
            return Err(DispatchError::StaleHandle);
        }
        let mut word = [0_u8; 8];
        word.copy_from_slice(&data[..8]);
        let generation = u64::from_be_bytes(word);
        word.copy_from_slice(&data[8..]);
        let id = u64::from_be_bytes(word);
        if generation != self.generation {
            debug!(handle_generation = generation, "stale handle generation");
            return Err(DispatchError::StaleHandle);
        }
        Ok(ObjectId(id))
    }

    /// Validates a resumed directory iteration and returns the verifier
    /// to echo in the reply.
    ///
    /// A fresh iteration (`cookie` 0) mints and records a new verifier
    /// for `dir`, replacing whatever was issued before. A resumed one
    /// must present exactly the verifier recorded for `dir`.
    pub fn open_dir_page(
        &self,
        dir: ObjectId,
        cookie: u64,
        verifier: [u8; VERIFIER_LEN],
    ) -> Result<[u8; VERIFIER_LEN], DispatchError> {
        let mut issued = self.issued_verifiers.lock().unwrap();
        if cookie == 0 {
            let fresh = self.next_verifier.fetch_add(1, Ordering::Relaxed);
            issued.insert(dir, fresh);
            return Ok(fresh.to_be_bytes());
        }
        match issued.get(&dir) {
            Some(current) if current.to_be_bytes() == verifier => Ok(verifier),
            _ => {
                debug!(%dir, cookie, "stale directory cookie verifier");
                Err(DispatchError::StaleCookie)
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
impl VfsDispatcher for NfsDispatcher {
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
    use crate::dispatch::ObjectKind;
    use crate::store::BackingStore;

    struct EmptyStore;

    #[async_trait]
    impl BackingStore for EmptyStore {
        fn root(&self) -> ObjectId {
            ObjectId(1)
        }

        async fn lookup(&self, _: ObjectId, _: &[u8]) -> Result<ObjectAttr, DispatchError> {
            Err(DispatchError::NotFound)
        }

        async fn getattr(&self, id: ObjectId) -> Result<ObjectAttr, DispatchError> {
            Ok(ObjectAttr { id, kind: ObjectKind::Directory, ..Default::default() })
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

        async fn readlink(&self, _: ObjectId) -> Result<Vec<u8>, DispatchError> {
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
            _: u64,
            _: usize,
        ) -> Result<ReaddirPage, DispatchError> {
            Ok(ReaddirPage { entries: Vec::new(), eof: true })
        }

        async fn fsync(&self, _: ObjectId) -> Result<(), DispatchError> {
            Ok(())
        }

        async fn statfs(&self, _: ObjectId) -> Result<FsStats, DispatchError> {
            Ok(FsStats::default())
        }
    }

    fn dispatcher() -> NfsDispatcher {
        NfsDispatcher::new(std::sync::Arc::new(EmptyStore), MountAccess::ReadWrite)
    }

    #[test]
    fn handles_round_trip() {
        let d = dispatcher();
        let handle = d.handle_for(ObjectId(42));
        assert_eq!(handle.len(), HANDLE_LEN);
        assert_eq!(d.object_for_handle(&handle).unwrap(), ObjectId(42));
    }

    #[test]
    fn foreign_generation_is_stale() {
        let minted_elsewhere = dispatcher().handle_for(ObjectId(42));
        // A second instance has a different generation.
        let d = dispatcher();
        assert!(matches!(
            d.object_for_handle(&minted_elsewhere),
            Err(DispatchError::StaleHandle)
        ));
    }

    #[test]
    fn short_handle_is_stale() {
        let d = dispatcher();
        assert!(matches!(d.object_for_handle(b"short"), Err(DispatchError::StaleHandle)));
    }

    #[test]
    fn fresh_iteration_mints_verifier_resume_must_match() {
        let d = dispatcher();
        let dir = ObjectId(7);
        let verf = d.open_dir_page(dir, 0, [0; VERIFIER_LEN]).unwrap();
        assert_eq!(d.open_dir_page(dir, 3, verf).unwrap(), verf);
        assert!(matches!(
            d.open_dir_page(dir, 3, [0xff; VERIFIER_LEN]),
            Err(DispatchError::StaleCookie)
        ));
    }

    #[test]
    fn resume_without_prior_iteration_is_stale() {
        let d = dispatcher();
        assert!(matches!(
            d.open_dir_page(ObjectId(9), 5, [1; VERIFIER_LEN]),
            Err(DispatchError::StaleCookie)
        ));
    }

    #[tokio::test]
    async fn read_only_mount_refuses_mutation() {
        let d = NfsDispatcher::new(std::sync::Arc::new(EmptyStore), MountAccess::ReadOnly);
        assert!(matches!(
            d.write(ObjectId(1), 0, b"x").await,
            Err(DispatchError::PermissionDenied)
        ));
    }
}
