//! Read-only store with a fixed root directory of static files.

use async_trait::async_trait;

use latentfs::dispatch::{
    AttrPatch, DirEntry, DispatchError, FsStats, ObjectAttr, ObjectId, ObjectKind, ReaddirPage,
};
use latentfs::store::BackingStore;

const ROOT: ObjectId = ObjectId(1);

struct FileSpec {
    id: ObjectId,
    name: &'static [u8],
    data: &'static [u8],
}

const FILES: &[FileSpec] = &[
    FileSpec {
        id: ObjectId(2),
        name: b"readme.txt",
        data: b"Served from memory over loopback NFS.\n",
    },
    FileSpec {
        id: ObjectId(3),
        name: b"motd",
        data: b"No working copy behind this mount; every byte is static.\n",
    },
];

pub struct DemoStore;

impl DemoStore {
    fn file(id: ObjectId) -> Result<&'static FileSpec, DispatchError> {
        FILES.iter().find(|f| f.id == id).ok_or(DispatchError::NotFound)
    }

    fn attr(id: ObjectId) -> Result<ObjectAttr, DispatchError> {
        if id == ROOT {
            return Ok(ObjectAttr {
                id,
                kind: ObjectKind::Directory,
                mode: 0o555,
                nlink: 2,
                ..ObjectAttr::default()
            });
        }
        let file = Self::file(id)?;
        Ok(ObjectAttr {
            id,
            kind: ObjectKind::Regular,
            mode: 0o444,
            nlink: 1,
            size: file.data.len() as u64,
            ..ObjectAttr::default()
        })
    }
}

#[async_trait]
impl BackingStore for DemoStore {
    fn root(&self) -> ObjectId {
        ROOT
    }

    async fn lookup(&self, dir: ObjectId, name: &[u8]) -> Result<ObjectAttr, DispatchError> {
        if dir != ROOT {
            return Err(DispatchError::NotFound);
        }
        let file = FILES.iter().find(|f| f.name == name).ok_or(DispatchError::NotFound)?;
        Self::attr(file.id)
    }

    async fn getattr(&self, id: ObjectId) -> Result<ObjectAttr, DispatchError> {
        Self::attr(id)
    }

    async fn setattr(&self, _: ObjectId, _: AttrPatch) -> Result<ObjectAttr, DispatchError> {
        Err(DispatchError::Unimplemented)
    }

    async fn read(
        &self,
        id: ObjectId,
        offset: u64,
        count: u32,
    ) -> Result<(Vec<u8>, bool), DispatchError> {
        let data = Self::file(id)?.data;
        let start = (offset as usize).min(data.len());
        let end = (start + count as usize).min(data.len());
        Ok((data[start..end].to_vec(), end == data.len()))
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

    async fn link(&self, _: ObjectId, _: ObjectId, _: &[u8]) -> Result<ObjectAttr, DispatchError> {
        Err(DispatchError::Unimplemented)
    }

    async fn readdir(
        &self,
        dir: ObjectId,
        start: u64,
        max: usize,
    ) -> Result<ReaddirPage, DispatchError> {
        if dir != ROOT {
            return Err(DispatchError::NotADirectory);
        }
        let limit = if max == 0 { FILES.len() } else { max };
        let entries: Vec<DirEntry> = FILES
            .iter()
            .skip(start as usize)
            .take(limit)
            .map(|f| DirEntry { id: f.id, name: f.name.to_vec(), kind: ObjectKind::Regular })
            .collect();
        let eof = start as usize + entries.len() >= FILES.len();
        Ok(ReaddirPage { entries, eof })
    }

    async fn fsync(&self, _: ObjectId) -> Result<(), DispatchError> {
        Ok(())
    }

    async fn statfs(&self, _: ObjectId) -> Result<FsStats, DispatchError> {
        let used: u64 = FILES.iter().map(|f| f.data.len() as u64).sum();
        Ok(FsStats {
            total_bytes: used,
            free_bytes: 0,
            avail_bytes: 0,
            total_objects: 1 + FILES.len() as u64,
            free_objects: 0,
        })
    }
}
