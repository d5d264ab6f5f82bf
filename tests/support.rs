#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use latentfs::dispatch::nfs::NfsDispatcher;
use latentfs::dispatch::{
    AttrPatch, DirEntry, DispatchError, FsStats, MountAccess, ObjectAttr, ObjectId, ObjectKind,
    ReaddirPage, TimePatch, Timestamp,
};
use latentfs::protocol::rpc::{Context, TransactionTracker};
use latentfs::store::BackingStore;
use latentfs::xdr;

pub const ROOT_ID: ObjectId = ObjectId(1);

enum Content {
    File(Vec<u8>),
    Dir(Vec<(Vec<u8>, ObjectId)>),
    Link(Vec<u8>),
}

struct Node {
    attr: ObjectAttr,
    content: Content,
}

/// In-memory backing store with real tree semantics, plus an operation
/// counter so tests can assert the store was (or was not) reached.
pub struct MemStore {
    nodes: Mutex<HashMap<ObjectId, Node>>,
    next_id: AtomicU64,
    ops: AtomicU64,
}

fn now() -> Timestamp {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    Timestamp { seconds: elapsed.as_secs(), nanos: elapsed.subsec_nanos() }
}

fn attr_of(id: ObjectId, kind: ObjectKind) -> ObjectAttr {
    let stamp = now();
    ObjectAttr {
        id,
        kind,
        mode: match kind {
            ObjectKind::Directory => 0o755,
            _ => 0o644,
        },
        nlink: match kind {
            ObjectKind::Directory => 2,
            _ => 1,
        },
        uid: 0,
        gid: 0,
        size: 0,
        atime: stamp,
        mtime: stamp,
        ctime: stamp,
    }
}

impl MemStore {
    pub fn new() -> MemStore {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_ID,
            Node { attr: attr_of(ROOT_ID, ObjectKind::Directory), content: Content::Dir(Vec::new()) },
        );
        MemStore { nodes: Mutex::new(nodes), next_id: AtomicU64::new(2), ops: AtomicU64::new(0) }
    }

    /// Backing-store invocations so far. Gate tests assert this stays 0.
    pub fn op_count(&self) -> u64 {
        self.ops.load(Ordering::SeqCst)
    }

    pub fn add_file(&self, parent: ObjectId, name: &str, data: &[u8]) -> ObjectId {
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut nodes = self.nodes.lock().unwrap();
        let mut attr = attr_of(id, ObjectKind::Regular);
        attr.size = data.len() as u64;
        nodes.insert(id, Node { attr, content: Content::File(data.to_vec()) });
        match &mut nodes.get_mut(&parent).expect("parent").content {
            Content::Dir(entries) => entries.push((name.as_bytes().to_vec(), id)),
            _ => panic!("parent is not a directory"),
        }
        id
    }

    pub fn add_dir(&self, parent: ObjectId, name: &str) -> ObjectId {
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut nodes = self.nodes.lock().unwrap();
        nodes.insert(
            id,
            Node { attr: attr_of(id, ObjectKind::Directory), content: Content::Dir(Vec::new()) },
        );
        match &mut nodes.get_mut(&parent).expect("parent").content {
            Content::Dir(entries) => entries.push((name.as_bytes().to_vec(), id)),
            _ => panic!("parent is not a directory"),
        }
        id
    }

    fn count_op(&self) {
        self.ops.fetch_add(1, Ordering::SeqCst);
    }

    fn child_of(
        nodes: &HashMap<ObjectId, Node>,
        dir: ObjectId,
        name: &[u8],
    ) -> Result<ObjectId, DispatchError> {
        let dir_node = nodes.get(&dir).ok_or(DispatchError::NotFound)?;
        let Content::Dir(entries) = &dir_node.content else {
            return Err(DispatchError::NotADirectory);
        };
        entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, id)| *id)
            .ok_or(DispatchError::NotFound)
    }

    fn insert_child(
        &self,
        nodes: &mut HashMap<ObjectId, Node>,
        dir: ObjectId,
        name: &[u8],
        kind: ObjectKind,
        content: Content,
    ) -> Result<ObjectAttr, DispatchError> {
        if Self::child_of(nodes, dir, name).is_ok() {
            return Err(DispatchError::AlreadyExists);
        }
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut attr = attr_of(id, kind);
        if let Content::File(data) | Content::Link(data) = &content {
            attr.size = data.len() as u64;
        }
        nodes.insert(id, Node { attr, content });
        match &mut nodes.get_mut(&dir).ok_or(DispatchError::NotFound)?.content {
            Content::Dir(entries) => entries.push((name.to_vec(), id)),
            _ => return Err(DispatchError::NotADirectory),
        }
        Ok(attr)
    }
}

#[async_trait]
impl BackingStore for MemStore {
    fn root(&self) -> ObjectId {
        ROOT_ID
    }

    async fn lookup(&self, dir: ObjectId, name: &[u8]) -> Result<ObjectAttr, DispatchError> {
        self.count_op();
        let nodes = self.nodes.lock().unwrap();
        let id = Self::child_of(&nodes, dir, name)?;
        Ok(nodes[&id].attr)
    }

    async fn getattr(&self, id: ObjectId) -> Result<ObjectAttr, DispatchError> {
        self.count_op();
        let nodes = self.nodes.lock().unwrap();
        nodes.get(&id).map(|node| node.attr).ok_or(DispatchError::NotFound)
    }

    async fn setattr(&self, id: ObjectId, patch: AttrPatch) -> Result<ObjectAttr, DispatchError> {
        self.count_op();
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get_mut(&id).ok_or(DispatchError::NotFound)?;
        if let Some(mode) = patch.mode {
            node.attr.mode = mode;
        }
        if let Some(uid) = patch.uid {
            node.attr.uid = uid;
        }
        if let Some(gid) = patch.gid {
            node.attr.gid = gid;
        }
        if let Some(size) = patch.size {
            let Content::File(data) = &mut node.content else {
                return Err(DispatchError::IsADirectory);
            };
            data.resize(size as usize, 0);
            node.attr.size = size;
        }
        let apply = |p: TimePatch| match p {
            TimePatch::Now => now(),
            TimePatch::At(t) => t,
        };
        if let Some(atime) = patch.atime {
            node.attr.atime = apply(atime);
        }
        if let Some(mtime) = patch.mtime {
            node.attr.mtime = apply(mtime);
        }
        node.attr.ctime = now();
        Ok(node.attr)
    }

    async fn read(
        &self,
        id: ObjectId,
        offset: u64,
        count: u32,
    ) -> Result<(Vec<u8>, bool), DispatchError> {
        self.count_op();
        let nodes = self.nodes.lock().unwrap();
        let node = nodes.get(&id).ok_or(DispatchError::NotFound)?;
        let Content::File(data) = &node.content else {
            return Err(DispatchError::IsADirectory);
        };
        let start = (offset as usize).min(data.len());
        let end = (start + count as usize).min(data.len());
        Ok((data[start..end].to_vec(), end == data.len()))
    }

    async fn write(
        &self,
        id: ObjectId,
        offset: u64,
        payload: &[u8],
    ) -> Result<(u32, ObjectAttr), DispatchError> {
        self.count_op();
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get_mut(&id).ok_or(DispatchError::NotFound)?;
        let Content::File(data) = &mut node.content else {
            return Err(DispatchError::IsADirectory);
        };
        let end = offset as usize + payload.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(payload);
        node.attr.size = data.len() as u64;
        node.attr.mtime = now();
        Ok((payload.len() as u32, node.attr))
    }

    async fn create(
        &self,
        dir: ObjectId,
        name: &[u8],
        patch: AttrPatch,
    ) -> Result<ObjectAttr, DispatchError> {
        self.count_op();
        let mut nodes = self.nodes.lock().unwrap();
        let mut attr =
            self.insert_child(&mut nodes, dir, name, ObjectKind::Regular, Content::File(Vec::new()))?;
        if let Some(mode) = patch.mode {
            attr.mode = mode;
            nodes.get_mut(&attr.id).unwrap().attr.mode = mode;
        }
        Ok(attr)
    }

    async fn mkdir(
        &self,
        dir: ObjectId,
        name: &[u8],
        patch: AttrPatch,
    ) -> Result<ObjectAttr, DispatchError> {
        self.count_op();
        let mut nodes = self.nodes.lock().unwrap();
        let mut attr =
            self.insert_child(&mut nodes, dir, name, ObjectKind::Directory, Content::Dir(Vec::new()))?;
        if let Some(mode) = patch.mode {
            attr.mode = mode;
            nodes.get_mut(&attr.id).unwrap().attr.mode = mode;
        }
        Ok(attr)
    }

    async fn symlink(
        &self,
        dir: ObjectId,
        name: &[u8],
        target: &[u8],
    ) -> Result<ObjectAttr, DispatchError> {
        self.count_op();
        let mut nodes = self.nodes.lock().unwrap();
        self.insert_child(&mut nodes, dir, name, ObjectKind::Symlink, Content::Link(target.to_vec()))
    }

    async fn readlink(&self, id: ObjectId) -> Result<Vec<u8>, DispatchError> {
        self.count_op();
        let nodes = self.nodes.lock().unwrap();
        match &nodes.get(&id).ok_or(DispatchError::NotFound)?.content {
            Content::Link(target) => Ok(target.clone()),
            _ => Err(DispatchError::IoFailure("not a symlink".to_string())),
        }
    }

    async fn unlink(&self, dir: ObjectId, name: &[u8]) -> Result<(), DispatchError> {
        self.count_op();
        let mut nodes = self.nodes.lock().unwrap();
        let id = Self::child_of(&nodes, dir, name)?;
        if matches!(nodes[&id].content, Content::Dir(_)) {
            return Err(DispatchError::IsADirectory);
        }
        match &mut nodes.get_mut(&dir).unwrap().content {
            Content::Dir(entries) => entries.retain(|(entry_name, _)| entry_name != name),
            _ => return Err(DispatchError::NotADirectory),
        }
        let nlink = nodes[&id].attr.nlink;
        if nlink <= 1 {
            nodes.remove(&id);
        } else {
            nodes.get_mut(&id).unwrap().attr.nlink -= 1;
        }
        Ok(())
    }

    async fn rmdir(&self, dir: ObjectId, name: &[u8]) -> Result<(), DispatchError> {
        self.count_op();
        let mut nodes = self.nodes.lock().unwrap();
        let id = Self::child_of(&nodes, dir, name)?;
        match &nodes[&id].content {
            Content::Dir(entries) if entries.is_empty() => {}
            Content::Dir(_) => return Err(DispatchError::IoFailure("directory not empty".to_string())),
            _ => return Err(DispatchError::NotADirectory),
        }
        match &mut nodes.get_mut(&dir).unwrap().content {
            Content::Dir(entries) => entries.retain(|(entry_name, _)| entry_name != name),
            _ => return Err(DispatchError::NotADirectory),
        }
        nodes.remove(&id);
        Ok(())
    }

    async fn rename(
        &self,
        from_dir: ObjectId,
        from_name: &[u8],
        to_dir: ObjectId,
        to_name: &[u8],
    ) -> Result<(), DispatchError> {
        self.count_op();
        let mut nodes = self.nodes.lock().unwrap();
        let id = Self::child_of(&nodes, from_dir, from_name)?;
        match &mut nodes.get_mut(&from_dir).unwrap().content {
            Content::Dir(entries) => entries.retain(|(entry_name, _)| entry_name != from_name),
            _ => return Err(DispatchError::NotADirectory),
        }
        match &mut nodes.get_mut(&to_dir).ok_or(DispatchError::NotFound)?.content {
            Content::Dir(entries) => {
                entries.retain(|(entry_name, _)| entry_name != to_name);
                entries.push((to_name.to_vec(), id));
            }
            _ => return Err(DispatchError::NotADirectory),
        }
        Ok(())
    }

    async fn link(
        &self,
        id: ObjectId,
        dir: ObjectId,
        name: &[u8],
    ) -> Result<ObjectAttr, DispatchError> {
        self.count_op();
        let mut nodes = self.nodes.lock().unwrap();
        if Self::child_of(&nodes, dir, name).is_ok() {
            return Err(DispatchError::AlreadyExists);
        }
        if !nodes.contains_key(&id) {
            return Err(DispatchError::NotFound);
        }
        match &mut nodes.get_mut(&dir).ok_or(DispatchError::NotFound)?.content {
            Content::Dir(entries) => entries.push((name.to_vec(), id)),
            _ => return Err(DispatchError::NotADirectory),
        }
        let node = nodes.get_mut(&id).unwrap();
        node.attr.nlink += 1;
        Ok(node.attr)
    }

    async fn readdir(
        &self,
        dir: ObjectId,
        start: u64,
        max: usize,
    ) -> Result<ReaddirPage, DispatchError> {
        self.count_op();
        let nodes = self.nodes.lock().unwrap();
        let Content::Dir(entries) = &nodes.get(&dir).ok_or(DispatchError::NotFound)?.content else {
            return Err(DispatchError::NotADirectory);
        };
        let limit = if max == 0 { entries.len() } else { max };
        let page: Vec<DirEntry> = entries
            .iter()
            .skip(start as usize)
            .take(limit)
            .map(|(name, id)| DirEntry {
                id: *id,
                name: name.clone(),
                kind: nodes[id].attr.kind,
            })
            .collect();
        let eof = start as usize + page.len() >= entries.len();
        Ok(ReaddirPage { entries: page, eof })
    }

    async fn fsync(&self, _id: ObjectId) -> Result<(), DispatchError> {
        self.count_op();
        Ok(())
    }

    async fn statfs(&self, _id: ObjectId) -> Result<FsStats, DispatchError> {
        self.count_op();
        let nodes = self.nodes.lock().unwrap();
        let used: u64 = nodes.values().map(|node| node.attr.size).sum();
        Ok(FsStats {
            total_bytes: 1 << 30,
            free_bytes: (1 << 30) - used,
            avail_bytes: (1 << 30) - used,
            total_objects: 1 << 20,
            free_objects: (1 << 20) - nodes.len() as u64,
        })
    }
}

/// A request context over a fresh dispatcher for `store`.
pub fn test_context(store: Arc<MemStore>, access: MountAccess) -> (Context, Arc<NfsDispatcher>) {
    let dispatcher = Arc::new(NfsDispatcher::new(store, access));
    let context = Context {
        local_port: 0,
        client_addr: "127.0.0.1:1234".to_string(),
        auth: xdr::rpc::auth_unix::default(),
        dispatcher: dispatcher.clone(),
        export_name: Arc::new("/".to_string()),
        mount_signal: None,
        transaction_tracker: Arc::new(TransactionTracker::new(Duration::from_secs(60))),
    };
    (context, dispatcher)
}
