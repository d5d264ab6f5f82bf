use std::io::Cursor;
use std::sync::Arc;

mod support;

use num_traits::FromPrimitive;

use latentfs::dispatch::nfs::NfsDispatcher;
use latentfs::dispatch::{MountAccess, VfsDispatcher};
use latentfs::protocol::nfs::mount::handle_mount;
use latentfs::protocol::nfs::v3::handle_nfs;
use latentfs::protocol::rpc::Context;
use latentfs::xdr::{self, deserialize, mount, nfs3, Serialize};

use support::{test_context, MemStore};

fn nfs_call(proc: nfs3::NfsProc3) -> xdr::rpc::call_body {
    xdr::rpc::call_body {
        rpcvers: 2,
        prog: nfs3::PROGRAM,
        vers: nfs3::VERSION,
        proc: proc as u32,
        cred: xdr::rpc::opaque_auth::default(),
        verf: xdr::rpc::opaque_auth::default(),
    }
}

async fn dispatch(
    xid: u32,
    proc: nfs3::NfsProc3,
    args: &impl Serialize,
    context: &Context,
) -> Cursor<Vec<u8>> {
    let mut input = Cursor::new(Vec::new());
    args.serialize(&mut input).expect("serialize args");
    input.set_position(0);

    let mut output = Cursor::new(Vec::new());
    handle_nfs(xid, nfs_call(proc), &mut input, &mut output, context)
        .await
        .expect("handle_nfs");
    output.set_position(0);
    output
}

/// Strips the accepted-SUCCESS envelope and returns the procedure status.
fn read_status(xid: u32, output: &mut Cursor<Vec<u8>>) -> nfs3::nfsstat3 {
    let reply = deserialize::<xdr::rpc::rpc_msg>(output).expect("deserialize rpc reply");
    assert_eq!(reply.xid, xid);
    match reply.body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(accepted)) => {
            assert!(matches!(accepted.reply_data, xdr::rpc::accept_body::SUCCESS));
        }
        other => panic!("expected MSG_ACCEPTED, got {other:?}"),
    }
    let raw = deserialize::<u32>(output).expect("deserialize status");
    nfs3::nfsstat3::from_u32(raw).expect("invalid nfsstat3 value")
}

fn root_fh(dispatcher: &NfsDispatcher) -> nfs3::nfs_fh3 {
    nfs3::nfs_fh3 { data: dispatcher.handle_for(dispatcher.root()) }
}

#[tokio::test]
async fn lookup_then_getattr() {
    let store = Arc::new(MemStore::new());
    store.add_file(support::ROOT_ID, "hello.txt", b"hello world");
    let (context, dispatcher) = test_context(store, MountAccess::ReadWrite);

    let args = nfs3::diropargs3 { dir: root_fh(&dispatcher), name: "hello.txt".into() };
    let mut output = dispatch(1, nfs3::NfsProc3::LOOKUP, &args, &context).await;
    assert_eq!(read_status(1, &mut output), nfs3::nfsstat3::NFS3_OK);

    let handle = deserialize::<nfs3::nfs_fh3>(&mut output).expect("deserialize handle");
    let obj_attr = deserialize::<nfs3::post_op_attr>(&mut output).expect("deserialize attr");
    let nfs3::post_op_attr::attributes(looked_up) = obj_attr else {
        panic!("expected object attributes in LOOKUP reply");
    };
    assert_eq!(looked_up.ftype, nfs3::ftype3::NF3REG);
    assert_eq!(looked_up.size, 11);

    let mut output = dispatch(2, nfs3::NfsProc3::GETATTR, &handle, &context).await;
    assert_eq!(read_status(2, &mut output), nfs3::nfsstat3::NFS3_OK);
    let attr = deserialize::<nfs3::fattr3>(&mut output).expect("deserialize fattr3");
    assert_eq!(attr.fileid, looked_up.fileid);
    assert_eq!(attr.size, 11);
}

#[tokio::test]
async fn lookup_of_missing_name_is_noent() {
    let store = Arc::new(MemStore::new());
    let (context, dispatcher) = test_context(store, MountAccess::ReadWrite);

    let args = nfs3::diropargs3 { dir: root_fh(&dispatcher), name: "missing".into() };
    let mut output = dispatch(1, nfs3::NfsProc3::LOOKUP, &args, &context).await;
    assert_eq!(read_status(1, &mut output), nfs3::nfsstat3::NFS3ERR_NOENT);
}

#[tokio::test]
async fn stale_handle_is_answered_stale() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store.clone(), MountAccess::ReadWrite);
    // A handle minted by a different server instance.
    let (_, other_dispatcher) = test_context(store, MountAccess::ReadWrite);

    let foreign = root_fh(&other_dispatcher);
    let mut output = dispatch(1, nfs3::NfsProc3::GETATTR, &foreign, &context).await;
    assert_eq!(read_status(1, &mut output), nfs3::nfsstat3::NFS3ERR_STALE);
}

#[tokio::test]
async fn write_then_read_round_trip() {
    let store = Arc::new(MemStore::new());
    let file = store.add_file(support::ROOT_ID, "data.bin", b"");
    let (context, dispatcher) = test_context(store, MountAccess::ReadWrite);
    let fh = nfs3::nfs_fh3 { data: dispatcher.handle_for(file) };

    let write_args = nfs3::file::WRITE3args {
        file: fh.clone(),
        offset: 0,
        count: 5,
        stable: nfs3::file::stable_how::UNSTABLE as u32,
        data: b"hello".to_vec(),
    };
    let mut output = dispatch(1, nfs3::NfsProc3::WRITE, &write_args, &context).await;
    assert_eq!(read_status(1, &mut output), nfs3::nfsstat3::NFS3_OK);
    let res = deserialize::<nfs3::file::WRITE3resok>(&mut output).expect("deserialize resok");
    assert_eq!(res.count, 5);
    assert_eq!(res.committed, nfs3::file::stable_how::FILE_SYNC);
    assert_eq!(res.verf, dispatcher.generation().to_be_bytes());

    let read_args = nfs3::file::READ3args { file: fh, offset: 0, count: 64 };
    let mut output = dispatch(2, nfs3::NfsProc3::READ, &read_args, &context).await;
    assert_eq!(read_status(2, &mut output), nfs3::nfsstat3::NFS3_OK);
    let res = deserialize::<nfs3::file::READ3resok>(&mut output).expect("deserialize resok");
    assert_eq!(res.data, b"hello");
    assert!(res.eof);
}

#[tokio::test]
async fn write_count_payload_disagreement_is_garbage_args() {
    let store = Arc::new(MemStore::new());
    let file = store.add_file(support::ROOT_ID, "data.bin", b"");
    let (context, dispatcher) = test_context(store, MountAccess::ReadWrite);

    let args = nfs3::file::WRITE3args {
        file: nfs3::nfs_fh3 { data: dispatcher.handle_for(file) },
        offset: 0,
        count: 3,
        stable: nfs3::file::stable_how::FILE_SYNC as u32,
        data: b"hello".to_vec(),
    };
    let mut output = dispatch(1, nfs3::NfsProc3::WRITE, &args, &context).await;

    let reply = deserialize::<xdr::rpc::rpc_msg>(&mut output).expect("deserialize reply");
    match reply.body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(accepted)) => {
            assert!(matches!(accepted.reply_data, xdr::rpc::accept_body::GARBAGE_ARGS));
        }
        other => panic!("expected MSG_ACCEPTED, got {other:?}"),
    }
}

#[tokio::test]
async fn write_on_read_only_mount_is_rofs() {
    let store = Arc::new(MemStore::new());
    let file = store.add_file(support::ROOT_ID, "data.bin", b"x");
    let (context, dispatcher) = test_context(store.clone(), MountAccess::ReadOnly);

    let args = nfs3::file::WRITE3args {
        file: nfs3::nfs_fh3 { data: dispatcher.handle_for(file) },
        offset: 0,
        count: 1,
        stable: nfs3::file::stable_how::FILE_SYNC as u32,
        data: b"y".to_vec(),
    };
    let mut output = dispatch(1, nfs3::NfsProc3::WRITE, &args, &context).await;
    assert_eq!(read_status(1, &mut output), nfs3::nfsstat3::NFS3ERR_ROFS);
    assert_eq!(store.op_count(), 0);
}

#[tokio::test]
async fn readdir_lists_entries_and_reports_eof() {
    let store = Arc::new(MemStore::new());
    store.add_file(support::ROOT_ID, "a", b"1");
    store.add_file(support::ROOT_ID, "b", b"2");
    store.add_dir(support::ROOT_ID, "sub");
    let (context, dispatcher) = test_context(store, MountAccess::ReadWrite);

    let args = nfs3::dir::READDIR3args {
        dir: root_fh(&dispatcher),
        cookie: 0,
        cookieverf: [0; 8],
        count: 4096,
    };
    let mut output = dispatch(1, nfs3::NfsProc3::READDIR, &args, &context).await;
    assert_eq!(read_status(1, &mut output), nfs3::nfsstat3::NFS3_OK);

    let _dir_attr = deserialize::<nfs3::post_op_attr>(&mut output).expect("deserialize dir attr");
    let _verf = deserialize::<nfs3::cookieverf3>(&mut output).expect("deserialize verifier");

    let mut names = Vec::new();
    let mut cookies = Vec::new();
    while deserialize::<bool>(&mut output).expect("deserialize list flag") {
        let entry = deserialize::<nfs3::dir::entry3>(&mut output).expect("deserialize entry");
        names.push(entry.name.to_vec());
        cookies.push(entry.cookie);
    }
    let eof = deserialize::<bool>(&mut output).expect("deserialize eof");

    assert_eq!(names, vec![b"a".to_vec(), b"b".to_vec(), b"sub".to_vec()]);
    assert_eq!(cookies, vec![1, 2, 3]);
    assert!(eof);
}

#[tokio::test]
async fn readdir_resumed_with_wrong_verifier_is_bad_cookie() {
    let store = Arc::new(MemStore::new());
    store.add_file(support::ROOT_ID, "a", b"1");
    let (context, dispatcher) = test_context(store, MountAccess::ReadWrite);

    // Fresh iteration mints the verifier.
    let args = nfs3::dir::READDIR3args {
        dir: root_fh(&dispatcher),
        cookie: 0,
        cookieverf: [0; 8],
        count: 4096,
    };
    let mut output = dispatch(1, nfs3::NfsProc3::READDIR, &args, &context).await;
    assert_eq!(read_status(1, &mut output), nfs3::nfsstat3::NFS3_OK);

    // Resuming with a verifier the server never issued.
    let args = nfs3::dir::READDIR3args {
        dir: root_fh(&dispatcher),
        cookie: 1,
        cookieverf: [0xff; 8],
        count: 4096,
    };
    let mut output = dispatch(2, nfs3::NfsProc3::READDIR, &args, &context).await;
    assert_eq!(read_status(2, &mut output), nfs3::nfsstat3::NFS3ERR_BAD_COOKIE);
}

#[tokio::test]
async fn create_then_remove() {
    let store = Arc::new(MemStore::new());
    let (context, dispatcher) = test_context(store, MountAccess::ReadWrite);

    let args = nfs3::dir::CREATE3args {
        dirops: nfs3::diropargs3 { dir: root_fh(&dispatcher), name: "new.txt".into() },
        how: nfs3::dir::createhow3::UNCHECKED(nfs3::sattr3::default()),
    };
    let mut output = dispatch(1, nfs3::NfsProc3::CREATE, &args, &context).await;
    assert_eq!(read_status(1, &mut output), nfs3::nfsstat3::NFS3_OK);

    let remove_args =
        nfs3::diropargs3 { dir: root_fh(&dispatcher), name: "new.txt".into() };
    let mut output = dispatch(2, nfs3::NfsProc3::REMOVE, &remove_args, &context).await;
    assert_eq!(read_status(2, &mut output), nfs3::nfsstat3::NFS3_OK);

    let lookup_args =
        nfs3::diropargs3 { dir: root_fh(&dispatcher), name: "new.txt".into() };
    let mut output = dispatch(3, nfs3::NfsProc3::LOOKUP, &lookup_args, &context).await;
    assert_eq!(read_status(3, &mut output), nfs3::nfsstat3::NFS3ERR_NOENT);
}

#[tokio::test]
async fn unknown_procedure_gets_proc_unavail() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store, MountAccess::ReadWrite);

    let mut call = nfs_call(nfs3::NfsProc3::NULL);
    call.proc = 99;
    let mut input = Cursor::new(Vec::new());
    let mut output = Cursor::new(Vec::new());
    handle_nfs(1, call, &mut input, &mut output, &context).await.expect("handle_nfs");
    output.set_position(0);

    let reply = deserialize::<xdr::rpc::rpc_msg>(&mut output).expect("deserialize reply");
    match reply.body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(accepted)) => {
            assert!(matches!(accepted.reply_data, xdr::rpc::accept_body::PROC_UNAVAIL));
        }
        other => panic!("expected MSG_ACCEPTED, got {other:?}"),
    }
}

#[tokio::test]
async fn mount_returns_root_handle_and_signals() {
    let store = Arc::new(MemStore::new());
    let (mut context, dispatcher) = test_context(store, MountAccess::ReadWrite);
    let (signal_send, mut signal_recv) = tokio::sync::mpsc::channel(1);
    context.mount_signal = Some(signal_send);

    let call = xdr::rpc::call_body {
        rpcvers: 2,
        prog: mount::PROGRAM,
        vers: mount::VERSION,
        proc: mount::MountProc3::MNT as u32,
        cred: xdr::rpc::opaque_auth::default(),
        verf: xdr::rpc::opaque_auth::default(),
    };
    let mut input = Cursor::new(Vec::new());
    mount::dirpath::from("/").serialize(&mut input).expect("serialize dirpath");
    input.set_position(0);

    let mut output = Cursor::new(Vec::new());
    handle_mount(9, call, &mut input, &mut output, &context).await.expect("handle_mount");
    output.set_position(0);

    let reply = deserialize::<xdr::rpc::rpc_msg>(&mut output).expect("deserialize reply");
    assert_eq!(reply.xid, 9);
    let status = deserialize::<mount::mountstat3>(&mut output).expect("deserialize status");
    assert_eq!(status, mount::mountstat3::MNT3_OK);
    let res = deserialize::<mount::mountres3_ok>(&mut output).expect("deserialize mountres");
    assert_eq!(res.fhandle, dispatcher.handle_for(dispatcher.root()));
    assert_eq!(res.auth_flavors, vec![0, 1]);

    assert_eq!(signal_recv.recv().await, Some(true));
}

#[tokio::test]
async fn mount_of_unknown_export_is_noent() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store, MountAccess::ReadWrite);

    let call = xdr::rpc::call_body {
        rpcvers: 2,
        prog: mount::PROGRAM,
        vers: mount::VERSION,
        proc: mount::MountProc3::MNT as u32,
        cred: xdr::rpc::opaque_auth::default(),
        verf: xdr::rpc::opaque_auth::default(),
    };
    let mut input = Cursor::new(Vec::new());
    mount::dirpath::from("/elsewhere").serialize(&mut input).expect("serialize dirpath");
    input.set_position(0);

    let mut output = Cursor::new(Vec::new());
    handle_mount(3, call, &mut input, &mut output, &context).await.expect("handle_mount");
    output.set_position(0);

    let _reply = deserialize::<xdr::rpc::rpc_msg>(&mut output).expect("deserialize reply");
    let status = deserialize::<mount::mountstat3>(&mut output).expect("deserialize status");
    assert_eq!(status, mount::mountstat3::MNT3ERR_NOENT);
}
