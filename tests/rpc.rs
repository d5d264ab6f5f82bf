use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

mod support;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;
use tokio::time::timeout;

use latentfs::dispatch::nfs::NfsDispatcher;
use latentfs::dispatch::MountAccess;
use latentfs::protocol::rpc::{SocketMessageHandler, MAX_RPC_RECORD_LENGTH};
use latentfs::tcp::{NfsTcp, NfsTcpListener};
use latentfs::xdr::{self, deserialize, nfs3, Serialize};

use support::{test_context, MemStore};

fn call_message(xid: u32, vers: u32, proc: u32) -> Vec<u8> {
    call_message_full(xid, 2, nfs3::PROGRAM, vers, proc, xdr::rpc::opaque_auth::default())
}

fn call_message_full(
    xid: u32,
    rpcvers: u32,
    prog: u32,
    vers: u32,
    proc: u32,
    cred: xdr::rpc::opaque_auth,
) -> Vec<u8> {
    let call = xdr::rpc::call_body {
        rpcvers,
        prog,
        vers,
        proc,
        cred,
        verf: xdr::rpc::opaque_auth::default(),
    };
    let msg = xdr::rpc::rpc_msg { xid, body: xdr::rpc::rpc_body::CALL(call) };
    let mut buf = Vec::new();
    msg.serialize(&mut buf).expect("serialize rpc_msg");
    buf
}

async fn send_record(socksend: &mut DuplexStream, payload: &[u8]) {
    let header = (1_u32 << 31) | payload.len() as u32;
    socksend.write_all(&header.to_be_bytes()).await.expect("write fragment header");
    socksend.write_all(payload).await.expect("write fragment body");
}

async fn recv_reply(
    msgrecv: &mut tokio::sync::mpsc::UnboundedReceiver<Result<Vec<u8>, anyhow::Error>>,
) -> Vec<u8> {
    timeout(Duration::from_secs(1), msgrecv.recv())
        .await
        .expect("reply timeout")
        .expect("reply channel closed")
        .expect("reply error")
}

#[tokio::test]
async fn rejects_oversized_rpc_record() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store, MountAccess::ReadWrite);
    let (mut handler, mut socksend, _msgrecv) = SocketMessageHandler::new(&context);

    let oversized = MAX_RPC_RECORD_LENGTH + 1;
    let fragment_header = (1_u32 << 31) | (oversized as u32);
    socksend
        .write_all(&fragment_header.to_be_bytes())
        .await
        .expect("write fragment header");

    let err = handler.read().await.expect_err("expected oversize error");
    assert!(err.to_string().contains("exceeds maximum"), "unexpected error: {err:?}");
}

#[tokio::test]
async fn credential_with_lying_body_length_is_rejected() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store.clone(), MountAccess::ReadWrite);
    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&context);

    // Hand-assembled call whose credential body claims ~4 GiB of opaque
    // data, but the record ends four bytes later. Decode must fail when
    // the record runs dry, not allocate the declared size.
    let mut msg_buf = Vec::new();
    for word in [21_u32, 0, 2, nfs3::PROGRAM, nfs3::VERSION, 0, 0, 0xFFFF_FFF0] {
        word.serialize(&mut msg_buf).expect("serialize word");
    }
    msg_buf.extend_from_slice(&[0_u8; 4]);
    send_record(&mut socksend, &msg_buf).await;
    handler.read().await.expect("handler read");

    let err = timeout(Duration::from_secs(1), msgrecv.recv())
        .await
        .expect("reply timeout")
        .expect("reply channel closed")
        .expect_err("expected decode failure");
    assert!(err.to_string().contains("declared length"), "unexpected error: {err:?}");
    assert_eq!(store.op_count(), 0);
}

#[tokio::test]
async fn listener_survives_client_reset_before_first_request() {
    let store = Arc::new(MemStore::new());
    let dispatcher = Arc::new(NfsDispatcher::new(store, MountAccess::ReadWrite));
    let listener = NfsTcpListener::bind("127.0.0.1:0", dispatcher).await.expect("bind");
    let port = listener.get_listen_port();
    tokio::spawn(async move {
        let _ = listener.handle_forever().await;
    });

    // First client resets immediately after connecting.
    let early = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
    early.set_linger(Some(Duration::ZERO)).expect("set linger");
    drop(early);

    // A later client must still be served.
    let mut socket = TcpStream::connect(("127.0.0.1", port)).await.expect("connect");
    let msg_buf = call_message(77, nfs3::VERSION, nfs3::NfsProc3::NULL as u32);
    let header = (1_u32 << 31) | msg_buf.len() as u32;
    socket.write_all(&header.to_be_bytes()).await.expect("write call header");
    socket.write_all(&msg_buf).await.expect("write call body");

    let response = timeout(Duration::from_secs(2), async {
        let mut header = [0_u8; 4];
        socket.read_exact(&mut header).await.expect("read reply header");
        let length = (u32::from_be_bytes(header) & ((1 << 31) - 1)) as usize;
        let mut payload = vec![0_u8; length];
        socket.read_exact(&mut payload).await.expect("read reply body");
        payload
    })
    .await
    .expect("reply timeout");

    let reply =
        deserialize::<xdr::rpc::rpc_msg>(&mut Cursor::new(response)).expect("deserialize reply");
    assert_eq!(reply.xid, 77);
    assert!(matches!(
        reply.body,
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(_))
    ));
}

#[tokio::test]
async fn reassembles_messages_split_across_fragments() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store, MountAccess::ReadWrite);
    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&context);

    let xid = 3;
    let msg_buf = call_message(xid, nfs3::VERSION, nfs3::NfsProc3::NULL as u32);
    let cut_a = msg_buf.len() / 3;
    let cut_b = 2 * msg_buf.len() / 3;

    for (chunk, is_last) in
        [(&msg_buf[..cut_a], false), (&msg_buf[cut_a..cut_b], false), (&msg_buf[cut_b..], true)]
    {
        let header =
            if is_last { (1_u32 << 31) | chunk.len() as u32 } else { chunk.len() as u32 };
        socksend.write_all(&header.to_be_bytes()).await.expect("write fragment header");
        socksend.write_all(chunk).await.expect("write fragment body");
        handler.read().await.expect("handler read");
    }

    let response = recv_reply(&mut msgrecv).await;
    let reply =
        deserialize::<xdr::rpc::rpc_msg>(&mut Cursor::new(response)).expect("deserialize reply");
    assert_eq!(reply.xid, xid);
    assert!(matches!(
        reply.body,
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(_))
    ));
}

#[tokio::test]
async fn unsupported_rpc_version_is_denied_with_bounds() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store, MountAccess::ReadWrite);
    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&context);

    let xid = 11;
    let msg_buf = call_message_full(
        xid,
        3,
        nfs3::PROGRAM,
        nfs3::VERSION,
        0,
        xdr::rpc::opaque_auth::default(),
    );
    send_record(&mut socksend, &msg_buf).await;
    handler.read().await.expect("handler read");

    let response = recv_reply(&mut msgrecv).await;
    let reply =
        deserialize::<xdr::rpc::rpc_msg>(&mut Cursor::new(response)).expect("deserialize reply");
    assert_eq!(reply.xid, xid);
    match reply.body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_DENIED(denied)) => {
            assert_eq!(
                denied,
                xdr::rpc::rejected_reply::RPC_MISMATCH(xdr::rpc::mismatch_info {
                    low: 2,
                    high: 2
                })
            );
        }
        other => panic!("expected MSG_DENIED, got {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_nfs_version_is_denied_with_bounds() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store, MountAccess::ReadWrite);
    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&context);

    let xid = 42;
    let msg_buf = call_message(xid, nfs3::VERSION + 1, 0);
    send_record(&mut socksend, &msg_buf).await;
    handler.read().await.expect("handler read");

    let response = recv_reply(&mut msgrecv).await;
    let reply =
        deserialize::<xdr::rpc::rpc_msg>(&mut Cursor::new(response)).expect("deserialize reply");
    assert_eq!(reply.xid, xid);
    match reply.body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_DENIED(denied)) => {
            assert_eq!(
                denied,
                xdr::rpc::rejected_reply::RPC_MISMATCH(xdr::rpc::mismatch_info {
                    low: nfs3::VERSION,
                    high: nfs3::VERSION
                })
            );
        }
        other => panic!("expected MSG_DENIED, got {other:?}"),
    }
}

#[tokio::test]
async fn unsupported_auth_flavor_is_rejected_before_dispatch() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store.clone(), MountAccess::ReadWrite);
    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&context);

    let xid = 5;
    let cred =
        xdr::rpc::opaque_auth { flavor: xdr::rpc::auth_flavor::AUTH_DES, body: Vec::new() };
    let msg_buf = call_message_full(
        xid,
        2,
        nfs3::PROGRAM,
        nfs3::VERSION,
        nfs3::NfsProc3::GETATTR as u32,
        cred,
    );
    send_record(&mut socksend, &msg_buf).await;
    handler.read().await.expect("handler read");

    let response = recv_reply(&mut msgrecv).await;
    let reply =
        deserialize::<xdr::rpc::rpc_msg>(&mut Cursor::new(response)).expect("deserialize reply");
    assert_eq!(reply.xid, xid);
    match reply.body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_DENIED(denied)) => {
            assert_eq!(
                denied,
                xdr::rpc::rejected_reply::AUTH_ERROR(xdr::rpc::auth_stat::AUTH_TOOWEAK)
            );
        }
        other => panic!("expected MSG_DENIED, got {other:?}"),
    }
    // The gate answered before any filesystem code ran.
    assert_eq!(store.op_count(), 0);
}

#[tokio::test]
async fn unknown_program_gets_prog_unavail() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store, MountAccess::ReadWrite);
    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&context);

    let xid = 13;
    let msg_buf =
        call_message_full(xid, 2, 99999, 1, 0, xdr::rpc::opaque_auth::default());
    send_record(&mut socksend, &msg_buf).await;
    handler.read().await.expect("handler read");

    let response = recv_reply(&mut msgrecv).await;
    let reply =
        deserialize::<xdr::rpc::rpc_msg>(&mut Cursor::new(response)).expect("deserialize reply");
    assert_eq!(reply.xid, xid);
    match reply.body {
        xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(accepted)) => {
            assert!(matches!(accepted.reply_data, xdr::rpc::accept_body::PROG_UNAVAIL));
        }
        other => panic!("expected MSG_ACCEPTED, got {other:?}"),
    }
}

#[tokio::test]
async fn retransmitted_call_is_dropped() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store, MountAccess::ReadWrite);
    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&context);

    let xid = 17;
    let msg_buf = call_message(xid, nfs3::VERSION, nfs3::NfsProc3::NULL as u32);

    send_record(&mut socksend, &msg_buf).await;
    handler.read().await.expect("handler read");
    let first = recv_reply(&mut msgrecv).await;
    let reply =
        deserialize::<xdr::rpc::rpc_msg>(&mut Cursor::new(first)).expect("deserialize reply");
    assert_eq!(reply.xid, xid);

    // Same xid from the same client again: no second reply.
    send_record(&mut socksend, &msg_buf).await;
    handler.read().await.expect("handler read");
    assert!(timeout(Duration::from_millis(200), msgrecv.recv()).await.is_err());
}

#[tokio::test]
async fn concurrent_messages_each_get_a_well_formed_reply() {
    let store = Arc::new(MemStore::new());
    let (context, _) = test_context(store, MountAccess::ReadWrite);
    let (mut handler, mut socksend, mut msgrecv) = SocketMessageHandler::new(&context);

    for xid in [1_u32, 2] {
        let msg_buf = call_message(xid, nfs3::VERSION, nfs3::NfsProc3::NULL as u32);
        send_record(&mut socksend, &msg_buf).await;
        handler.read().await.expect("handler read");
    }

    let mut seen = Vec::new();
    for _ in 0..2 {
        let response = recv_reply(&mut msgrecv).await;
        let reply = deserialize::<xdr::rpc::rpc_msg>(&mut Cursor::new(response))
            .expect("deserialize reply");
        assert!(matches!(
            reply.body,
            xdr::rpc::rpc_body::REPLY(xdr::rpc::reply_body::MSG_ACCEPTED(_))
        ));
        seen.push(reply.xid);
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2]);
}
