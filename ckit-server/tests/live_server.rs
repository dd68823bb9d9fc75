//! End-to-end tests: boot the real server on an ephemeral port and drive it
//! over TCP with the blocking client.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ckit_client::{Client, Reply, Ttl};
use ckit_engine::Store;
use ckit_server::command::ServerCtx;
use ckit_server::server::serve;

/// Binds an ephemeral port, spawns the server on its own runtime thread,
/// and returns the address to dial.
fn start_server(store: Store, snapshot_path: PathBuf) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.set_nonblocking(true).expect("nonblocking");
    let addr = listener.local_addr().expect("addr").to_string();
    let ctx = Arc::new(ServerCtx::new(store, snapshot_path));

    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
            let _ = serve(listener, ctx).await;
        });
    });

    addr
}

fn connect(addr: &str) -> Client {
    let mut client = Client::connect(addr).expect("connect");
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout");
    client
}

fn test_server() -> String {
    let dir = std::env::temp_dir();
    let unique = format!(
        "cachekit-test-{}-{:?}.ckdb",
        std::process::id(),
        thread::current().id()
    );
    start_server(Store::new(), dir.join(unique))
}

#[test]
fn set_get_over_the_wire() {
    let addr = test_server();
    let mut client = connect(&addr);

    client.ping().expect("ping");
    client.set(b"x", b"1").expect("set");
    assert_eq!(client.get(b"x").expect("get").as_deref(), Some(b"1".as_ref()));
    assert_eq!(client.get(b"missing").expect("get"), None);
}

#[test]
fn incr_after_set() {
    let addr = test_server();
    let mut client = connect(&addr);

    client.set(b"a", b"1").expect("set");
    assert_eq!(client.incr(b"a").expect("incr"), 2);
    assert_eq!(client.get(b"a").expect("get").as_deref(), Some(b"2".as_ref()));
}

#[test]
fn list_range_over_the_wire() {
    let addr = test_server();
    let mut client = connect(&addr);

    for value in [b"a", b"b", b"c"] {
        client.command(&[b"RPUSH", b"L", value]).expect("rpush");
    }
    let reply = client.command(&[b"LRANGE", b"L", b"0", b"-1"]).expect("lrange");
    assert_eq!(
        reply,
        Reply::Array(vec![
            Reply::Bulk(Some(b"a".to_vec())),
            Reply::Bulk(Some(b"b".to_vec())),
            Reply::Bulk(Some(b"c".to_vec())),
        ])
    );
}

#[test]
fn hash_field_updates() {
    let addr = test_server();
    let mut client = connect(&addr);

    assert_eq!(
        client.command(&[b"HSET", b"h", b"f", b"v"]).expect("hset"),
        Reply::Integer(1)
    );
    assert_eq!(
        client.command(&[b"HSET", b"h", b"f", b"w"]).expect("hset"),
        Reply::Integer(0)
    );
    assert_eq!(
        client.command(&[b"HGET", b"h", b"f"]).expect("hget"),
        Reply::Bulk(Some(b"w".to_vec()))
    );
}

#[test]
fn expiration_is_observed() {
    let addr = test_server();
    let mut client = connect(&addr);

    client.set_ex(b"k", b"v", 1).expect("set ex");
    match client.ttl(b"k").expect("ttl") {
        Ttl::ExpiresIn(_) => {}
        other => panic!("expected a deadline, got {other:?}"),
    }

    thread::sleep(Duration::from_millis(1100));
    assert_eq!(client.get(b"k").expect("get"), None);
    assert_eq!(client.ttl(b"k").expect("ttl"), Ttl::Missing);
}

#[test]
fn wrongtype_reaches_the_client() {
    let addr = test_server();
    let mut client = connect(&addr);

    client.set(b"a", b"1").expect("set");
    let reply = client.command(&[b"LPUSH", b"a", b"x"]).expect("lpush");
    assert_eq!(
        reply,
        Reply::Error(
            b"WRONGTYPE Operation against a key holding the wrong kind of value".to_vec()
        )
    );
}

#[test]
fn pipelined_requests_reply_in_order() {
    let addr = test_server();
    let mut stream = TcpStream::connect(&addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout");

    // two commands in one write
    stream
        .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nx\r\n$1\r\n1\r\n*2\r\n$3\r\nGET\r\n$1\r\nx\r\n")
        .expect("write");

    let expected = b"+OK\r\n$1\r\n1\r\n";
    let mut got = vec![0u8; expected.len()];
    stream.read_exact(&mut got).expect("read");
    assert_eq!(got, expected);
}

#[test]
fn inline_commands_are_tolerated() {
    let addr = test_server();
    let mut stream = TcpStream::connect(&addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout");

    stream.write_all(b"PING\r\n").expect("write");
    let mut got = vec![0u8; b"+PONG\r\n".len()];
    stream.read_exact(&mut got).expect("read");
    assert_eq!(got, b"+PONG\r\n");
}

#[test]
fn split_frame_across_writes() {
    let addr = test_server();
    let mut stream = TcpStream::connect(&addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout");

    stream.write_all(b"*2\r\n$4\r\nECHO\r\n$5\r\nhel").expect("write");
    stream.flush().expect("flush");
    thread::sleep(Duration::from_millis(50));
    stream.write_all(b"lo\r\n").expect("write");

    let mut got = vec![0u8; b"$5\r\nhello\r\n".len()];
    stream.read_exact(&mut got).expect("read");
    assert_eq!(got, b"$5\r\nhello\r\n");
}

#[test]
fn save_and_reload_roundtrip() {
    let dir = tempdir();
    let path = dir.join("dump.ckdb");

    let addr = start_server(Store::new(), path.clone());
    let mut client = connect(&addr);
    client.set(b"persisted", b"yes").expect("set");
    client.command(&[b"RPUSH", b"q", b"one"]).expect("rpush");
    assert_eq!(
        client.command(&[b"SAVE"]).expect("save"),
        Reply::Simple(b"OK".to_vec())
    );

    // boot a second server from the snapshot
    let mut store = Store::new();
    ckit_engine::snapshot::load(&mut store, &path).expect("load");
    let addr2 = start_server(store, path);
    let mut client2 = connect(&addr2);
    assert_eq!(
        client2.get(b"persisted").expect("get").as_deref(),
        Some(b"yes".as_ref())
    );
    assert_eq!(client2.dbsize().expect("dbsize"), 2);

    std::fs::remove_dir_all(dir).ok();
}

fn tempdir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "cachekit-it-{}-{:?}",
        std::process::id(),
        thread::current().id()
    ));
    std::fs::create_dir_all(&dir).expect("tempdir");
    dir
}

#[test]
fn info_counts_this_connection() {
    let addr = test_server();
    let mut client = connect(&addr);

    let reply = client.command(&[b"INFO"]).expect("info");
    let Reply::Bulk(Some(body)) = reply else {
        panic!("INFO must return a bulk string");
    };
    let text = String::from_utf8(body).expect("utf8");
    assert!(text.contains("cachekit_version:"));
    assert!(text.contains("connected_clients:1"));
}
