//! Server Tests
//!
//! End-to-end tests over real TCP connections.

use std::io::{BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use simpledb::network::Server;
use simpledb::protocol::{read_value, Limits};
use simpledb::{Client, Config, DbError, Engine, Value};

struct TestServer {
    server: Arc<Server>,
    engine: Arc<Engine>,
    addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start(max_connections: usize) -> Self {
        let config = Config::builder()
            .listen_addr("127.0.0.1:0")
            .max_connections(max_connections)
            .build();

        Self::start_with(config, Arc::new(Engine::new()))
    }

    fn start_with(config: Config, engine: Arc<Engine>) -> Self {
        let server = Arc::new(Server::bind(config, Arc::clone(&engine)).unwrap());
        let addr = server.local_addr().unwrap();

        let runner = Arc::clone(&server);
        let handle = thread::spawn(move || runner.run().unwrap());

        Self {
            server,
            engine,
            addr,
            handle: Some(handle),
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    fn client(&self) -> Client {
        Client::connect(self.addr).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Send raw bytes and expect an exact raw reply
fn exchange(stream: &mut TcpStream, request: &[u8], expected: &[u8]) {
    stream.write_all(request).unwrap();

    let mut reply = vec![0u8; expected.len()];
    stream.read_exact(&mut reply).unwrap();
    assert_eq!(
        reply,
        expected,
        "got {:?}",
        String::from_utf8_lossy(&reply)
    );
}

fn read_reply(stream: &TcpStream) -> Value {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    read_value(&mut reader).unwrap()
}

// =============================================================================
// Wire-level Tests
// =============================================================================

#[test]
fn test_set_get_wire_example() {
    let server = TestServer::start(4);
    let mut stream = server.connect();

    exchange(
        &mut stream,
        b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\n5\r\n",
        b":1\r\n",
    );
    exchange(&mut stream, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$1\r\n5\r\n");
}

#[test]
fn test_inline_string_command() {
    let server = TestServer::start(4);
    let mut stream = server.connect();

    exchange(&mut stream, b"+FLUSH\r\n", b":0\r\n");
}

#[test]
fn test_unknown_command_keeps_session() {
    let server = TestServer::start(4);
    let mut stream = server.connect();

    stream.write_all(b"*1\r\n$4\r\nFROB\r\n").unwrap();
    match read_reply(&stream) {
        Value::Error(message) => assert!(message.contains("unknown command")),
        other => panic!("Expected error reply, got {:?}", other),
    }

    exchange(&mut stream, b"*1\r\n$5\r\nFLUSH\r\n", b":0\r\n");
}

#[test]
fn test_missing_key_is_error_reply() {
    let server = TestServer::start(4);
    let mut stream = server.connect();

    stream.write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nnope\r\n").unwrap();
    match read_reply(&stream) {
        Value::Error(message) => assert!(message.contains("key not found")),
        other => panic!("Expected error reply, got {:?}", other),
    }

    exchange(&mut stream, b"*2\r\n$3\r\nDEL\r\n$4\r\nnope\r\n", b":0\r\n");
}

#[test]
fn test_bad_tag_keeps_session() {
    let server = TestServer::start(4);
    let mut stream = server.connect();

    stream.write_all(b"?garbage\r\n").unwrap();
    match read_reply(&stream) {
        Value::Error(message) => assert!(message.contains("bad request")),
        other => panic!("Expected error reply, got {:?}", other),
    }

    exchange(&mut stream, b"*1\r\n$5\r\nFLUSH\r\n", b":0\r\n");
}

#[test]
fn test_corrupt_frame_closes_session() {
    let server = TestServer::start(4);
    let mut stream = server.connect();

    stream.write_all(b"*2\r\n$3\r\nGET\r\n?x\r\n").unwrap();

    let mut reader = BufReader::new(stream.try_clone().unwrap());
    match read_value(&mut reader) {
        Ok(Value::Error(message)) => assert!(message.contains("protocol error")),
        other => panic!("Expected error reply, got {:?}", other),
    }

    // Server hung up after the error reply
    assert!(matches!(
        read_value(&mut reader),
        Err(DbError::Disconnect) | Err(DbError::Io(_))
    ));
}

#[test]
fn test_bare_cr_value_is_rejected_not_stored() {
    let server = TestServer::start(4);
    let mut stream = server.connect();

    stream
        .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n+a\rb\r\n")
        .unwrap();
    match read_reply(&stream) {
        Value::Error(message) => assert!(message.contains("protocol error")),
        other => panic!("Expected error reply, got {:?}", other),
    }

    assert!(!server.engine.store().contains_key(b"k"));
    let mut client = server.client();
    assert!(matches!(client.get("k"), Err(DbError::Server(_))));
}

#[test]
fn test_unencodable_reply_becomes_error_reply() {
    let engine = Arc::new(Engine::new());
    let set = Value::Array(vec!["SET".into(), "bad".into(), Value::simple("two\nlines")]);
    engine.execute(&set).unwrap();

    let config = Config::builder().listen_addr("127.0.0.1:0").build();
    let server = TestServer::start_with(config, engine);
    let mut stream = server.connect();

    stream.write_all(b"*2\r\n$3\r\nGET\r\n$3\r\nbad\r\n").unwrap();
    match read_reply(&stream) {
        Value::Error(message) => assert!(message.contains("cannot encode")),
        other => panic!("Expected error reply, got {:?}", other),
    }

    // Session is still usable
    exchange(&mut stream, b"*1\r\n$5\r\nFLUSH\r\n", b":1\r\n");
}

#[test]
fn test_read_timeout_closes_idle_session() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .read_timeout_ms(200)
        .build();
    let server = TestServer::start_with(config, Arc::new(Engine::new()));
    let mut stream = server.connect();

    exchange(&mut stream, b"*1\r\n$5\r\nFLUSH\r\n", b":0\r\n");

    // Idle past the timeout: the server hangs up
    let mut buf = [0u8; 16];
    match stream.read(&mut buf) {
        Ok(n) => assert_eq!(n, 0),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
    }
}

// =============================================================================
// Client Tests
// =============================================================================

#[test]
fn test_client_round_trip() {
    let server = TestServer::start(4);
    let mut client = server.client();

    assert_eq!(client.set("name", "simpledb").unwrap(), 1);
    assert_eq!(client.get("name").unwrap(), Value::bulk("simpledb"));

    assert_eq!(client.set("count", 42i64).unwrap(), 1);
    assert_eq!(client.get("count").unwrap(), Value::Integer(42));

    assert_eq!(client.set("nothing", Value::null()).unwrap(), 1);
    assert!(client.get("nothing").unwrap().is_null());

    assert!(client.delete("name").unwrap());
    assert!(!client.delete("name").unwrap());
    assert!(matches!(client.get("name"), Err(DbError::Server(_))));

    assert_eq!(client.flush().unwrap(), 2);
}

#[test]
fn test_client_nested_values() {
    let server = TestServer::start(4);
    let mut client = server.client();

    let doc = Value::Map(vec![
        (Value::bulk("tags"), Value::Array(vec!["a".into(), "b".into()])),
        (Value::bulk("n"), Value::Integer(3)),
    ]);
    client.set("doc", doc.clone()).unwrap();

    assert_eq!(client.get("doc").unwrap(), doc);
}

#[test]
fn test_client_mset_mget() {
    let server = TestServer::start(4);
    let mut client = server.client();

    let count = client
        .mset(vec![
            ("k1".to_string(), Value::bulk("v1")),
            ("k2".to_string(), Value::bulk("v2")),
        ])
        .unwrap();
    assert_eq!(count, 2);

    assert_eq!(
        client.mget(&["k1", "k2"]).unwrap(),
        vec![Value::bulk("v1"), Value::bulk("v2")]
    );
    assert!(client.mget(&["k1", "missing"]).is_err());

    // The failed MGET did not break the connection
    assert_eq!(client.get("k2").unwrap(), Value::bulk("v2"));
}

#[test]
fn test_client_wrapped_multi_key_arguments() {
    let server = TestServer::start(4);
    let mut client = server.client();

    let mset = vec![
        "MSET".into(),
        Value::Array(vec!["k1".into(), "v1".into(), "k2".into(), "v2".into()]),
    ];
    assert_eq!(client.execute(mset).unwrap(), Value::Integer(2));

    let mget = vec!["MGET".into(), Value::Array(vec!["k2".into(), "k1".into()])];
    assert_eq!(
        client.execute(mget).unwrap(),
        Value::Array(vec![Value::bulk("v2"), Value::bulk("v1")])
    );
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_flush_during_concurrent_mset_sessions() {
    let server = TestServer::start(8);

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let mut client = server.client();
            thread::spawn(move || {
                for i in 0..200 {
                    let count = client
                        .mset(vec![
                            (format!("a-{}-{}", t, i), Value::bulk("x")),
                            (format!("b-{}-{}", t, i), Value::bulk("y")),
                        ])
                        .unwrap();
                    assert_eq!(count, 2);
                }
            })
        })
        .collect();

    let flusher = {
        let mut client = server.client();
        thread::spawn(move || {
            for _ in 0..50 {
                client.flush().unwrap();
            }
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    flusher.join().unwrap();

    // No MSET was split by a FLUSH
    let store = server.engine.store();
    for t in 0..4 {
        for i in 0..200 {
            let a = store.contains_key(format!("a-{}-{}", t, i).as_bytes());
            let b = store.contains_key(format!("b-{}-{}", t, i).as_bytes());
            assert_eq!(a, b, "pair {}-{} split by flush", t, i);
        }
    }
}

#[test]
fn test_concurrent_clients_disjoint_keys() {
    let server = TestServer::start(8);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let mut client = server.client();
            thread::spawn(move || {
                for i in 0..100i64 {
                    let key = format!("client{}-key{}", t, i);
                    client.set(&key, i).unwrap();
                    assert_eq!(client.get(&key).unwrap(), Value::Integer(i));
                    if i % 3 == 0 {
                        assert!(client.delete(&key).unwrap());
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let mut client = server.client();
    for t in 0..8 {
        for i in (0..100i64).filter(|i| i % 3 != 0) {
            let key = format!("client{}-key{}", t, i);
            assert_eq!(client.get(&key).unwrap(), Value::Integer(i));
        }
    }
}

#[test]
fn test_saturated_pool_queues_connections() {
    let server = TestServer::start(1);

    // Occupies the only worker
    let mut first = server.client();
    assert_eq!(first.set("k", "v").unwrap(), 1);

    let mut second = server.connect();
    second.write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").unwrap();
    second
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();

    // No worker is free, so no reply yet
    let mut byte = [0u8; 1];
    assert!(second.read(&mut byte).is_err());

    // Releasing the worker lets the queued connection through
    drop(first);
    second.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut reply = vec![0u8; 7];
    second.read_exact(&mut reply).unwrap();
    assert_eq!(&reply, b"$1\r\nv\r\n");
}

#[test]
fn test_shutdown_stops_run() {
    let config = Config::builder().listen_addr("127.0.0.1:0").build();
    let server = Arc::new(Server::bind(config, Arc::new(Engine::new())).unwrap());

    let runner = Arc::clone(&server);
    let handle = thread::spawn(move || runner.run());

    server.shutdown();
    assert!(handle.join().unwrap().is_ok());
    assert!(server.is_shutdown());
}

#[test]
fn test_bind_rejects_invalid_config() {
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .max_connections(0)
        .build();

    let result = Server::bind(config, Arc::new(Engine::new()));
    assert!(matches!(result, Err(DbError::Config(_))));
}

#[test]
fn test_bind_rejects_bulk_limit_above_frame_limit() {
    let limits = Limits {
        max_bulk_len: 2048,
        max_frame_len: 1024,
        ..Limits::default()
    };
    let config = Config::builder()
        .listen_addr("127.0.0.1:0")
        .limits(limits)
        .build();

    let result = Server::bind(config, Arc::new(Engine::new()));
    assert!(matches!(result, Err(DbError::Config(_))));
}
