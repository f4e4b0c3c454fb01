//! RPC client cache under concurrency, plus the bundled HTTP transport.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use rosnode_core::config::RpcConfig;
use rosnode_core::rpc::{
    parse_rosrpc_uri, HttpRpcConnector, ParameterInvalid, RosRpcAddress, RpcClientCache,
    RpcError,
};
use rosnode_core::Node;

mod common;
use common::{fast_config, start_mock_endpoint, CountingConnector};

#[test]
fn test_concurrent_first_access_creates_once() {
    let cache = Arc::new(RpcClientCache::new(CountingConnector::default()));
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let (cache, barrier) = (Arc::clone(&cache), Arc::clone(&barrier));
            std::thread::spawn(move || {
                barrier.wait();
                cache.get_client("http://master:11311/").unwrap()
            })
        })
        .collect();
    let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(cache.connector().built.load(Ordering::SeqCst), 1);
    assert!(clients.iter().all(|c| c.same_client(&clients[0])));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_calls_through_one_handle_are_serialised() {
    let cache = Arc::new(RpcClientCache::new(CountingConnector::default()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                let client = cache.get_client("http://svc:1/").unwrap();
                client.call(|c| c.work(Duration::from_millis(20)));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let client = cache.get_client("http://svc:1/").unwrap();
    assert_eq!(client.call(|c| c.max_in_flight.load(Ordering::SeqCst)), 1);
}

#[test]
fn test_different_uris_do_not_contend() {
    let cache = Arc::new(RpcClientCache::new(CountingConnector::default()));
    let barrier = Arc::new(Barrier::new(2));
    // Warm both entries so creation time is not measured.
    cache.get_client("http://a:1/").unwrap();
    cache.get_client("http://b:1/").unwrap();

    let started = Instant::now();
    let handles: Vec<_> = ["http://a:1/", "http://b:1/"]
        .into_iter()
        .map(|uri| {
            let (cache, barrier) = (Arc::clone(&cache), Arc::clone(&barrier));
            std::thread::spawn(move || {
                let client = cache.get_client(uri).unwrap();
                client.call(|c| {
                    barrier.wait();
                    c.work(Duration::from_millis(200));
                });
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Both calls held their own lock at the barrier at the same time.
    assert!(started.elapsed() < Duration::from_millis(390));
}

#[test]
fn test_uncached_and_invalid_lookups() {
    let cache = RpcClientCache::new(CountingConnector::default());
    let cached = cache.get_client("http://a:1/").unwrap();
    let fresh = cache.get_client_with("http://a:1/", false).unwrap();
    assert!(cached.is_cached());
    assert!(!fresh.is_cached());
    assert_ne!(cached.call(|c| c.serial), fresh.call(|c| c.serial));

    assert!(cache.get_client("not-a-uri").is_none());
    assert!(cache.get_client("http://").is_none());
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_http_transport_round_trip() {
    let addr = start_mock_endpoint(200, "<methodResponse/>");
    let mut config = fast_config();
    config.node.master_uri = Some(format!("http://{}/", addr));
    let node = Node::new(config).unwrap();

    let master = node.master().unwrap();
    let reply = master.call(|client| client.post("<methodCall/>")).unwrap();
    assert_eq!(reply, "<methodResponse/>");
    assert!(node.master().unwrap().same_client(&master));
}

#[test]
fn test_http_transport_rejects_error_status() {
    let addr = start_mock_endpoint(500, "boom");
    let connector = HttpRpcConnector::new(&RpcConfig {
        request_timeout_secs: 2,
    })
    .unwrap();
    let cache = RpcClientCache::new(connector);
    let uri = format!("http://{}/", addr);

    let client = cache.get_client(&uri).unwrap();
    match client.call(|c| c.post("<methodCall/>")) {
        Err(RpcError::Status { status, uri: failed }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(failed, uri);
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[test]
fn test_rosrpc_addresses() {
    assert_eq!(
        parse_rosrpc_uri("rosrpc://host:9090").unwrap(),
        RosRpcAddress::Tcp {
            host: "host".into(),
            port: 9090
        }
    );
    assert_eq!(
        parse_rosrpc_uri("rosrpc://somepath").unwrap(),
        RosRpcAddress::Local("somepath".into())
    );
    assert!(matches!(
        parse_rosrpc_uri("http://host:9090"),
        Err(ParameterInvalid::Protocol(_))
    ));
    assert!(matches!(
        parse_rosrpc_uri("rosrpc://host:notaport"),
        Err(ParameterInvalid::Malformed(_))
    ));
}
