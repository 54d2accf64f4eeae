//! Integration tests for the transport adapters.
//!
//! These drive both adapters over loopback TCP and in-memory duplex pipes
//! and check ordering, retention of partial frames and shutdown sequencing.

#![cfg(all(feature = "evented", feature = "blocking"))]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use stream_conduit::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
use tokio::net::TcpListener;

/// Shared record of everything an engine was shown and consumed.
#[derive(Clone, Default)]
struct Journal {
    feeds: Arc<Mutex<Vec<Vec<u8>>>>,
    consumed: Arc<Mutex<Vec<u8>>>,
}

impl Journal {
    fn feeds(&self) -> Vec<Vec<u8>> {
        self.feeds.lock().unwrap().clone()
    }

    fn consumed(&self) -> Vec<u8> {
        self.consumed.lock().unwrap().clone()
    }
}

/// Consumes a scripted number of bytes per call and acknowledges each feed
/// with a single `k` so the peer can pace its writes.
struct ScriptedEngine {
    plan: Vec<usize>,
    journal: Journal,
}

impl ProtocolEngine for ScriptedEngine {
    fn feed(&mut self, data: &[u8], handler: &mut dyn ConnectionHandler) -> usize {
        self.journal.feeds.lock().unwrap().push(data.to_vec());
        let take = if self.plan.is_empty() {
            data.len()
        } else {
            self.plan.remove(0).min(data.len())
        };
        self.journal
            .consumed
            .lock()
            .unwrap()
            .extend_from_slice(&data[..take]);
        handler.on_outbound_ready(b"k");
        take
    }
}

/// Consumes every complete `\n`-terminated line; `quit` closes the session.
struct LineEngine {
    journal: Journal,
}

impl ProtocolEngine for LineEngine {
    fn feed(&mut self, data: &[u8], handler: &mut dyn ConnectionHandler) -> usize {
        self.journal.feeds.lock().unwrap().push(data.to_vec());
        let mut consumed = 0;
        while let Some(pos) = data[consumed..].iter().position(|&b| b == b'\n') {
            let line = &data[consumed..consumed + pos + 1];
            if line == b"quit\n" {
                handler.on_session_closed();
            }
            self.journal.consumed.lock().unwrap().extend_from_slice(line);
            consumed += pos + 1;
        }
        consumed
    }
}

fn message() -> Vec<u8> {
    (0..40)
        .map(|i| format!("line {i} with some padding\n"))
        .collect::<String>()
        .into_bytes()
}

#[tokio::test]
async fn test_partial_frame_survives_between_reads() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let journal = Journal::default();
    let engine = ScriptedEngine {
        plan: vec![1, 4],
        journal: journal.clone(),
    };
    let (mut transport, _events) =
        EventedTransport::new(engine, TransportConfig::default()).unwrap();
    transport
        .connect(&addr.ip().to_string(), addr.port())
        .await
        .unwrap();
    let handle = transport.handle();
    let task = transport.spawn();

    let (mut peer, _) = listener.accept().await.unwrap();
    let mut ack = [0u8; 1];

    peer.write_all(b"AB").await.unwrap();
    peer.read_exact(&mut ack).await.unwrap();
    peer.write_all(b"CDE").await.unwrap();
    peer.read_exact(&mut ack).await.unwrap();

    handle.request_close().unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(journal.feeds(), vec![b"AB".to_vec(), b"BCDE".to_vec()]);
    assert_eq!(journal.consumed(), b"ABCDE");
}

#[tokio::test]
async fn test_pre_connect_output_is_sent_first() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // AMQP 0-9-1 protocol header, queued before the socket exists
    let header = hex::decode("414d515000000901").unwrap();

    let engine = LineEngine {
        journal: Journal::default(),
    };
    let (mut transport, mut events) =
        EventedTransport::new(engine, TransportConfig::default()).unwrap();
    transport.submit_outbound(&header).unwrap();
    assert_eq!(transport.phase(), ConnectionPhase::Connecting);

    transport.connect("127.0.0.1", addr.port()).await.unwrap();
    assert!(transport.is_connected());
    assert_eq!(transport.peer_addr(), Some(addr));
    let task = transport.spawn();

    let (mut peer, _) = listener.accept().await.unwrap();
    let mut received = vec![0u8; header.len()];
    peer.read_exact(&mut received).await.unwrap();
    assert_eq!(received, header);

    peer.write_all(b"quit\n").await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(events.recv().await, Some(TransportEvent::Connected));
    assert_eq!(events.recv().await, Some(TransportEvent::Closed));
}

#[tokio::test]
async fn test_connect_failure_reported_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let engine = LineEngine {
        journal: Journal::default(),
    };
    let (mut transport, mut events) =
        EventedTransport::new(engine, TransportConfig::default()).unwrap();
    let err = transport.connect("127.0.0.1", port).await.unwrap_err();

    assert!(err.is_connect_error());
    assert_eq!(transport.phase(), ConnectionPhase::Failed);
    assert!(events.try_recv().is_none());
    assert!(matches!(
        transport.submit_outbound(b"late"),
        Err(TransportError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_outbound_order_is_preserved() {
    let (local, mut remote) = duplex(4);
    let engine = LineEngine {
        journal: Journal::default(),
    };
    let (transport, _events) =
        EventedTransport::from_stream(local, engine, TransportConfig::default()).unwrap();
    let handle = transport.handle();
    let task = transport.spawn();

    // With a 4-byte pipe "W" is still being written when the rest arrive
    handle.submit(vec![b'W'; 16]).unwrap();
    handle.submit(&b"X"[..]).unwrap();
    handle
        .with_engine(|_engine, handler| handler.on_outbound_ready(b"Y"))
        .unwrap();
    handle.submit(&b"Z"[..]).unwrap();
    handle.request_close().unwrap();

    let mut received = Vec::new();
    remote.read_to_end(&mut received).await.unwrap();

    let mut expected = vec![b'W'; 16];
    expected.extend_from_slice(b"XYZ");
    assert_eq!(received, expected);
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_close_waits_for_in_flight_write() {
    let (local, mut remote) = duplex(64);
    let engine = LineEngine {
        journal: Journal::default(),
    };
    let (transport, mut events) =
        EventedTransport::from_stream(local, engine, TransportConfig::default()).unwrap();
    let handle = transport.handle();
    let task = transport.spawn();

    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    handle.submit(payload.clone()).unwrap();
    handle.request_close().unwrap();

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    // The pipe is full and nobody has read it, so the write is still pending
    assert_eq!(events.try_recv(), Some(TransportEvent::Connected));
    assert_eq!(events.try_recv(), None);
    assert!(!task.is_finished());

    let mut received = Vec::new();
    remote.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, payload);

    task.await.unwrap().unwrap();
    assert_eq!(events.recv().await, Some(TransportEvent::Closed));
}

#[tokio::test]
async fn test_read_failure_reports_one_event() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let journal = Journal::default();
    let engine = LineEngine {
        journal: journal.clone(),
    };
    let (mut transport, mut events) =
        EventedTransport::new(engine, TransportConfig::default()).unwrap();
    transport.connect("127.0.0.1", addr.port()).await.unwrap();
    let task = transport.spawn();

    let (mut peer, _) = listener.accept().await.unwrap();
    peer.write_all(b"partial line without end").await.unwrap();
    drop(peer);

    assert!(task.await.unwrap().is_err());

    let mut terminal = 0;
    while let Some(event) = events.recv().await {
        if event.is_terminal() {
            assert!(matches!(event, TransportEvent::Failed(_)));
            terminal += 1;
        }
    }
    assert_eq!(terminal, 1);
    assert!(journal.consumed().is_empty());
}

#[tokio::test]
async fn test_segmentation_does_not_change_content() {
    let input = message();
    let mut results = Vec::new();

    // A one-byte pipe forces one-byte reads; a large one allows whole-message reads
    for pipe in [1, 4096] {
        let (local, mut remote) = duplex(pipe);
        let journal = Journal::default();
        let engine = LineEngine {
            journal: journal.clone(),
        };
        let config = TransportConfig::builder()
            .scratch_read_size(64)
            .max_buffered(128)
            .build()
            .unwrap();
        let (transport, _events) = EventedTransport::from_stream(local, engine, config).unwrap();
        let task = transport.spawn();

        remote.write_all(&input).await.unwrap();
        remote.write_all(b"quit\n").await.unwrap();
        task.await.unwrap().unwrap();

        results.push(journal.consumed());
    }

    let mut expected = input.clone();
    expected.extend_from_slice(b"quit\n");
    assert_eq!(results[0], expected);
    assert_eq!(results[1], expected);
}

#[test]
fn test_blocking_over_tcp() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let input = message();
    let peer_input = input.clone();
    let peer = thread::spawn(move || {
        use std::io::Write;
        let (mut stream, _) = listener.accept().unwrap();
        for chunk in peer_input.chunks(7) {
            stream.write_all(chunk).unwrap();
        }
        stream.write_all(b"quit\n").unwrap();
        // Hold the socket open until the adapter has finished
        let mut sink = Vec::new();
        std::io::Read::read_to_end(&mut stream, &mut sink).unwrap();
        sink
    });

    let journal = Journal::default();
    let engine = LineEngine {
        journal: journal.clone(),
    };
    let config = TransportConfig::builder()
        .scratch_read_size(16)
        .max_buffered(64)
        .build()
        .unwrap();
    let mut transport = BlockingTransport::connect("127.0.0.1", port, engine, config).unwrap();
    transport.submit_outbound(b"hello\n").unwrap();

    assert_eq!(transport.run_loop().unwrap(), LoopExit::SessionClosed);
    assert_eq!(transport.phase(), ConnectionPhase::Closed);
    drop(transport);

    let mut expected = input;
    expected.extend_from_slice(b"quit\n");
    assert_eq!(journal.consumed(), expected);
    assert_eq!(peer.join().unwrap(), b"hello\n");
}

#[test]
fn test_blocking_quit_from_another_thread() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let peer = thread::spawn(move || listener.accept().unwrap());

    let engine = LineEngine {
        journal: Journal::default(),
    };
    let config = TransportConfig::builder()
        .quit_poll_interval(Duration::from_millis(20))
        .build()
        .unwrap();
    let mut transport = BlockingTransport::connect("127.0.0.1", port, engine, config).unwrap();
    let quit = transport.quit_handle();

    let worker = thread::spawn(move || transport.run_loop());
    thread::sleep(Duration::from_millis(50));
    quit.request_quit();

    assert_eq!(worker.join().unwrap().unwrap(), LoopExit::Quit);
    drop(peer.join().unwrap());
}

#[test]
fn test_blocking_connect_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let engine = LineEngine {
        journal: Journal::default(),
    };
    let result = BlockingTransport::connect("127.0.0.1", port, engine, TransportConfig::default());
    assert!(matches!(result, Err(ref e) if e.is_connect_error()));
}
