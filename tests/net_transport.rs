//! TCP transport tests over loopback.

#[macro_use]
mod common;

use chainio::error::ErrorKind;
use chainio::io::{pump, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, SyncRead};
use chainio::lab::MemorySink;
use chainio::runtime::{block_on, Scheduler, Task};
use chainio::sys::{Listener, Socket};
use common::*;
use std::cell::RefCell;
use std::net::{Shutdown, SocketAddr};
use std::time::Duration;

fn connected_pair() -> (Socket, Socket) {
    let listener = Listener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();
    let port = listener.local_addr().unwrap().port();
    let client = Socket::connect("127.0.0.1", port).unwrap();
    let (server, peer) = listener.accept().unwrap();
    assert_eq!(peer, client.local_addr().unwrap());
    (client, server)
}

/// Closes `socket` with an RST instead of a FIN.
fn reset(socket: Socket) {
    socket2::SockRef::from(socket.as_std())
        .set_linger(Some(Duration::ZERO))
        .unwrap();
    drop(socket);
}

#[test]
fn peer_reset_is_end_of_stream_for_async_calls() {
    init_test("peer_reset_is_end_of_stream_for_async_calls");
    let (mut client, server) = connected_pair();
    reset(server);

    let (read, write) = block_on(Task::new(async {
        let mut buf = [0u8; 64];
        let read = client.read_async_into(&mut buf).await?;
        let write = client.write_async_from(b"anyone there?").await?;
        Ok((read, write))
    }))
    .unwrap();
    assert_with_log!(read.is_end_of_stream(), "read after reset", true, read);
    assert_eq!(read.bytes(), 0);
    assert_with_log!(write.is_end_of_stream(), "write after reset", true, write);
    assert_eq!(write.bytes(), 0);
    test_complete!("peer_reset_is_end_of_stream_for_async_calls");
}

#[test]
fn peer_reset_is_an_error_for_blocking_calls() {
    init_test("peer_reset_is_an_error_for_blocking_calls");
    let (mut client, server) = connected_pair();
    reset(server);

    let err = client.read_into(&mut [0u8; 16]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(
        err.io_error().map(std::io::Error::kind),
        Some(std::io::ErrorKind::ConnectionReset)
    );
    test_complete!("peer_reset_is_an_error_for_blocking_calls");
}

#[test]
fn full_read_across_a_reset_is_premature() {
    init_test("full_read_across_a_reset_is_premature");
    let (mut client, server) = connected_pair();
    reset(server);

    let err = block_on(Task::new(async {
        client.read_async(32, true).await.map(|_| ())
    }))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PrematureEof);
    test_complete!("full_read_across_a_reset_is_premature");
}

#[test]
fn pump_between_two_chains_over_tcp() {
    init_test("pump_between_two_chains_over_tcp");
    let listener = Socket::listen(0).unwrap();
    let port = listener.local_addr().unwrap().port();
    let payload: Vec<u8> = (0..300_000u32).map(|i| (i % 241) as u8).collect();
    let received = RefCell::new(MemorySink::new());

    let server = Task::new(async {
        let (mut conn, _) = listener.accept_async().await?;
        let mut sink = received.borrow_mut();
        let moved = pump(&mut conn, &mut *sink, 4096).await?;
        conn.write_async_full_from(&moved.to_be_bytes()).await?;
        Ok(())
    });
    let client = Task::new(async {
        let mut conn = Socket::connect("127.0.0.1", port)?;
        conn.write_async_full_from(&payload).await?;
        conn.shutdown(Shutdown::Write)?;
        let reply = conn.read_async(8, true).await?;
        let mut count = [0u8; 8];
        count.copy_from_slice(reply.value());
        assert_eq!(u64::from_be_bytes(count), payload.len() as u64);
        Ok(())
    });

    let mut scheduler = Scheduler::new([server, client]).unwrap();
    scheduler.run().unwrap();
    for (i, result) in scheduler.take_results().into_iter().enumerate() {
        let result = result.unwrap();
        assert!(result.is_ok(), "root {i} failed: {result:?}");
    }
    drop(scheduler);
    assert_eq!(received.borrow().contents(), payload.as_slice());
    test_complete!("pump_between_two_chains_over_tcp", bytes = payload.len());
}
