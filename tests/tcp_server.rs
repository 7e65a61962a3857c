use iris::{Error, Protocol, Server, Termination};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn start_tcp_server() -> (Server, u16) {
    let mut server = Server::new(Protocol::Tcp);
    server
        .start(Some("127.0.0.1"), "0", 10)
        .expect("start server");
    let addrs = server.local_addrs();
    assert!(!addrs.is_empty(), "server must own at least one listening socket");
    (server, addrs[0].port())
}

#[test]
fn client_is_delivered_with_its_data() {
    init_logs();
    let (mut server, port) = start_tcp_server();

    let sender = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        stream.write_all(b"ping").expect("write");
        let mut reply = [0u8; 4];
        stream.read_exact(&mut reply).expect("read reply");
        reply
    });

    let mut client = server.get_client().expect("get_client");
    assert!(client.socket().is_some());
    assert!(client.peer_addr().is_some());

    let mut buf = [0u8; 4];
    let n = server.receive_data(&mut buf, &client).expect("receive");
    assert_eq!(&buf[..n], b"ping");

    assert_eq!(server.send_data(b"pong", &client).expect("send"), 4);
    assert_eq!(&sender.join().unwrap(), b"pong");

    client.detach().expect("detach");
    server.stop().expect("stop");
}

#[test]
fn accept_alone_does_not_deliver() {
    init_logs();
    let (mut server, port) = start_tcp_server();

    let sender = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        // Hold the accepted connection open without data for a while.
        thread::sleep(Duration::from_millis(400));
        stream.write_all(b"x").expect("write");
        stream
    });

    let waited = Instant::now();
    let mut client = server.get_client().expect("get_client");
    assert!(
        waited.elapsed() >= Duration::from_millis(200),
        "delivery must wait for first data, not for the accept"
    );

    let mut buf = [0u8; 1];
    let n = server.receive_data(&mut buf, &client).expect("receive");
    assert_eq!(&buf[..n], b"x");

    drop(sender.join().unwrap());
    client.detach().expect("detach");
    server.stop().expect("stop");
}

#[test]
fn single_byte_round_trip() {
    init_logs();
    let (mut server, port) = start_tcp_server();

    let sender = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        stream.write_all(b"z").expect("write");
        stream
    });

    let mut client = server.get_client().expect("get_client");
    let mut buf = [0u8; 1];
    assert_eq!(server.receive_data(&mut buf, &client).expect("receive"), 1);
    assert_eq!(&buf, b"z");

    drop(sender.join().unwrap());
    client.detach().expect("detach");
    server.stop().expect("stop");
}

#[test]
fn receive_stops_at_nul_only_when_asked() {
    init_logs();
    let (mut server, port) = start_tcp_server();
    server.set_termination(Termination::UntilNul);

    let sender = thread::spawn(move || {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        stream.write_all(b"abc\0").expect("write");
        thread::sleep(Duration::from_millis(300));
        stream.write_all(b"xyz").expect("write late bytes");
        stream
    });

    let mut client = server.get_client().expect("get_client");
    let mut buf = [0u8; 16];
    let n = server.receive_data(&mut buf, &client).expect("receive");
    assert_eq!(&buf[..n], b"abc\0", "the NUL must end the read short of a full buffer");

    drop(sender.join().unwrap());
    client.detach().expect("detach");
    server.stop().expect("stop");
}

#[test]
fn stop_twice_is_clean() {
    init_logs();
    let (mut server, _port) = start_tcp_server();
    assert_eq!(server.local_addrs().len(), 1);

    server.stop().expect("first stop");
    assert!(server.local_addrs().is_empty());
    server.stop().expect("second stop is a no-op");
}

#[test]
fn server_restarts_after_stop() {
    init_logs();
    let (mut server, _port) = start_tcp_server();
    server.stop().expect("stop");

    server
        .start(Some("127.0.0.1"), "0", 10)
        .expect("restart server");
    let addrs = server.local_addrs();
    assert_eq!(addrs.len(), 1);
    assert_ne!(addrs[0].port(), 0);
    server.stop().expect("stop again");
}

#[test]
fn start_rejects_nonpositive_backlog() {
    let mut server = Server::new(Protocol::Tcp);
    let err = server.start(Some("127.0.0.1"), "0", 0).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn get_client_requires_start() {
    let mut server = Server::new(Protocol::Tcp);
    let err = server.get_client().unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn start_twice_is_rejected() {
    let (mut server, _port) = start_tcp_server();
    let err = server.start(Some("127.0.0.1"), "0", 10).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    server.stop().expect("stop");
}
