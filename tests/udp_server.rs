use iris::{Client, Protocol, Server, UDP_PAYLOAD_MAX};
use std::net::UdpSocket;
use std::thread;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn start_udp_server() -> (Server, u16) {
    let mut server = Server::new(Protocol::Udp);
    server
        .start(Some("127.0.0.1"), "0", 0)
        .expect("start server");
    let addrs = server.local_addrs();
    assert!(!addrs.is_empty(), "server must own at least one bound socket");
    (server, addrs[0].port())
}

#[test]
fn peek_leaves_the_datagram_readable() {
    init_logs();
    let (mut server, port) = start_udp_server();

    let sender = UdpSocket::bind("127.0.0.1:0").expect("bind sender");
    sender.send_to(b"hello", ("127.0.0.1", port)).expect("send");

    let client = server.get_client().expect("get_client");
    assert!(client.socket().is_none(), "udp handles are address-only");
    assert_eq!(
        client.peer_addr().expect("peer addr"),
        sender.local_addr().expect("sender addr")
    );

    // Discovering the peer must not have consumed the payload.
    let mut buf = [0u8; 32];
    let n = server.receive_data(&mut buf, &client).expect("receive");
    assert_eq!(&buf[..n], b"hello");

    server.stop().expect("stop");
}

#[test]
fn exact_chunk_datagram_arrives_whole() {
    init_logs();
    let (mut server, port) = start_udp_server();

    let payload = vec![7u8; UDP_PAYLOAD_MAX];
    let sent_payload = payload.clone();
    let sender = thread::spawn(move || {
        let mut client = Client::new(Protocol::Udp);
        client
            .attach("127.0.0.1", &port.to_string())
            .expect("attach");
        assert_eq!(client.send_data(&sent_payload).expect("send"), UDP_PAYLOAD_MAX);
        client.detach().expect("detach");
    });

    let client = server.get_client().expect("get_client");
    let mut buf = vec![0u8; UDP_PAYLOAD_MAX];
    let n = server.receive_data(&mut buf, &client).expect("receive");
    assert_eq!(n, UDP_PAYLOAD_MAX);
    assert_eq!(buf, payload);

    sender.join().unwrap();
    server.stop().expect("stop");
}

#[test]
fn chunked_round_trip_reassembles() {
    init_logs();
    let (mut server, port) = start_udp_server();

    let payload: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
    let expected = payload.clone();

    let handle = thread::spawn(move || {
        let mut client = Client::new(Protocol::Udp);
        client
            .attach("127.0.0.1", &port.to_string())
            .expect("attach");
        assert_eq!(client.send_data(&payload).expect("send"), payload.len());

        let mut reply = [0u8; 8];
        let n = client.receive_data(&mut reply).expect("receive reply");
        assert_eq!(&reply[..n], b"done");
        client.detach().expect("detach");
    });

    let client = server.get_client().expect("get_client");
    let mut received = Vec::new();
    while received.len() < expected.len() {
        let mut chunk = [0u8; UDP_PAYLOAD_MAX];
        let n = server.receive_data(&mut chunk, &client).expect("receive chunk");
        assert!(n > 0, "no datagram arrived within the receive timeout");
        received.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(received, expected);

    server.send_data(b"done", &client).expect("send reply");
    handle.join().unwrap();
    server.stop().expect("stop");
}
