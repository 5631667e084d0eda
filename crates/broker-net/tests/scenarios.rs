use std::io::{Read, Write};
use std::net::{TcpStream, UdpSocket};
use std::time::Duration;

use broker_net::Dispatcher;
use broker_wire::{FRAME_LEN, Payload, decode_publish, encode_publish, OriginAddr, PublishFrame, Topic, PayloadText};

fn spawn_broker(port: u16) {
    let mut dispatcher = Dispatcher::bind(port).expect("dispatcher binds");
    std::thread::spawn(move || {
        let _ = dispatcher.run();
    });
    std::thread::sleep(Duration::from_millis(50));
}

fn connect(port: u16, identity: &str) -> TcpStream {
    let stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut w = stream.try_clone().unwrap();
    w.write_all(format!("{identity}\n").as_bytes()).unwrap();
    stream
}

fn send_command(stream: &mut TcpStream, line: &str) {
    stream.write_all(format!("{line}\n").as_bytes()).unwrap();
}

fn read_frame(stream: &mut TcpStream) -> PublishFrame {
    let mut buf = [0u8; FRAME_LEN];
    stream.read_exact(&mut buf).expect("frame read");
    decode_publish(&buf).expect("valid frame")
}

fn expect_no_frame(stream: &mut TcpStream) {
    stream.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let mut buf = [0u8; FRAME_LEN];
    let result = stream.read_exact(&mut buf);
    assert!(result.is_err(), "expected no frame, got one");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
}

fn publish_udp(port: u16, frame: &PublishFrame) {
    let udp = UdpSocket::bind("127.0.0.1:0").unwrap();
    let bytes = encode_publish(frame);
    udp.send_to(&bytes, ("127.0.0.1", port)).unwrap();
    std::thread::sleep(Duration::from_millis(50));
}

#[test]
fn s1_basic_pub_sub() {
    let port = 17101;
    spawn_broker(port);

    let mut a = connect(port, "a");
    send_command(&mut a, "subscribe temp 0");
    let reply = read_frame(&mut a);
    assert_eq!(reply.payload, Payload::Reply(PayloadText::from_str_truncate("Subscribed to topic.\n")));

    let frame = PublishFrame {
        topic: Topic::from_str_truncate("temp"),
        payload: Payload::Int { negative: false, magnitude: 42 },
        origin_addr: OriginAddr::from_socket_addr("10.0.0.1:5000".parse().unwrap()),
    };
    publish_udp(port, &frame);

    let received = read_frame(&mut a);
    assert_eq!(broker_wire::render(&received), "10.0.0.1:5000 - temp - INT - 42");
}

#[test]
fn s2_sf_replay_on_reconnect() {
    let port = 17102;
    spawn_broker(port);

    let mut a = connect(port, "a");
    send_command(&mut a, "subscribe alerts 1");
    let _ = read_frame(&mut a);
    drop(a);
    std::thread::sleep(Duration::from_millis(50));

    let first = PublishFrame {
        topic: Topic::from_str_truncate("alerts"),
        payload: Payload::Float { negative: true, magnitude: 12345, power: 2 },
        origin_addr: OriginAddr::from_socket_addr("127.0.0.1:1".parse().unwrap()),
    };
    let second = PublishFrame {
        topic: Topic::from_str_truncate("alerts"),
        payload: Payload::Float { negative: false, magnitude: 7, power: 0 },
        origin_addr: OriginAddr::from_socket_addr("127.0.0.1:1".parse().unwrap()),
    };
    publish_udp(port, &first);
    publish_udp(port, &second);

    let mut a2 = connect(port, "a");
    let received_first = read_frame(&mut a2);
    let received_second = read_frame(&mut a2);
    assert!(broker_wire::render(&received_first).ends_with("FLOAT - -123.45"));
    assert!(broker_wire::render(&received_second).ends_with("FLOAT - 7.00"));
    expect_no_frame(&mut a2);
}

#[test]
fn s3_non_sf_disconnect_drops_missed_publications() {
    let port = 17103;
    spawn_broker(port);

    let mut b = connect(port, "b");
    send_command(&mut b, "subscribe news 0");
    let _ = read_frame(&mut b);
    drop(b);
    std::thread::sleep(Duration::from_millis(50));

    for i in 0..3 {
        let frame = PublishFrame {
            topic: Topic::from_str_truncate("news"),
            payload: Payload::String(PayloadText::from_str_truncate(&format!("msg{i}"))),
            origin_addr: OriginAddr::from_socket_addr("127.0.0.1:1".parse().unwrap()),
        };
        publish_udp(port, &frame);
    }

    let mut b2 = connect(port, "b");
    expect_no_frame(&mut b2);
}

#[test]
fn s4_duplicate_identity_is_rejected() {
    let port = 17104;
    spawn_broker(port);

    let mut a = connect(port, "a");
    let mut dup = connect(port, "a");

    let reply = read_frame(&mut dup);
    assert_eq!(reply.payload, Payload::Reply(PayloadText::from_str_truncate(broker_wire::ERR_SAME_ID)));

    // the original session is unaffected
    send_command(&mut a, "subscribe t 0");
    let ack = read_frame(&mut a);
    assert_eq!(ack.payload, Payload::Reply(PayloadText::from_str_truncate("Subscribed to topic.\n")));
}

#[test]
fn s5_unsubscribe_stops_delivery() {
    let port = 17105;
    spawn_broker(port);

    let mut a = connect(port, "a");
    send_command(&mut a, "subscribe t 1");
    let _ = read_frame(&mut a);

    let frame = PublishFrame {
        topic: Topic::from_str_truncate("t"),
        payload: Payload::Int { negative: false, magnitude: 1 },
        origin_addr: OriginAddr::from_socket_addr("127.0.0.1:1".parse().unwrap()),
    };
    publish_udp(port, &frame);
    let _ = read_frame(&mut a);

    send_command(&mut a, "unsubscribe t");
    let reply = read_frame(&mut a);
    assert_eq!(reply.payload, Payload::Reply(PayloadText::from_str_truncate("Unsubscribed from topic.\n")));

    publish_udp(port, &frame);
    expect_no_frame(&mut a);
}
