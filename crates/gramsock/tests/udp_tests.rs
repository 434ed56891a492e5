//! Tests for UDP socket functionality against the system driver.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use gramsock::{
    AddressFamily, Datagram, Endpoint, SocketError, SocketState, UdpSocket, UdpSocketConfig,
};

fn localhost() -> IpAddr {
    "127.0.0.1".parse().unwrap()
}

#[test]
fn test_config_builder() {
    let config = UdpSocketConfig::udp4()
        .with_reuse_address(true)
        .with_reuse_port(true);

    assert_eq!(config.family, AddressFamily::Ipv4);
    assert!(config.reuse_address);
    assert!(config.reuse_port);

    let config = UdpSocketConfig::udp6();
    assert_eq!(config.family, AddressFamily::Ipv6);
    assert!(!config.reuse_address);
}

#[test]
fn test_socket_initial_state() {
    let socket = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    assert_eq!(socket.state(), SocketState::Unbound);
    assert!(!socket.is_bound());

    let local = socket.local_addr();
    assert_eq!(local.address.to_string(), "0.0.0.0");
    assert_eq!(local.port, 0);
}

#[test]
fn test_socket_state_display() {
    assert_eq!(SocketState::Unbound.to_string(), "unbound");
    assert_eq!(SocketState::Bound.to_string(), "bound");
    assert_eq!(SocketState::Closed.to_string(), "closed");
}

#[test]
fn test_datagram_creation() {
    let data = vec![1, 2, 3, 4];
    let source = Endpoint::new("192.168.1.100".parse().unwrap(), 5000);
    let datagram = Datagram::new(data.clone(), source);

    assert_eq!(datagram.data, data);
    assert_eq!(datagram.source, source);
    assert_eq!(datagram.source.family, AddressFamily::Ipv4);
}

#[tokio::test]
async fn test_bind_ephemeral_port() {
    let socket = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    let listening = Arc::new(AtomicBool::new(false));
    let listening_clone = listening.clone();
    socket.events.listening.connect(move |_| {
        listening_clone.store(true, Ordering::SeqCst);
    });

    socket.bind_to(localhost(), 0).unwrap();
    assert!(socket.is_bound());

    // `listening` arrives from the receive loop.
    for _ in 0..100 {
        if listening.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(listening.load(Ordering::SeqCst));

    // Port 0 asks the platform for an ephemeral port; the bound address
    // must report the concrete choice.
    let local = socket.local_addr();
    assert_eq!(local.address, localhost());
    assert_ne!(local.port, 0);

    socket.close();
}

#[tokio::test]
async fn test_double_bind_fails() {
    let socket = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    socket.bind_to(localhost(), 0).unwrap();
    let first = socket.local_addr();

    assert_eq!(socket.bind_to(localhost(), 0), Err(SocketError::AlreadyBound));
    assert_eq!(socket.local_addr(), first);

    socket.close();
}

#[tokio::test]
async fn test_double_close_single_event() {
    let socket = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    let closed_count = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));

    let closed_clone = closed_count.clone();
    socket.events.closed.connect(move |_| {
        closed_clone.fetch_add(1, Ordering::SeqCst);
    });
    let errors_clone = errors.clone();
    socket.events.error.connect(move |_| {
        errors_clone.fetch_add(1, Ordering::SeqCst);
    });

    socket.bind_to(localhost(), 0).unwrap();
    socket.close();
    socket.close();
    assert_eq!(socket.state(), SocketState::Closed);

    for _ in 0..100 {
        if closed_count.load(Ordering::SeqCst) >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(closed_count.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_send_receive() {
    let sender = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();
    sender.bind_to(localhost(), 0).unwrap();
    let sender_addr = sender.local_addr();

    let receiver = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    let received_data: Arc<parking_lot::Mutex<Vec<u8>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_data_clone = received_data.clone();

    let received_from: Arc<parking_lot::Mutex<Option<Endpoint>>> =
        Arc::new(parking_lot::Mutex::new(None));
    let received_from_clone = received_from.clone();

    receiver.events.message.connect(move |datagram| {
        *received_data_clone.lock() = datagram.data.clone();
        *received_from_clone.lock() = Some(datagram.source);
    });

    receiver.bind_to(localhost(), 0).unwrap();
    let receiver_addr = receiver.local_addr();

    sender
        .send_to(b"hello", receiver_addr.address, receiver_addr.port)
        .unwrap();

    // Wait for receive
    for _ in 0..100 {
        if !received_data.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let data = received_data.lock().clone();
    assert_eq!(data, b"hello");
    assert_eq!(data.len(), 5);

    let from = received_from.lock().unwrap();
    assert_eq!(from, sender_addr);

    // Cleanup
    sender.close();
    receiver.close();
}

#[tokio::test]
async fn test_bidirectional_communication() {
    let socket1 = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();
    let socket2 = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    let received1: Arc<parking_lot::Mutex<Vec<u8>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received1_clone = received1.clone();

    let received2: Arc<parking_lot::Mutex<Vec<u8>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received2_clone = received2.clone();

    socket1.events.message.connect(move |datagram| {
        received1_clone.lock().extend(&datagram.data);
    });

    socket2.events.message.connect(move |datagram| {
        received2_clone.lock().extend(&datagram.data);
    });

    socket1.bind_to(localhost(), 0).unwrap();
    socket2.bind_to(localhost(), 0).unwrap();

    let addr1 = socket1.local_addr();
    let addr2 = socket2.local_addr();

    socket1
        .send_to(b"From socket 1", addr2.address, addr2.port)
        .unwrap();
    socket2
        .send_to(b"From socket 2", addr1.address, addr1.port)
        .unwrap();

    // Wait for both to receive
    for _ in 0..100 {
        let r1 = !received1.lock().is_empty();
        let r2 = !received2.lock().is_empty();
        if r1 && r2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(&*received1.lock(), b"From socket 2");
    assert_eq!(&*received2.lock(), b"From socket 1");

    socket1.close();
    socket2.close();
}

#[tokio::test]
async fn test_no_events_after_close() {
    let receiver = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    let messages = Arc::new(AtomicUsize::new(0));
    let messages_clone = messages.clone();
    receiver.events.message.connect(move |_| {
        messages_clone.fetch_add(1, Ordering::SeqCst);
    });

    receiver.bind_to(localhost(), 0).unwrap();
    let receiver_addr = receiver.local_addr();
    receiver.close();

    let sender = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();
    sender.bind_to(localhost(), 0).unwrap();
    let _ = sender.send_to(b"too late", receiver_addr.address, receiver_addr.port);

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(messages.load(Ordering::SeqCst), 0);

    sender.close();
}

#[tokio::test]
async fn test_closed_socket_rejects_operations() {
    let socket = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();
    socket.bind_to(localhost(), 0).unwrap();
    socket.close();

    assert_eq!(socket.bind(0), Err(SocketError::AlreadyBound));
    assert!(socket.send_to(b"x", localhost(), 9999).is_err());
    assert!(socket.set_broadcast(true).is_err());
    assert_eq!(socket.state(), SocketState::Closed);
}

#[cfg(unix)]
#[tokio::test]
async fn test_reuse_port_pair() {
    let config = UdpSocketConfig::udp4()
        .with_reuse_address(true)
        .with_reuse_port(true);

    let first = UdpSocket::new(config.clone()).unwrap();
    first.bind_to(localhost(), 0).unwrap();
    let port = first.local_addr().port;

    // With both reuse flags set, a second socket can share the port.
    let second = UdpSocket::new(config).unwrap();
    second.bind_to(localhost(), port).unwrap();
    assert_eq!(second.local_addr().port, port);

    first.close();
    second.close();
}

#[tokio::test]
async fn test_multicast_membership() {
    let socket = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();
    socket.bind(0).unwrap();

    let group: IpAddr = "239.255.0.1".parse().unwrap();

    // Joining depends on the environment's multicast routes; if the join
    // succeeds, the matching leave must too.
    if socket.add_membership(group, None).is_ok() {
        socket.drop_membership(group, None).unwrap();
    }

    socket.close();
}

#[tokio::test]
async fn test_membership_drop_stops_delivery() {
    let group: IpAddr = "239.255.0.1".parse().unwrap();

    let receiver = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    receiver.events.message.connect(move |_| {
        count_clone.fetch_add(1, Ordering::SeqCst);
    });
    receiver.bind(0).unwrap();
    let port = receiver.local_addr().port;

    // Join, routing, and loopback delivery all depend on the
    // environment; skip whichever is missing.
    if receiver.add_membership(group, None).is_err() {
        return;
    }

    let sender = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();
    if sender.set_multicast_loopback(true).is_err()
        || sender.send_to(b"while joined", group, port).is_err()
    {
        return;
    }

    let mut delivered = false;
    for _ in 0..100 {
        if count.load(Ordering::SeqCst) >= 1 {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    if !delivered {
        return;
    }

    // After the leave, a datagram to the group must not arrive.
    let joined_count = count.load(Ordering::SeqCst);
    receiver.drop_membership(group, None).unwrap();
    sender.send_to(b"after drop", group, port).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(count.load(Ordering::SeqCst), joined_count);

    sender.close();
    receiver.close();
}

#[test]
fn test_recv_buffer_size() {
    let socket = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    socket.set_recv_buffer_size(65536).unwrap();

    // Kernels may round up (Linux doubles the request), never down.
    let size = socket.recv_buffer_size().unwrap();
    assert!(size >= 65536, "got {}", size);
}

#[test]
fn test_send_buffer_size() {
    let socket = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    socket.set_send_buffer_size(65536).unwrap();
    let size = socket.send_buffer_size().unwrap();
    assert!(size >= 65536, "got {}", size);
}

#[test]
fn test_broadcast_and_ttl_options() {
    let socket = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    socket.set_broadcast(true).unwrap();
    socket.set_ttl(64).unwrap();
    socket.set_multicast_ttl(4).unwrap();
    socket.set_multicast_loopback(true).unwrap();
}

#[test]
fn test_send_rejects_wrong_family() {
    let socket = UdpSocket::new(UdpSocketConfig::udp4()).unwrap();

    let result = socket.send_to(b"x", "::1".parse().unwrap(), 9999);
    assert!(matches!(result, Err(SocketError::InvalidAddress(_))));
}

#[tokio::test]
async fn test_ipv6_send_receive() {
    let loopback: IpAddr = "::1".parse().unwrap();

    let receiver = UdpSocket::new(UdpSocketConfig::udp6()).unwrap();
    // Environments without IPv6 loopback skip here.
    if receiver.bind_to(loopback, 0).is_err() {
        return;
    }
    let receiver_addr = receiver.local_addr();
    assert_eq!(receiver_addr.family, AddressFamily::Ipv6);

    let received: Arc<parking_lot::Mutex<Vec<u8>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_clone = received.clone();
    receiver.events.message.connect(move |datagram| {
        *received_clone.lock() = datagram.data.clone();
    });

    let sender = UdpSocket::new(UdpSocketConfig::udp6()).unwrap();
    sender.bind_to(loopback, 0).unwrap();
    sender
        .send_to(b"over six", receiver_addr.address, receiver_addr.port)
        .unwrap();

    for _ in 0..100 {
        if !received.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(&*received.lock(), b"over six");

    sender.close();
    receiver.close();
}
