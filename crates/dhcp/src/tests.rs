//! Integration tests driving the boot client against a scripted responder
//! on loopback.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;

use crate::packet::DhcpPacket;
use crate::{BootClient, DhcpOption, MessageType, OpCode};

const TEST_MAC: [u8; 6] = [0x02, 0x00, 0x5E, 0x10, 0x20, 0x30];

fn media_reference() -> Vec<u8> {
    let path = b"\\SMSTemp\\media.boot.var";
    let mut data = vec![1u8, path.len() as u8];
    data.extend_from_slice(path);
    data
}

fn boot_reply(request: &DhcpPacket) -> DhcpPacket {
    let mut reply = DhcpPacket::new();
    reply.op = OpCode::BootReply;
    reply.xid = request.xid;
    reply.chaddr = request.chaddr;
    reply.add_option(DhcpOption::MessageType as u8, &[MessageType::Ack as u8]);
    reply.add_option(DhcpOption::MediaReference as u8, &media_reference());
    reply.add_option(DhcpOption::BootDescriptor as u8, b"\\SMSTemp\\boot.bcd\0\0");
    reply
}

/// Respond to one boot media request the way a distribution point would,
/// checking that the request carries the options a real one insists on.
async fn spawn_boot_responder() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buffer = [0u8; 1500];
        let (len, from) = socket.recv_from(&mut buffer).await.unwrap();
        let request = DhcpPacket::from_bytes(&buffer[..len]).unwrap();

        assert_eq!(request.get_message_type(), Some(MessageType::Request));
        assert!(request.get_option(DhcpOption::MecmAttributes as u8).is_some());
        assert!(
            request
                .get_option(DhcpOption::ClientMachineIdentifier as u8)
                .is_some()
        );
        assert!(
            request
                .get_option(DhcpOption::ParameterRequestList as u8)
                .is_some()
        );
        assert_eq!(request.get_mac_address(), TEST_MAC);

        let reply = boot_reply(&request);
        socket.send_to(&reply.to_bytes(), from).await.unwrap();
    });

    addr
}

#[tokio::test]
async fn test_boot_media_request_round_trip() {
    let server = spawn_boot_responder().await;

    let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let client = BootClient::bind(bind, TEST_MAC, Ipv4Addr::LOCALHOST).unwrap();
    let options = client.request_boot_media(server).await.unwrap();

    let media_option = options
        .iter()
        .find(|option| option.number == DhcpOption::MediaReference as u8)
        .expect("reply should carry option 243");
    let reference = media::parse_blob_reference(&media_option.data).unwrap();
    assert_eq!(reference.media_path(), "\\SMSTemp\\media.boot.var");

    let descriptor = media::parse_boot_descriptor(&options).unwrap();
    assert_eq!(descriptor, "\\SMSTemp\\boot.bcd");
}

#[tokio::test]
async fn test_stray_replies_are_skipped() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let server = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buffer = [0u8; 1500];
        let (len, from) = socket.recv_from(&mut buffer).await.unwrap();
        let request = DhcpPacket::from_bytes(&buffer[..len]).unwrap();

        // Not a DHCP packet at all.
        socket.send_to(b"noise", from).await.unwrap();

        // A reply for some other transaction.
        let mut stray = boot_reply(&request);
        stray.xid = request.xid.wrapping_add(1);
        socket.send_to(&stray.to_bytes(), from).await.unwrap();

        let reply = boot_reply(&request);
        socket.send_to(&reply.to_bytes(), from).await.unwrap();
    });

    let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let client = BootClient::bind(bind, TEST_MAC, Ipv4Addr::LOCALHOST).unwrap();
    let options = client.request_boot_media(server).await.unwrap();

    assert!(
        options
            .iter()
            .any(|option| option.number == DhcpOption::MediaReference as u8)
    );
}
