//! Boot client implementation
//!
//! Drives the two exchanges of an MECM PXE boot: a broadcast to find
//! PXE-enabled distribution points, and a unicast request to port 4011 that
//! makes a distribution point generate boot media and answer with the media
//! variables file location in its vendor options.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use media::RawOption;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket as TokioUdpSocket;
use tokio::time::{Instant, timeout_at};

use crate::packet::DhcpPacket;
use crate::{DhcpOption, MessageType, OpCode};

/// Port a distribution point listens on for boot media requests.
pub const MECM_BOOT_PORT: u16 = 4011;

const DHCP_SERVER_PORT: u16 = 67;

/// How long to wait for a boot reply before giving up.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Option 250 payload describing an x64 boot client, byte for byte what the
/// real boot loader sends. The server varies its reply on it.
const MECM_X64_ATTRIBUTES: [u8; 21] = [
    0x0C, 0x01, 0x01, 0x0D, 0x02, 0x08, 0x00, 0x01, 0x02, 0x00, 0x07, 0x0E, 0x01, 0x01, 0x05,
    0x04, 0x00, 0x00, 0x00, 0x11, 0xFF,
];

/// Option 97 machine identifier: a type byte of zero followed by a fixed
/// GUID. Sent by real clients; WDS configurations answer without it.
const CLIENT_MACHINE_ID: [u8; 17] = [
    0x00, 0x2A, 0x8C, 0x4D, 0x9D, 0xC1, 0x6C, 0x42, 0x41, 0x83, 0x87, 0xEF, 0xC6, 0xD8, 0x73,
    0xC6, 0xD2,
];

/// Options requested back from the server. 128 through 135 cover the vendor
/// range the media reference and boot descriptor travel in.
const PARAMETER_REQUEST_LIST: [u8; 11] = [3, 1, 60, 128, 129, 130, 131, 132, 133, 134, 135];

/// UDP client for the MECM boot exchanges.
pub struct BootClient {
    socket: TokioUdpSocket,
    mac: [u8; 6],
    client_ip: Ipv4Addr,
}

impl BootClient {
    /// Bind a broadcast-capable client socket.
    ///
    /// Production use binds `0.0.0.0:68` so that servers answering the DHCP
    /// client port reach us; that needs privileges. Tests bind an ephemeral
    /// loopback port instead.
    pub fn bind(bind: SocketAddr, mac: [u8; 6], client_ip: Ipv4Addr) -> Result<Self> {
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .context("Failed to create client socket")?;

        socket2
            .set_broadcast(true)
            .context("Failed to enable broadcast on client socket")?;

        socket2
            .set_nonblocking(true)
            .context("Failed to set client socket to non-blocking mode")?;

        // Port 68 is often held by a local DHCP client; share it.
        socket2.set_reuse_address(true)?;
        #[cfg(any(target_os = "macos", target_os = "linux"))]
        if let Err(e) = socket2.set_reuse_port(true) {
            tracing::warn!("Failed to set SO_REUSEPORT on client socket: {}", e);
        }

        socket2
            .bind(&bind.into())
            .with_context(|| format!("Failed to bind client socket to {}", bind))?;

        let std_socket: UdpSocket = socket2.into();
        let socket = TokioUdpSocket::from_std(std_socket).context("Failed to convert to Tokio socket")?;

        tracing::debug!("Boot client socket bound to {}", bind);
        Ok(Self { socket, mac, client_ip })
    }

    /// Broadcast a PXE boot request and collect every server that answers
    /// within the window.
    ///
    /// A network can have a plain DHCP server and several PXE responders
    /// answering the same broadcast; all distinct server identifiers are
    /// returned in reply order.
    pub async fn discover(&self, window: Duration) -> Result<Vec<Ipv4Addr>> {
        let mut packet = DhcpPacket::new();
        packet.xid = fresh_xid();
        packet.flags = 0x8000; // no lease yet, ask for broadcast replies
        packet.set_mac_address(self.mac);
        packet.add_option(DhcpOption::MessageType as u8, &[MessageType::Request as u8]);
        packet.add_string_option(DhcpOption::VendorClassIdentifier as u8, "PXEClient");
        packet.add_option(DhcpOption::ClientSystemArchitecture as u8, &[0, 0]);

        let destination = SocketAddr::from((Ipv4Addr::BROADCAST, DHCP_SERVER_PORT));
        tracing::info!("Broadcasting PXE discover to {}", destination);
        self.socket
            .send_to(&packet.to_bytes(), destination)
            .await
            .context("Failed to send PXE discover broadcast")?;

        let deadline = Instant::now() + window;
        let mut servers: Vec<Ipv4Addr> = Vec::new();
        let mut buffer = [0u8; 1500];

        while let Ok(received) = timeout_at(deadline, self.socket.recv_from(&mut buffer)).await {
            let (len, from) = received.context("Error receiving discover reply")?;
            let Ok(reply) = DhcpPacket::from_bytes(&buffer[..len]) else {
                continue;
            };
            if reply.op != OpCode::BootReply || reply.xid != packet.xid {
                continue;
            }

            if let Some(server) = reply.get_server_identifier()
                && !servers.contains(&server)
            {
                tracing::info!("PXE responder {} (reply from {})", server, from);
                servers.push(server);
            }
        }

        Ok(servers)
    }

    /// Send a boot media request to `server` and return the reply's options
    /// in packet order.
    ///
    /// The request mirrors what the real boot loader sends to port 4011:
    /// options 53, 55, 60, 93, 97 and 250. The reply of interest carries the
    /// media reference in option 243.
    pub async fn request_boot_media(&self, server: SocketAddr) -> Result<Vec<RawOption>> {
        let mut packet = DhcpPacket::new();
        packet.xid = fresh_xid();
        packet.ciaddr = self.client_ip;
        packet.set_mac_address(self.mac);
        packet.add_option(DhcpOption::MessageType as u8, &[MessageType::Request as u8]);
        packet.add_option(DhcpOption::ParameterRequestList as u8, &PARAMETER_REQUEST_LIST);
        packet.add_option(DhcpOption::ClientSystemArchitecture as u8, &[0, 0]);
        packet.add_option(DhcpOption::MecmAttributes as u8, &MECM_X64_ATTRIBUTES);
        packet.add_string_option(DhcpOption::VendorClassIdentifier as u8, "PXEClient");
        packet.add_option(DhcpOption::ClientMachineIdentifier as u8, &CLIENT_MACHINE_ID);

        tracing::info!("Requesting boot media from {}", server);
        self.socket
            .send_to(&packet.to_bytes(), server)
            .await
            .with_context(|| format!("Failed to send boot media request to {}", server))?;

        let deadline = Instant::now() + REPLY_TIMEOUT;
        let mut buffer = [0u8; 1500];

        loop {
            let received = timeout_at(deadline, self.socket.recv_from(&mut buffer))
                .await
                .map_err(|_| {
                    anyhow::anyhow!(
                        "no boot reply from {}; wrong address, or a firewall dropping UDP 68/4011?",
                        server
                    )
                })?;
            let (len, _) = received.context("Error receiving boot reply")?;

            let Ok(reply) = DhcpPacket::from_bytes(&buffer[..len]) else {
                continue;
            };
            if reply.op != OpCode::BootReply || reply.xid != packet.xid {
                continue;
            }

            return Ok(reply.get_options());
        }
    }
}

/// Transaction id seeded from the clock. Collisions only cost a mismatched
/// reply being ignored.
fn fresh_xid() -> u32 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.subsec_nanos() ^ now.as_secs() as u32
}
