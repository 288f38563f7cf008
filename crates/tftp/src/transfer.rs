//! TFTP Download Logic
//!
//! Runs a complete read transfer against a server: RRQ, optional OACK
//! negotiation, then the DATA/ACK loop until a short block ends the file.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::protocol::{
    DEFAULT_BLOCK_SIZE, TftpErrorCode, TftpOpcode, TransferMode, build_ack, build_rrq, get_tftp_opcode, parse_data,
    parse_error, parse_oack,
};

const TIMEOUT_SECS: u64 = 3;
const MAX_RETRIES: usize = 8;

/// Transfer session configuration
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub timeout: Duration,
    pub max_retries: usize,
    pub local_bind: Option<IpAddr>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            local_bind: None,
        }
    }
}

/// Download `remote_path` from the TFTP server at `server`.
///
/// The RRQ goes to the server's well-known port; the server answers from a
/// fresh port of its own (its transfer id) and the rest of the exchange
/// sticks to that port. Lost packets are handled by resending the last
/// packet we sent, up to `max_retries` times per step.
pub async fn download(server: SocketAddr, remote_path: &str, config: &TransferConfig) -> Result<Vec<u8>> {
    let sock = create_ephemeral_socket(server, config.local_bind).await?;
    tracing::info!("Requesting {} from {}", remote_path, server);

    let mut outgoing = build_rrq(remote_path, TransferMode::Octet);
    let mut dest = server;
    let mut peer: Option<SocketAddr> = None;
    let mut block_size = DEFAULT_BLOCK_SIZE;
    let mut expected_block: u16 = 1;
    let mut file = Vec::new();

    loop {
        let (reply, from) = send_and_wait(&sock, dest, &outgoing, peer, server.ip(), config).await?;

        // The first reply fixes the server's transfer id; everything else
        // from that host is ignored from here on.
        if peer.is_none() {
            peer = Some(from);
            dest = from;
        }

        match get_tftp_opcode(&reply) {
            Some(TftpOpcode::OptionAck) => {
                let options = parse_oack(&reply).context("malformed OACK")?;
                if let Some(value) = options.get("blksize")
                    && let Ok(size) = value.parse::<usize>()
                    && size > 0
                {
                    block_size = size;
                }
                tracing::debug!("Server OACK: {:?}, block size {}", options, block_size);
                outgoing = build_ack(0);
            }
            Some(TftpOpcode::Data) => {
                let (block, data) = parse_data(&reply)?;
                if block == expected_block {
                    file.extend_from_slice(data);
                    outgoing = build_ack(block);
                    expected_block = expected_block.wrapping_add(1);

                    if data.len() < block_size {
                        // Short block ends the transfer; fire the last ACK
                        // without waiting for anything further.
                        sock.send_to(&outgoing, dest).await?;
                        tracing::info!("Downloaded {} ({} bytes)", remote_path, file.len());
                        return Ok(file);
                    }
                } else {
                    // Retransmitted block; re-acknowledge without advancing.
                    outgoing = build_ack(block);
                }
            }
            Some(TftpOpcode::Error) => {
                let (code, message) = parse_error(&reply)?;
                let code_text = TftpErrorCode::from_u16(code)
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| code.to_string());
                return Err(anyhow!("server refused {}: {} {}", remote_path, code_text, message));
            }
            _ => {
                // Unexpected packet; the retry loop will resend.
            }
        }
    }
}

/// Create an ephemeral UDP socket appropriate for the server address family
async fn create_ephemeral_socket(server: SocketAddr, local_bind: Option<IpAddr>) -> Result<UdpSocket> {
    let bind_addr = if let Some(ip) = local_bind {
        match ip {
            IpAddr::V4(v4) => format!("{}:0", v4),
            IpAddr::V6(v6) => format!("[{}]:0", v6),
        }
    } else {
        match server {
            SocketAddr::V4(_) => "0.0.0.0:0".to_string(),
            SocketAddr::V6(_) => "[::]:0".to_string(),
        }
    };

    let sock = UdpSocket::bind(&bind_addr)
        .await
        .context("failed to bind ephemeral socket")?;

    tracing::debug!("Transfer socket bound to {}", sock.local_addr()?);
    Ok(sock)
}

/// Send a packet and wait for the next reply, resending on timeout.
async fn send_and_wait(
    sock: &UdpSocket,
    dest: SocketAddr,
    packet: &[u8],
    peer: Option<SocketAddr>,
    server_ip: IpAddr,
    config: &TransferConfig,
) -> Result<(Vec<u8>, SocketAddr)> {
    for attempt in 0..config.max_retries {
        sock.send_to(packet, dest).await?;

        match timeout(config.timeout, recv_from_server(sock, peer, server_ip)).await {
            Ok(result) => return result,
            Err(_) => {
                if attempt + 1 == config.max_retries {
                    break;
                }
                tracing::debug!("Timeout waiting for {}, resending", dest);
            }
        }
    }

    Err(anyhow!(
        "no reply from {} after {} attempts",
        dest,
        config.max_retries
    ))
}

/// Receive a packet from the transfer peer, ignoring other sources.
///
/// Before the peer's transfer id is known, any port on the server's host is
/// accepted.
async fn recv_from_server(
    sock: &UdpSocket,
    peer: Option<SocketAddr>,
    server_ip: IpAddr,
) -> Result<(Vec<u8>, SocketAddr)> {
    let mut buf = vec![0u8; 2048];

    loop {
        let (n, src) = sock.recv_from(&mut buf).await?;

        let accepted = match peer {
            Some(peer) => src == peer,
            None => src.ip() == server_ip,
        };
        if accepted {
            buf.truncate(n);
            return Ok((buf, src));
        }

        // Ignore packets from other sources
    }
}
