//! DHCP Client Module
//!
//! Implements the DHCPv4 client side of an MECM PXE boot exchange: a
//! broadcast discover to locate PXE-enabled distribution points, and a
//! unicast boot request to port 4011 that makes the distribution point
//! generate a media variables file and reply with its location.

pub mod client;
pub mod packet;

#[cfg(test)]
mod tests;

pub use client::{BootClient, MECM_BOOT_PORT};
pub use packet::DhcpPacket;

/// DHCP message types as defined in RFC 2131
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl TryFrom<u8> for MessageType {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::Discover),
            2 => Ok(MessageType::Offer),
            3 => Ok(MessageType::Request),
            4 => Ok(MessageType::Decline),
            5 => Ok(MessageType::Ack),
            6 => Ok(MessageType::Nak),
            7 => Ok(MessageType::Release),
            8 => Ok(MessageType::Inform),
            _ => Err(anyhow::anyhow!("Unknown DHCP message type: {}", value)),
        }
    }
}

/// DHCP options used in the boot exchange
///
/// 93 and 97 are standard PXE client options (RFC 4578); 243 and 252 are
/// the MECM vendor options carrying the media file reference and the boot
/// descriptor; 250 is an MECM private option describing client attributes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpOption {
    MessageType = 53,
    ServerIdentifier = 54,
    ParameterRequestList = 55,
    VendorClassIdentifier = 60,
    ClientSystemArchitecture = 93,
    ClientMachineIdentifier = 97,
    MediaReference = 243,
    MecmAttributes = 250,
    BootDescriptor = 252,
    End = 255,
}

/// Hardware address types
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareType {
    Ethernet = 1,
}

/// DHCP packet operation codes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    BootRequest = 1,
    BootReply = 2,
}
