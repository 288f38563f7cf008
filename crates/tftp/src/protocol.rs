//! TFTP Protocol Implementation
//!
//! Packet building and parsing for the client side of TFTP as defined in
//! RFC 1350, plus option negotiation (OACK) from RFC 2347.
//!
//! A read transfer looks like:
//!
//! ```text
//! client                         server
//!   | --- RRQ filename, octet ---> |      (to port 69)
//!   | <-- OACK options ----------- |      (from a fresh port, optional)
//!   | --- ACK 0 ----------------->
//!   | <-- DATA 1 ----------------- |
//!   | --- ACK 1 ----------------->
//!   |            ...               |
//!   | <-- DATA n (short block) --- |
//!   | --- ACK n ----------------->
//! ```
//!
//! The transfer ends with the first block shorter than the block size.

use std::collections::HashMap;
use std::fmt;

use anyhow::{Result, anyhow};

/// TFTP Protocol Opcodes
///
/// Each opcode identifies a packet format as defined in RFC 1350, with
/// OACK added by RFC 2347.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TftpOpcode {
    /// Read Request (RRQ): | Opcode | Filename | 0 | Mode | 0 | \[Options\] |
    ReadRequest = 1,

    /// Write Request (WRQ). Never sent by this client.
    WriteRequest = 2,

    /// Data packet: | Opcode | Block# | Data |
    ///
    /// A block shorter than the negotiated block size ends the transfer.
    Data = 3,

    /// Acknowledgment: | Opcode | Block# |
    ///
    /// ACK with block number 0 acknowledges an OACK packet.
    Acknowledgment = 4,

    /// Error packet: | Opcode | ErrorCode | ErrMsg | 0 |
    ///
    /// Terminates the current transfer.
    Error = 5,

    /// Option Acknowledgment: | Opcode | Opt1 | 0 | Value1 | 0 | ... |
    ///
    /// Carries the option values the server accepted, `blksize` being the
    /// one that changes how the transfer proceeds.
    OptionAck = 6,
}

impl TftpOpcode {
    /// Convert a u16 value to a TftpOpcode
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::ReadRequest),
            2 => Some(Self::WriteRequest),
            3 => Some(Self::Data),
            4 => Some(Self::Acknowledgment),
            5 => Some(Self::Error),
            6 => Some(Self::OptionAck),
            _ => None,
        }
    }

    /// Convert the opcode to its u16 representation
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the human-readable name of the opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadRequest => "RRQ",
            Self::WriteRequest => "WRQ",
            Self::Data => "DATA",
            Self::Acknowledgment => "ACK",
            Self::Error => "ERROR",
            Self::OptionAck => "OACK",
        }
    }
}

impl From<TftpOpcode> for u16 {
    fn from(opcode: TftpOpcode) -> Self {
        opcode.as_u16()
    }
}

impl fmt::Display for TftpOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// TFTP Error Codes as defined in RFC 1350
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TftpErrorCode {
    /// Generic error; the message carries the details.
    NotDefined = 0,
    /// The requested file does not exist on the server.
    FileNotFound = 1,
    /// The server refused access to the requested file.
    AccessViolation = 2,
    /// No space left for a write operation.
    DiskFull = 3,
    /// The requested operation is unsupported or malformed.
    IllegalOperation = 4,
    /// Packet received from an unexpected source port.
    UnknownTransferId = 5,
    /// Attempted to create a file that already exists.
    FileAlreadyExists = 6,
    /// User-based authentication failed.
    NoSuchUser = 7,
    /// Option negotiation failed (RFC 2347 extension).
    OptionNegotiationFailed = 8,
}

impl TftpErrorCode {
    /// Convert a u16 value to a TftpErrorCode
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::NotDefined),
            1 => Some(Self::FileNotFound),
            2 => Some(Self::AccessViolation),
            3 => Some(Self::DiskFull),
            4 => Some(Self::IllegalOperation),
            5 => Some(Self::UnknownTransferId),
            6 => Some(Self::FileAlreadyExists),
            7 => Some(Self::NoSuchUser),
            8 => Some(Self::OptionNegotiationFailed),
            _ => None,
        }
    }

    /// Convert the error code to its u16 representation
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get the default error message for this error code
    pub fn default_message(self) -> &'static str {
        match self {
            Self::NotDefined => "Undefined error",
            Self::FileNotFound => "File not found",
            Self::AccessViolation => "Access violation",
            Self::DiskFull => "Disk full or allocation exceeded",
            Self::IllegalOperation => "Illegal TFTP operation",
            Self::UnknownTransferId => "Unknown transfer ID",
            Self::FileAlreadyExists => "File already exists",
            Self::NoSuchUser => "No such user",
            Self::OptionNegotiationFailed => "Option negotiation failed",
        }
    }
}

impl From<TftpErrorCode> for u16 {
    fn from(error_code: TftpErrorCode) -> Self {
        error_code.as_u16()
    }
}

impl fmt::Display for TftpErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.default_message(), self.as_u16())
    }
}

/// TFTP Transfer Modes
///
/// Only octet mode is sent by this client; boot media files are binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferMode {
    /// Binary mode, data transferred as-is. Mode string: "octet"
    Octet,
    /// Text mode with NETASCII line endings. Mode string: "netascii"
    NetAscii,
}

impl TransferMode {
    /// Parse a transfer mode from a string, case-insensitively.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "octet" => Some(Self::Octet),
            "netascii" => Some(Self::NetAscii),
            _ => None,
        }
    }

    /// Get the string representation of the transfer mode
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Octet => "octet",
            Self::NetAscii => "netascii",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default TFTP block size in bytes, used until an OACK changes it.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Find the next null byte in a buffer starting from a given position
pub fn find_zero(buf: &[u8], start: usize) -> Option<usize> {
    buf[start..].iter().position(|&b| b == 0).map(|pos| start + pos)
}

/// Build a TFTP Read Request (RRQ) packet
pub fn build_rrq(filename: &str, mode: TransferMode) -> Vec<u8> {
    let mode = mode.as_str();
    let mut v = Vec::with_capacity(2 + filename.len() + 1 + mode.len() + 1);
    v.extend_from_slice(&TftpOpcode::ReadRequest.as_u16().to_be_bytes());
    v.extend_from_slice(filename.as_bytes());
    v.push(0);
    v.extend_from_slice(mode.as_bytes());
    v.push(0);
    v
}

/// Build a TFTP ACK packet
pub fn build_ack(block: u16) -> Vec<u8> {
    let mut v = Vec::with_capacity(4);
    v.extend_from_slice(&TftpOpcode::Acknowledgment.as_u16().to_be_bytes());
    v.extend_from_slice(&block.to_be_bytes());
    v
}

/// Build a TFTP Data packet
pub fn build_data(block: u16, data: &[u8]) -> Vec<u8> {
    let mut v = Vec::with_capacity(4 + data.len());
    v.extend_from_slice(&TftpOpcode::Data.as_u16().to_be_bytes());
    v.extend_from_slice(&block.to_be_bytes());
    v.extend_from_slice(data);
    v
}

/// Build a TFTP Error packet
pub fn build_error(code: u16, msg: &str) -> Vec<u8> {
    let mut v = Vec::with_capacity(4 + msg.len() + 1);
    v.extend_from_slice(&TftpOpcode::Error.as_u16().to_be_bytes());
    v.extend_from_slice(&code.to_be_bytes());
    v.extend_from_slice(msg.as_bytes());
    v.push(0);
    v
}

/// Build a TFTP OACK (Option Acknowledgment) packet
pub fn build_oack(opts: &HashMap<String, String>) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&TftpOpcode::OptionAck.as_u16().to_be_bytes());

    for (key, val) in opts {
        v.extend_from_slice(key.as_bytes());
        v.push(0);
        v.extend_from_slice(val.as_bytes());
        v.push(0);
    }

    v
}

/// Parse a TFTP Read Request (RRQ) packet
///
/// Returns (filename, mode, options) tuple
pub fn parse_rrq(buf: &[u8]) -> Result<(String, String, HashMap<String, String>)> {
    if buf.len() < 4 {
        return Err(anyhow!("RRQ too short"));
    }

    let opcode = u16::from_be_bytes([buf[0], buf[1]]);
    if opcode != TftpOpcode::ReadRequest.as_u16() {
        return Err(anyhow!("Not an RRQ packet"));
    }

    let mut i = 2;

    // Parse filename
    let fname_end = find_zero(buf, i).ok_or_else(|| anyhow!("filename not terminated"))?;
    let filename = std::str::from_utf8(&buf[i..fname_end])?.to_string();
    i = fname_end + 1;

    // Parse mode
    let mode_end = find_zero(buf, i).ok_or_else(|| anyhow!("mode not terminated"))?;
    let mode = std::str::from_utf8(&buf[i..mode_end])?.to_ascii_lowercase();
    i = mode_end + 1;

    // Parse options
    let mut opts = HashMap::new();
    while i < buf.len() {
        let key_end = find_zero(buf, i).ok_or_else(|| anyhow!("option key not terminated"))?;
        let key = std::str::from_utf8(&buf[i..key_end])?.to_string();
        i = key_end + 1;

        if i >= buf.len() {
            break;
        }

        let val_end = find_zero(buf, i).ok_or_else(|| anyhow!("option value not terminated"))?;
        let val = std::str::from_utf8(&buf[i..val_end])?.to_string();
        i = val_end + 1;

        opts.insert(key, val);
    }

    Ok((filename, mode, opts))
}

/// Parse a TFTP Data packet
///
/// Returns (block number, payload) tuple
pub fn parse_data(buf: &[u8]) -> Result<(u16, &[u8])> {
    if buf.len() < 4 {
        return Err(anyhow!("DATA too short"));
    }

    let opcode = u16::from_be_bytes([buf[0], buf[1]]);
    if opcode != TftpOpcode::Data.as_u16() {
        return Err(anyhow!("Not a DATA packet"));
    }

    Ok((u16::from_be_bytes([buf[2], buf[3]]), &buf[4..]))
}

/// Parse a TFTP ACK packet
pub fn parse_ack(buf: &[u8]) -> Result<u16> {
    if buf.len() < 4 {
        return Err(anyhow!("ACK too short"));
    }

    let opcode = u16::from_be_bytes([buf[0], buf[1]]);
    if opcode != TftpOpcode::Acknowledgment.as_u16() {
        return Err(anyhow!("Not an ACK packet"));
    }

    Ok(u16::from_be_bytes([buf[2], buf[3]]))
}

/// Parse a TFTP OACK packet into its option map
pub fn parse_oack(buf: &[u8]) -> Result<HashMap<String, String>> {
    if buf.len() < 2 {
        return Err(anyhow!("OACK too short"));
    }

    let opcode = u16::from_be_bytes([buf[0], buf[1]]);
    if opcode != TftpOpcode::OptionAck.as_u16() {
        return Err(anyhow!("Not an OACK packet"));
    }

    let mut opts = HashMap::new();
    let mut i = 2;
    while i < buf.len() {
        let key_end = find_zero(buf, i).ok_or_else(|| anyhow!("option key not terminated"))?;
        let key = std::str::from_utf8(&buf[i..key_end])?.to_string();
        i = key_end + 1;

        let val_end = find_zero(buf, i).ok_or_else(|| anyhow!("option value not terminated"))?;
        let val = std::str::from_utf8(&buf[i..val_end])?.to_string();
        i = val_end + 1;

        opts.insert(key, val);
    }

    Ok(opts)
}

/// Parse a TFTP Error packet
pub fn parse_error(buf: &[u8]) -> Result<(u16, String)> {
    if buf.len() < 4 {
        return Err(anyhow!("Error packet too short"));
    }

    let opcode = u16::from_be_bytes([buf[0], buf[1]]);
    if opcode != TftpOpcode::Error.as_u16() {
        return Err(anyhow!("Not an Error packet"));
    }

    let code = u16::from_be_bytes([buf[2], buf[3]]);
    let message = if buf.len() > 4 {
        let msg_bytes = &buf[4..];
        // Find null terminator or use entire remaining buffer
        let end = msg_bytes.iter().position(|&b| b == 0).unwrap_or(msg_bytes.len());
        std::str::from_utf8(&msg_bytes[..end])?.to_string()
    } else {
        String::new()
    };

    Ok((code, message))
}

/// Get the opcode from a TFTP packet
pub fn get_opcode(buf: &[u8]) -> Option<u16> {
    if buf.len() >= 2 {
        Some(u16::from_be_bytes([buf[0], buf[1]]))
    } else {
        None
    }
}

/// Get the TFTP opcode enum from a packet buffer
pub fn get_tftp_opcode(buf: &[u8]) -> Option<TftpOpcode> {
    get_opcode(buf).and_then(TftpOpcode::from_u16)
}
