//! TFTP Client Module
//!
//! Implements the client half of TFTP (RFC 1350) with option negotiation
//! (RFC 2347/2348), as needed to pull boot media files off a distribution
//! point. Only read transfers in octet mode are supported.

pub mod protocol;
pub mod transfer;

pub use protocol::{TftpErrorCode, TftpOpcode, TransferMode};
pub use transfer::{TransferConfig, download};
