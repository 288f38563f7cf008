//! Interface address lookups via getifaddrs.

use std::io::{Error, ErrorKind, Result};
use std::net::Ipv4Addr;

use nix::ifaddrs::getifaddrs;

pub fn get_interface_ip(name: &str) -> Result<Ipv4Addr> {
    getifaddrs()?
        .find_map(|ifa| {
            if ifa.interface_name != name {
                return None;
            }
            ifa.address.and_then(|addr| addr.as_sockaddr_in().map(|sin| sin.ip()))
        })
        .ok_or_else(|| Error::from(ErrorKind::NotFound))
}

pub fn get_interface_mac(name: &str) -> Result<[u8; 6]> {
    getifaddrs()?
        .find_map(|ifa| {
            if ifa.interface_name != name {
                return None;
            }
            ifa.address
                .and_then(|addr| addr.as_link_addr().and_then(|link| link.addr()))
        })
        .ok_or_else(|| Error::from(ErrorKind::NotFound))
}

pub fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":")
}
