//! Host/port tuple notation used by PORT and PASV: `h1,h2,h3,h4,p1,p2`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::error::AddressError;

/// Formats an address as six comma-separated decimal fields.
pub fn encode(addr: SocketAddrV4) -> String {
    let [h1, h2, h3, h4] = addr.ip().octets();
    let port = addr.port();
    format!("{},{},{},{},{},{}", h1, h2, h3, h4, port / 256, port % 256)
}

/// Parses six comma-separated decimal fields into an address.
///
/// Port is `p1 * 256 + p2` and must lie in `1..=65535`.
pub fn decode(s: &str) -> Result<SocketAddrV4, AddressError> {
    let fields: Vec<&str> = s.trim().split(',').map(str::trim).collect();
    if fields.len() != 6 {
        return Err(AddressError::Malformed(s.to_string()));
    }

    let mut values = [0u32; 6];
    for (slot, field) in values.iter_mut().zip(&fields) {
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AddressError::Malformed(s.to_string()));
        }
        *slot = field
            .parse()
            .map_err(|_| AddressError::Malformed(s.to_string()))?;
    }

    let mut octets = [0u8; 4];
    for (octet, value) in octets.iter_mut().zip(&values[..4]) {
        *octet = u8::try_from(*value).map_err(|_| AddressError::Malformed(s.to_string()))?;
    }

    let (p1, p2) = (values[4], values[5]);
    if p2 > 255 {
        return Err(AddressError::Malformed(s.to_string()));
    }
    let port = p1.saturating_mul(256).saturating_add(p2);
    if port == 0 || port > u32::from(u16::MAX) {
        return Err(AddressError::PortOutOfRange(port));
    }

    Ok(SocketAddrV4::new(Ipv4Addr::from(octets), port as u16))
}

/// Extracts the address from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply text.
pub fn parse_pasv_reply(text: &str) -> Result<SocketAddrV4, AddressError> {
    let start = text
        .find('(')
        .ok_or_else(|| AddressError::Malformed(text.to_string()))?;
    let end = text[start..]
        .find(')')
        .map(|offset| start + offset)
        .ok_or_else(|| AddressError::Malformed(text.to_string()))?;
    decode(&text[start + 1..end])
}

/// Narrows a socket address to IPv4, unwrapping IPv4-mapped IPv6 addresses.
pub fn to_v4(addr: SocketAddr) -> Result<SocketAddrV4, AddressError> {
    match addr.ip() {
        IpAddr::V4(ip) => Ok(SocketAddrV4::new(ip, addr.port())),
        IpAddr::V6(ip) => ip
            .to_ipv4_mapped()
            .map(|v4| SocketAddrV4::new(v4, addr.port()))
            .ok_or(AddressError::NotIpv4(addr.ip())),
    }
}
