use std::net::SocketAddrV4;

/// The 16-byte IPv4 address+port record stamped into a publish
/// frame's `origin_addr` field. Shaped like a raw `sockaddr_in` on
/// the wire, but treated here as an opaque record with explicitly
/// parsed fields rather than cast to a host C struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginAddr {
    family: u16,
    port_be: u16,
    address: [u8; 4],
}

pub(crate) const ORIGIN_ADDR_LEN: usize = 16;

const AF_INET: u16 = 2;

impl OriginAddr {
    #[must_use]
    pub fn from_socket_addr(addr: SocketAddrV4) -> Self {
        Self {
            family: AF_INET,
            port_be: addr.port().to_be(),
            address: addr.ip().octets(),
        }
    }

    #[must_use]
    pub fn to_socket_addr(self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address.into(), u16::from_be(self.port_be))
    }

    pub(crate) fn encode(self, out: &mut [u8; ORIGIN_ADDR_LEN]) {
        out[0..2].copy_from_slice(&self.family.to_ne_bytes());
        out[2..4].copy_from_slice(&self.port_be.to_ne_bytes());
        out[4..8].copy_from_slice(&self.address);
        out[8..16].fill(0);
    }

    pub(crate) fn decode(bytes: &[u8; ORIGIN_ADDR_LEN]) -> Self {
        let family = u16::from_ne_bytes([bytes[0], bytes[1]]);
        let port_be = u16::from_ne_bytes([bytes[2], bytes[3]]);
        let address = [bytes[4], bytes[5], bytes[6], bytes[7]];
        Self { family, port_be, address }
    }
}

impl std::fmt::Display for OriginAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_socket_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_bytes() {
        let addr = OriginAddr::from_socket_addr("10.0.0.1:5000".parse().unwrap());
        let mut bytes = [0u8; ORIGIN_ADDR_LEN];
        addr.encode(&mut bytes);
        assert_eq!(OriginAddr::decode(&bytes), addr);
        assert_eq!(addr.to_string(), "10.0.0.1:5000");
    }
}
