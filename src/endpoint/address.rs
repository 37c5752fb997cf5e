//! Parsing of `tcp://host:port` endpoint strings.

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
};

use crate::error::AddressError;

const TCP_SCHEME: &str = "tcp://";

/// A parsed endpoint address.
///
/// The host may be `*` (every IPv4 interface), `localhost`, or an IP literal.
/// IPv6 literals must be bracketed, as in `tcp://[::1]:5555`.
///
/// ```
/// use repframe::endpoint::EndpointAddress;
///
/// let addr: EndpointAddress = "tcp://*:5555".parse().expect("valid address");
/// assert_eq!(addr.socket_addr().port(), 5555);
/// assert!(addr.socket_addr().ip().is_unspecified());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointAddress {
    socket: SocketAddr,
}

impl EndpointAddress {
    /// Wrap an already resolved socket address.
    #[must_use]
    pub const fn from_socket_addr(socket: SocketAddr) -> Self { Self { socket } }

    /// The socket address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr { self.socket }
}

impl FromStr for EndpointAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(TCP_SCHEME)
            .ok_or_else(|| AddressError::UnsupportedScheme(s.to_owned()))?;
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(s.to_owned()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| AddressError::InvalidPort(port.to_owned()))?;
        let ip = parse_host(host)?;
        Ok(Self {
            socket: SocketAddr::new(ip, port),
        })
    }
}

fn parse_host(host: &str) -> Result<IpAddr, AddressError> {
    match host {
        "*" => Ok(Ipv4Addr::UNSPECIFIED.into()),
        "localhost" => Ok(Ipv4Addr::LOCALHOST.into()),
        _ => {
            let literal = host
                .strip_prefix('[')
                .and_then(|h| h.strip_suffix(']'))
                .unwrap_or(host);
            literal
                .parse()
                .map_err(|_| AddressError::InvalidHost(host.to_owned()))
        }
    }
}

impl From<SocketAddr> for EndpointAddress {
    fn from(socket: SocketAddr) -> Self { Self::from_socket_addr(socket) }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "tcp://{}", self.socket) }
}
