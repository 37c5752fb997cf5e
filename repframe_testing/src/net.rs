//! Local address helpers.

use std::net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener};

use repframe::endpoint::EndpointAddress;
use rstest::fixture;

/// Reserve a free loopback port and return its address.
///
/// The probe listener is dropped before returning so the port can be bound
/// again. This is subject to a time-of-check/time-of-use race; only use it in
/// tests that need a fixed port, such as ones that recreate an endpoint.
///
/// # Panics
///
/// Panics if no ephemeral port can be bound.
#[must_use]
pub fn free_addr() -> SocketAddr {
    let listener = StdTcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
        .expect("failed to bind free port listener");
    listener
        .local_addr()
        .expect("failed to get listener address")
}

/// An endpoint address on a free loopback port.
#[fixture]
pub fn unused_endpoint() -> EndpointAddress { EndpointAddress::from(free_addr()) }
