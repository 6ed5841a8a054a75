//! Datagram I/O seams and their IPv4 multicast implementations.
//!
//! The send loop writes through a [`DatagramSink`] and the Listener reads
//! through a [`DatagramSource`]. Production transports bind real multicast
//! sockets via [`bind_sink`] and [`bind_source`]; tests substitute an
//! in-memory network.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
};

use async_trait::async_trait;
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::config::TransportConfig;

/// Outbound half of a multicast channel.
#[async_trait]
pub trait DatagramSink: Send + Sync + 'static {
    /// Transmit one datagram to the group.
    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<()>;
}

/// Inbound half of a multicast channel.
///
/// `recv_datagram` must be cancel-safe: the Listener drops the pending
/// future whenever its session is cancelled.
#[async_trait]
pub trait DatagramSource: Send + 'static {
    /// Wait for the next datagram.
    async fn recv_datagram(&mut self) -> io::Result<Bytes>;
}

#[async_trait]
impl DatagramSink for Box<dyn DatagramSink> {
    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<()> {
        (**self).send_datagram(datagram).await
    }
}

#[async_trait]
impl DatagramSource for Box<dyn DatagramSource> {
    async fn recv_datagram(&mut self) -> io::Result<Bytes> { (**self).recv_datagram().await }
}

/// Sends datagrams to a multicast group.
#[derive(Debug)]
pub struct MulticastSink {
    socket: UdpSocket,
    group: SocketAddrV4,
}

#[async_trait]
impl DatagramSink for MulticastSink {
    async fn send_datagram(&self, datagram: &[u8]) -> io::Result<()> {
        let sent = self.socket.send_to(datagram, self.group).await?;
        if sent == datagram.len() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram write: {sent} of {} bytes", datagram.len()),
            ))
        }
    }
}

/// Receives datagrams addressed to a joined multicast group.
#[derive(Debug)]
pub struct MulticastSource {
    socket: UdpSocket,
    buffer: Vec<u8>,
}

#[async_trait]
impl DatagramSource for MulticastSource {
    async fn recv_datagram(&mut self) -> io::Result<Bytes> {
        let (len, _peer) = self.socket.recv_from(&mut self.buffer).await?;
        Ok(Bytes::copy_from_slice(&self.buffer[..len]))
    }
}

/// Bind a socket that transmits to the configured group.
///
/// # Errors
///
/// Returns any socket creation or option error.
pub fn bind_sink(config: &TransportConfig) -> io::Result<MulticastSink> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_multicast_if_v4(&config.interface)?;
    socket.set_multicast_ttl_v4(config.protocol.multicast_ttl)?;
    socket.set_multicast_loop_v4(config.protocol.multicast_loop)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((config.interface, 0)).into())?;
    Ok(MulticastSink {
        socket: UdpSocket::from_std(socket.into())?,
        group: config.group_addr(),
    })
}

/// Bind a socket on the group port and join the configured group.
///
/// The address is shared so several transports on one host can listen to
/// the same group.
///
/// # Errors
///
/// Returns any socket creation, bind or membership error.
pub fn bind_source(config: &TransportConfig) -> io::Result<MulticastSource> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(all(
        unix,
        not(target_os = "solaris"),
        not(target_os = "illumos"),
        not(target_os = "cygwin"),
    ))]
    socket.set_reuse_port(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port)).into())?;
    socket.join_multicast_v4(&config.group, &config.interface)?;
    Ok(MulticastSource {
        socket: UdpSocket::from_std(socket.into())?,
        buffer: vec![0; config.protocol.max_datagram_size],
    })
}
