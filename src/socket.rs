//! Platform socket backend: per-interface multicast sockets, sending,
//! and budgeted multiplexed receiving.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::time::Duration;

use futures::future::select_all;
use socket2::{Domain, Protocol, Type};
use tokio::net::UdpSocket;

use crate::error::SocketError;

pub const MDNS_PORT: u16 = 5353;
const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const MDNS_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);
const RECV_BUF_SIZE: usize = 2048;

enum Family {
    V4,
    V6,
}

/// One multicast-joined mDNS socket, bound to a single local interface.
pub struct Socket {
    io: UdpSocket,
    family: Family,
}

impl Socket {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.io.local_addr()
    }

    fn multicast_dest(&self, port: u16) -> SocketAddr {
        match self.family {
            Family::V4 => SocketAddr::V4(SocketAddrV4::new(MDNS_GROUP_V4, port)),
            Family::V6 => SocketAddr::V6(SocketAddrV6::new(MDNS_GROUP_V6, port, 0, 0)),
        }
    }
}

/// Enumerate local interfaces and open one multicast socket per
/// non-loopback address, up to `max_sockets`. A single interface
/// failing to bind is logged and skipped; the whole call only fails if
/// interface enumeration itself fails or no socket could be opened at
/// all.
pub fn open_per_interface(max_sockets: usize, port: u16) -> Result<Vec<Socket>, SocketError> {
    let interfaces = if_addrs::get_if_addrs().map_err(SocketError::Enumeration)?;

    let mut sockets = Vec::new();
    let mut seen_v6_indices = std::collections::HashSet::new();

    for iface in interfaces {
        if sockets.len() >= max_sockets {
            log::warn!("reached max socket count ({max_sockets}); not opening remaining interfaces");
            break;
        }

        match iface.ip() {
            IpAddr::V4(addr) => {
                if addr.is_loopback() {
                    continue;
                }
                match open_v4(addr, port) {
                    Ok(sock) => {
                        log::trace!("opened IPv4 mdns socket on {addr}");
                        sockets.push(sock);
                    }
                    Err(err) => log::warn!("skipping IPv4 socket on {addr}: {err}"),
                }
            }
            IpAddr::V6(addr) => {
                if addr.is_loopback() || addr.to_ipv4_mapped().is_some() {
                    continue;
                }
                let Some(idx) = iface.index else {
                    continue;
                };
                if !seen_v6_indices.insert(idx) {
                    continue;
                }
                match open_v6(idx, port) {
                    Ok(sock) => {
                        log::trace!("opened IPv6 mdns socket on interface index {idx}");
                        sockets.push(sock);
                    }
                    Err(err) => log::warn!("skipping IPv6 socket on interface index {idx}: {err}"),
                }
            }
        }
    }

    if sockets.is_empty() {
        return Err(SocketError::NoSocketsOpened);
    }

    Ok(sockets)
}

fn open_v4(iface_addr: Ipv4Addr, port: u16) -> anyhow::Result<Socket> {
    let sock = socket2::Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_reuse_address(true)?;
    #[cfg(not(target_os = "windows"))]
    sock.set_reuse_port(true)?;
    sock.set_multicast_ttl_v4(1)?;
    sock.set_multicast_loop_v4(true)?;

    let bind_addr: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    sock.bind(&socket2::SockAddr::from(bind_addr))?;
    sock.join_multicast_v4(&MDNS_GROUP_V4, &iface_addr)?;
    sock.set_nonblocking(true)?;

    Ok(Socket {
        io: UdpSocket::from_std(sock.into())?,
        family: Family::V4,
    })
}

fn open_v6(interface_index: u32, port: u16) -> anyhow::Result<Socket> {
    let sock = socket2::Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_reuse_address(true)?;
    #[cfg(not(target_os = "windows"))]
    sock.set_reuse_port(true)?;
    sock.set_only_v6(true)?;
    sock.set_multicast_hops_v6(1)?;
    sock.set_multicast_loop_v6(true)?;
    sock.join_multicast_v6(&MDNS_GROUP_V6, interface_index)?;
    sock.set_multicast_if_v6(interface_index)?;

    let bind_addr: SocketAddrV6 = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, port, 0, 0);
    sock.bind(&socket2::SockAddr::from(bind_addr))?;
    sock.set_nonblocking(true)?;

    Ok(Socket {
        io: UdpSocket::from_std(sock.into())?,
        family: Family::V6,
    })
}

pub async fn send_multicast(sock: &Socket, bytes: &[u8]) -> std::io::Result<()> {
    let dest = sock.multicast_dest(MDNS_PORT);
    sock.io.send_to(bytes, dest).await?;
    Ok(())
}

pub fn close(_sock: Socket) {
    // dropping the socket closes the underlying fd; kept as an explicit
    // named operation so callers don't need to know that.
}

/// Wait up to `timeout` for any socket to become readable, then drain
/// every readable socket to `EWOULDBLOCK`. Mirrors the `select()` +
/// per-socket `recvfrom`-until-`EAGAIN` loop this backend is modeled on:
/// a single socket ready for read does not block draining the others.
pub async fn receive_once(
    sockets: &[Socket],
    timeout: Duration,
) -> Vec<(usize, Vec<u8>, SocketAddr)> {
    let mut datagrams = Vec::new();

    if sockets.is_empty() {
        tokio::time::sleep(timeout).await;
        return datagrams;
    }

    let readable: Vec<_> = sockets
        .iter()
        .enumerate()
        .map(|(idx, sock)| Box::pin(async move { sock.io.readable().await.map(|_| idx) }))
        .collect();

    let first_ready = match tokio::time::timeout(timeout, select_all(readable)).await {
        Ok((Ok(idx), _, _)) => Some(idx),
        Ok((Err(err), idx, _)) => {
            log::error!("socket {idx} readiness check failed: {err}");
            None
        }
        Err(_) => None,
    };

    if first_ready.is_none() {
        return datagrams;
    }

    // At least one socket is known-ready; drain every socket regardless
    // of which one woke us, same as checking the whole `fd_set` after
    // `select()` returns rather than acting on a single fd.
    for (idx, sock) in sockets.iter().enumerate() {
        drain_socket(idx, sock, &mut datagrams);
    }

    datagrams
}

fn drain_socket(idx: usize, sock: &Socket, datagrams: &mut Vec<(usize, Vec<u8>, SocketAddr)>) {
    let mut buf = [0u8; RECV_BUF_SIZE];
    loop {
        match sock.io.try_recv_from(&mut buf) {
            Ok((0, _src)) => {
                log::warn!("zero-length UDP datagram ignored on socket {idx}");
                break;
            }
            Ok((n, src)) => {
                datagrams.push((idx, buf[..n].to_vec(), src));
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(err) => {
                log::error!("recv_from failed on socket {idx}: {err}");
                break;
            }
        }
    }
}
