//! [`SystemDriver`]: the operating-system implementation of
//! [`DatagramDriver`], built on `socket2` for raw socket construction and
//! option access, and on tokio's UDP socket for async receive.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::UdpSocket;

use crate::driver::{
    AddressFamily, Datagram, DatagramDriver, Endpoint, MAX_DATAGRAM_SIZE, SocketHandle,
};
use crate::error::{Result, SocketError, describe_io_error};
use crate::options::{
    IP_ADD_MEMBERSHIP, IP_DROP_MEMBERSHIP, IP_MULTICAST_LOOP, IP_MULTICAST_TTL, IP_TTL, IPPROTO_IP,
    IPPROTO_IPV6, IPV6_JOIN_GROUP, IPV6_LEAVE_GROUP, IPV6_MULTICAST_HOPS, IPV6_MULTICAST_LOOP,
    IPV6_UNICAST_HOPS, OptionKey, OptionValue, SO_BROADCAST, SO_RCVBUF, SO_REUSEADDR, SO_REUSEPORT,
    SO_SNDBUF, SOL_SOCKET,
};

/// I/O state of one native socket.
enum Io {
    /// Created but not yet bound; a raw non-blocking socket.
    Raw(Socket),
    /// Bound and registered with the tokio reactor.
    Bound(Arc<UdpSocket>),
}

struct SystemSocket {
    family: AddressFamily,
    io: Io,
}

/// Datagram driver backed by the operating system's UDP sockets.
///
/// Sockets start as raw non-blocking `socket2` sockets so that options can
/// be applied before binding; a successful bind registers them with the
/// tokio reactor for async receive. Methods that touch the reactor
/// ([`bind`](DatagramDriver::bind) and the futures returned by
/// [`receive_one`](DatagramDriver::receive_one)) must run inside a tokio
/// runtime.
pub struct SystemDriver {
    sockets: Mutex<HashMap<SocketHandle, SystemSocket>>,
}

impl SystemDriver {
    pub fn new() -> Self {
        Self {
            sockets: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` against the underlying `socket2` socket, whichever I/O
    /// state the handle is in.
    fn with_socket<T>(
        &self,
        handle: SocketHandle,
        f: impl FnOnce(&Socket) -> Result<T>,
    ) -> Result<T> {
        let sockets = self.sockets.lock();
        let entry = sockets.get(&handle).ok_or(SocketError::InvalidHandle)?;
        match &entry.io {
            Io::Raw(raw) => f(raw),
            Io::Bound(socket) => f(&SockRef::from(socket.as_ref())),
        }
    }

    /// Clone out the reactor-registered socket for a bound handle.
    fn bound(&self, handle: SocketHandle) -> Result<Arc<UdpSocket>> {
        let sockets = self.sockets.lock();
        let entry = sockets.get(&handle).ok_or(SocketError::InvalidHandle)?;
        match &entry.io {
            Io::Bound(socket) => Ok(socket.clone()),
            Io::Raw(_) => Err(SocketError::Receive("socket is not bound".to_string())),
        }
    }

    fn check_family(&self, handle: SocketHandle, address: &IpAddr) -> Result<AddressFamily> {
        let sockets = self.sockets.lock();
        let entry = sockets.get(&handle).ok_or(SocketError::InvalidHandle)?;
        if !entry.family.accepts(address) {
            return Err(SocketError::InvalidAddress(format!(
                "{} is not an {} address",
                address, entry.family
            )));
        }
        Ok(entry.family)
    }
}

impl Default for SystemDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramDriver for SystemDriver {
    fn create(&self, family: AddressFamily) -> Result<SocketHandle> {
        let domain = match family {
            AddressFamily::Ipv4 => Domain::IPV4,
            AddressFamily::Ipv6 => Domain::IPV6,
        };
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|err| SocketError::Create(describe_io_error(&err)))?;
        socket
            .set_nonblocking(true)
            .map_err(|err| SocketError::Create(describe_io_error(&err)))?;

        let handle = SocketHandle::next();
        self.sockets.lock().insert(
            handle,
            SystemSocket {
                family,
                io: Io::Raw(socket),
            },
        );
        tracing::debug!(target: "gramsock::driver", %handle, %family, "created socket");
        Ok(handle)
    }

    fn bind(&self, handle: SocketHandle, address: IpAddr, port: u16) -> Result<()> {
        self.check_family(handle, &address)?;

        let mut sockets = self.sockets.lock();
        let entry = sockets.get(&handle).ok_or(SocketError::InvalidHandle)?;
        let Io::Raw(raw) = &entry.io else {
            return Err(SocketError::AlreadyBound);
        };

        let local = SocketAddr::new(address, port);
        raw.bind(&local.into())
            .map_err(|err| SocketError::Bind(describe_io_error(&err)))?;

        // The socket is bound; hand it over to the reactor. Registration
        // failure closes the socket and the handle dies with it.
        let Some(SystemSocket {
            family,
            io: Io::Raw(raw),
        }) = sockets.remove(&handle)
        else {
            return Err(SocketError::InvalidHandle);
        };
        let registered = UdpSocket::from_std(raw.into())
            .map_err(|err| SocketError::Bind(describe_io_error(&err)))?;
        sockets.insert(
            handle,
            SystemSocket {
                family,
                io: Io::Bound(Arc::new(registered)),
            },
        );
        tracing::debug!(target: "gramsock::driver", %handle, %local, "bound socket");
        Ok(())
    }

    fn send(&self, handle: SocketHandle, address: IpAddr, port: u16, data: &[u8]) -> Result<()> {
        self.check_family(handle, &address)?;
        let dest = SocketAddr::new(address, port);

        let sockets = self.sockets.lock();
        let entry = sockets.get(&handle).ok_or(SocketError::InvalidHandle)?;
        let result = match &entry.io {
            Io::Raw(raw) => raw.send_to(data, &dest.into()).map(|_| ()),
            Io::Bound(socket) => socket.try_send_to(data, dest).map(|_| ()),
        };
        drop(sockets);

        match result {
            Ok(()) => {
                tracing::trace!(
                    target: "gramsock::driver",
                    %handle,
                    %dest,
                    len = data.len(),
                    "sent datagram"
                );
                Ok(())
            }
            // A full send buffer drops the datagram, as UDP permits.
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(err) => Err(SocketError::Send(describe_io_error(&err))),
        }
    }

    fn receive_one(&self, handle: SocketHandle) -> impl Future<Output = Result<Datagram>> + Send {
        let socket = self.bound(handle);
        async move {
            let socket = socket?;
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            let (len, from) = socket
                .recv_from(&mut buf)
                .await
                .map_err(|err| SocketError::Receive(describe_io_error(&err)))?;
            buf.truncate(len);
            tracing::trace!(target: "gramsock::driver", %handle, %from, len, "received datagram");
            Ok(Datagram::new(buf, Endpoint::from(from)))
        }
    }

    fn close(&self, handle: SocketHandle) -> Result<()> {
        match self.sockets.lock().remove(&handle) {
            Some(_) => {
                tracing::debug!(target: "gramsock::driver", %handle, "closed socket");
                Ok(())
            }
            None => Err(SocketError::InvalidHandle),
        }
    }

    fn set_option(&self, handle: SocketHandle, key: OptionKey, value: OptionValue) -> Result<()> {
        self.with_socket(handle, |socket| {
            let opt = |err: io::Error| SocketError::Option(describe_io_error(&err));
            match (key.level(), key.option(), &value) {
                (SOL_SOCKET, SO_REUSEADDR, OptionValue::Int(v)) => {
                    socket.set_reuse_address(*v != 0).map_err(opt)
                }
                #[cfg(unix)]
                (SOL_SOCKET, SO_REUSEPORT, OptionValue::Int(v)) => {
                    socket.set_reuse_port(*v != 0).map_err(opt)
                }
                #[cfg(not(unix))]
                (SOL_SOCKET, SO_REUSEPORT, OptionValue::Int(_)) => Err(SocketError::Option(
                    "SO_REUSEPORT is not supported on this platform".to_string(),
                )),
                (SOL_SOCKET, SO_BROADCAST, OptionValue::Int(v)) => {
                    socket.set_broadcast(*v != 0).map_err(opt)
                }
                (SOL_SOCKET, SO_RCVBUF, OptionValue::Int(v)) => {
                    socket.set_recv_buffer_size(*v as usize).map_err(opt)
                }
                (SOL_SOCKET, SO_SNDBUF, OptionValue::Int(v)) => {
                    socket.set_send_buffer_size(*v as usize).map_err(opt)
                }
                (IPPROTO_IP, IP_TTL, OptionValue::Int(v)) => {
                    socket.set_ttl(*v as u32).map_err(opt)
                }
                (IPPROTO_IP, IP_MULTICAST_TTL, OptionValue::Int(v)) => {
                    socket.set_multicast_ttl_v4(*v as u32).map_err(opt)
                }
                (IPPROTO_IP, IP_MULTICAST_LOOP, OptionValue::Int(v)) => {
                    socket.set_multicast_loop_v4(*v != 0).map_err(opt)
                }
                (IPPROTO_IP, IP_ADD_MEMBERSHIP, OptionValue::Membership { group, interface }) => {
                    let (group, local) = v4_membership(group, interface)?;
                    socket.join_multicast_v4(&group, &local).map_err(opt)
                }
                (IPPROTO_IP, IP_DROP_MEMBERSHIP, OptionValue::Membership { group, interface }) => {
                    let (group, local) = v4_membership(group, interface)?;
                    socket.leave_multicast_v4(&group, &local).map_err(opt)
                }
                (IPPROTO_IPV6, IPV6_UNICAST_HOPS, OptionValue::Int(v)) => {
                    socket.set_unicast_hops_v6(*v as u32).map_err(opt)
                }
                (IPPROTO_IPV6, IPV6_MULTICAST_HOPS, OptionValue::Int(v)) => {
                    socket.set_multicast_hops_v6(*v as u32).map_err(opt)
                }
                (IPPROTO_IPV6, IPV6_MULTICAST_LOOP, OptionValue::Int(v)) => {
                    socket.set_multicast_loop_v6(*v != 0).map_err(opt)
                }
                (IPPROTO_IPV6, IPV6_JOIN_GROUP, OptionValue::Membership { group, interface }) => {
                    let (group, index) = v6_membership(group, interface)?;
                    socket.join_multicast_v6(&group, index).map_err(opt)
                }
                (IPPROTO_IPV6, IPV6_LEAVE_GROUP, OptionValue::Membership { group, interface }) => {
                    let (group, index) = v6_membership(group, interface)?;
                    socket.leave_multicast_v6(&group, index).map_err(opt)
                }
                _ => Err(SocketError::Option(format!(
                    "unsupported option: level {} option {}",
                    key.level(),
                    key.option()
                ))),
            }
        })
    }

    fn get_option(&self, handle: SocketHandle, key: OptionKey) -> Result<i32> {
        self.with_socket(handle, |socket| {
            let opt = |err: io::Error| SocketError::Option(describe_io_error(&err));
            if key.level() != SOL_SOCKET {
                return Err(SocketError::Option(format!(
                    "reading level {} options is not supported",
                    key.level()
                )));
            }
            match key.option() {
                SO_REUSEADDR => socket.reuse_address().map(i32::from).map_err(opt),
                #[cfg(unix)]
                SO_REUSEPORT => socket.reuse_port().map(i32::from).map_err(opt),
                SO_BROADCAST => socket.broadcast().map(i32::from).map_err(opt),
                SO_RCVBUF => socket.recv_buffer_size().map(|v| v as i32).map_err(opt),
                SO_SNDBUF => socket.send_buffer_size().map(|v| v as i32).map_err(opt),
                other => Err(SocketError::Option(format!(
                    "unsupported option: level {} option {}",
                    SOL_SOCKET, other
                ))),
            }
        })
    }

    fn local_name(&self, handle: SocketHandle) -> Result<Endpoint> {
        self.with_socket(handle, |socket| {
            let addr = socket
                .local_addr()
                .map_err(|err| SocketError::LocalAddress(describe_io_error(&err)))?;
            let addr = addr.as_socket().ok_or_else(|| {
                SocketError::LocalAddress("local address is not an internet address".to_string())
            })?;
            Ok(Endpoint::from(addr))
        })
    }
}

fn v4_membership(group: &IpAddr, interface: &Option<IpAddr>) -> Result<(Ipv4Addr, Ipv4Addr)> {
    let IpAddr::V4(group) = group else {
        return Err(SocketError::InvalidAddress(format!(
            "{} is not an IPv4 multicast group",
            group
        )));
    };
    let local = match interface {
        None => Ipv4Addr::UNSPECIFIED,
        Some(IpAddr::V4(addr)) => *addr,
        Some(other) => {
            return Err(SocketError::InvalidAddress(format!(
                "{} is not an IPv4 interface address",
                other
            )));
        }
    };
    Ok((*group, local))
}

/// IPv6 membership scopes by interface *index*, not address. An
/// unspecified interface maps to index 0 (any); a concrete address cannot
/// be mapped reliably, so it is rejected.
fn v6_membership(group: &IpAddr, interface: &Option<IpAddr>) -> Result<(Ipv6Addr, u32)> {
    let IpAddr::V6(group) = group else {
        return Err(SocketError::InvalidAddress(format!(
            "{} is not an IPv6 multicast group",
            group
        )));
    };
    let index = match interface {
        None => 0,
        Some(IpAddr::V6(addr)) if addr.is_unspecified() => 0,
        Some(other) => {
            return Err(SocketError::Option(format!(
                "IPv6 membership requires an interface index; {} cannot be mapped to one",
                other
            )));
        }
    };
    Ok((*group, index))
}
