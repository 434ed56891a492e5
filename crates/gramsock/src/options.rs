//! Socket option names and their numeric `(level, option)` identifiers.
//!
//! Every option a [`UdpSocket`](crate::UdpSocket) exposes is listed in
//! [`SocketOption`] and resolved to its numeric key by [`resolve`]. Both
//! sides of the driver boundary use this table: the socket resolves the
//! symbolic name before calling the driver, and the bundled system driver
//! matches the numeric key back to the concrete syscall. No other mapping
//! exists in the crate.

use std::net::IpAddr;

use crate::driver::AddressFamily;

pub(crate) const SOL_SOCKET: i32 = 0xffff;
pub(crate) const SO_REUSEADDR: i32 = 0x0004;
pub(crate) const SO_REUSEPORT: i32 = 0x0200;
pub(crate) const SO_BROADCAST: i32 = 0x0020;
pub(crate) const SO_SNDBUF: i32 = 0x1001;
pub(crate) const SO_RCVBUF: i32 = 0x1002;

pub(crate) const IPPROTO_IP: i32 = 0;
pub(crate) const IP_TTL: i32 = 4;
pub(crate) const IP_MULTICAST_TTL: i32 = 10;
pub(crate) const IP_MULTICAST_LOOP: i32 = 11;
pub(crate) const IP_ADD_MEMBERSHIP: i32 = 12;
pub(crate) const IP_DROP_MEMBERSHIP: i32 = 13;

pub(crate) const IPPROTO_IPV6: i32 = 41;
pub(crate) const IPV6_UNICAST_HOPS: i32 = 4;
pub(crate) const IPV6_MULTICAST_HOPS: i32 = 10;
pub(crate) const IPV6_MULTICAST_LOOP: i32 = 11;
pub(crate) const IPV6_JOIN_GROUP: i32 = 12;
pub(crate) const IPV6_LEAVE_GROUP: i32 = 13;

/// Symbolic names for the socket options a datagram socket supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketOption {
    /// Allow rebinding an address in `TIME_WAIT` (`SO_REUSEADDR`)
    ReuseAddress,
    /// Allow multiple sockets to bind the same address/port (`SO_REUSEPORT`)
    ReusePort,
    /// Permit sending to broadcast addresses (`SO_BROADCAST`)
    Broadcast,
    /// Kernel receive buffer size in bytes (`SO_RCVBUF`)
    ReceiveBufferSize,
    /// Kernel send buffer size in bytes (`SO_SNDBUF`)
    SendBufferSize,
    /// Unicast hop limit (`IP_TTL` / `IPV6_UNICAST_HOPS`)
    TimeToLive,
    /// Multicast hop limit (`IP_MULTICAST_TTL` / `IPV6_MULTICAST_HOPS`)
    MulticastTtl,
    /// Loop outgoing multicast back to the local host
    /// (`IP_MULTICAST_LOOP` / `IPV6_MULTICAST_LOOP`)
    MulticastLoopback,
    /// Join a multicast group (`IP_ADD_MEMBERSHIP` / `IPV6_JOIN_GROUP`)
    MulticastAddMembership,
    /// Leave a multicast group (`IP_DROP_MEMBERSHIP` / `IPV6_LEAVE_GROUP`)
    MulticastDropMembership,
}

/// Numeric `(level, option)` identifier for a socket option.
///
/// Produced by [`resolve`]; opaque apart from its accessors so that the
/// option table stays the only place numeric values are assigned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OptionKey {
    level: i32,
    option: i32,
}

impl OptionKey {
    /// The protocol level, e.g. `SOL_SOCKET` or `IPPROTO_IPV6`.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// The option identifier within the level.
    pub fn option(&self) -> i32 {
        self.option
    }
}

/// Value passed when setting a socket option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    /// An integer-valued option; boolean options use `0` and `1`.
    Int(i32),
    /// A multicast membership change: the group to join or leave and an
    /// optional local interface to scope it to.
    Membership {
        group: IpAddr,
        interface: Option<IpAddr>,
    },
}

/// Resolve a symbolic option name to its numeric key for the given family.
///
/// IP-level options live at `IPPROTO_IP` or `IPPROTO_IPV6` depending on
/// the socket's address family; `SOL_SOCKET` options ignore it.
pub fn resolve(option: SocketOption, family: AddressFamily) -> OptionKey {
    let (level, option) = match option {
        SocketOption::ReuseAddress => (SOL_SOCKET, SO_REUSEADDR),
        SocketOption::ReusePort => (SOL_SOCKET, SO_REUSEPORT),
        SocketOption::Broadcast => (SOL_SOCKET, SO_BROADCAST),
        SocketOption::ReceiveBufferSize => (SOL_SOCKET, SO_RCVBUF),
        SocketOption::SendBufferSize => (SOL_SOCKET, SO_SNDBUF),
        SocketOption::TimeToLive => match family {
            AddressFamily::Ipv4 => (IPPROTO_IP, IP_TTL),
            AddressFamily::Ipv6 => (IPPROTO_IPV6, IPV6_UNICAST_HOPS),
        },
        SocketOption::MulticastTtl => match family {
            AddressFamily::Ipv4 => (IPPROTO_IP, IP_MULTICAST_TTL),
            AddressFamily::Ipv6 => (IPPROTO_IPV6, IPV6_MULTICAST_HOPS),
        },
        SocketOption::MulticastLoopback => match family {
            AddressFamily::Ipv4 => (IPPROTO_IP, IP_MULTICAST_LOOP),
            AddressFamily::Ipv6 => (IPPROTO_IPV6, IPV6_MULTICAST_LOOP),
        },
        SocketOption::MulticastAddMembership => match family {
            AddressFamily::Ipv4 => (IPPROTO_IP, IP_ADD_MEMBERSHIP),
            AddressFamily::Ipv6 => (IPPROTO_IPV6, IPV6_JOIN_GROUP),
        },
        SocketOption::MulticastDropMembership => match family {
            AddressFamily::Ipv4 => (IPPROTO_IP, IP_DROP_MEMBERSHIP),
            AddressFamily::Ipv6 => (IPPROTO_IPV6, IPV6_LEAVE_GROUP),
        },
    };
    OptionKey { level, option }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_level_options_ignore_family() {
        for option in [
            SocketOption::ReuseAddress,
            SocketOption::ReusePort,
            SocketOption::Broadcast,
            SocketOption::ReceiveBufferSize,
            SocketOption::SendBufferSize,
        ] {
            let v4 = resolve(option, AddressFamily::Ipv4);
            let v6 = resolve(option, AddressFamily::Ipv6);
            assert_eq!(v4, v6);
            assert_eq!(v4.level(), SOL_SOCKET);
        }
    }

    #[test]
    fn test_ip_level_options_follow_family() {
        for option in [
            SocketOption::TimeToLive,
            SocketOption::MulticastTtl,
            SocketOption::MulticastLoopback,
            SocketOption::MulticastAddMembership,
            SocketOption::MulticastDropMembership,
        ] {
            let v4 = resolve(option, AddressFamily::Ipv4);
            let v6 = resolve(option, AddressFamily::Ipv6);
            assert_eq!(v4.level(), IPPROTO_IP);
            assert_eq!(v6.level(), IPPROTO_IPV6);
        }
    }

    #[test]
    fn test_membership_keys() {
        let join = resolve(SocketOption::MulticastAddMembership, AddressFamily::Ipv4);
        assert_eq!((join.level(), join.option()), (IPPROTO_IP, IP_ADD_MEMBERSHIP));

        let leave = resolve(SocketOption::MulticastDropMembership, AddressFamily::Ipv6);
        assert_eq!(
            (leave.level(), leave.option()),
            (IPPROTO_IPV6, IPV6_LEAVE_GROUP)
        );
    }

    #[test]
    fn test_buffer_size_keys() {
        let rcv = resolve(SocketOption::ReceiveBufferSize, AddressFamily::Ipv4);
        assert_eq!((rcv.level(), rcv.option()), (SOL_SOCKET, SO_RCVBUF));

        let snd = resolve(SocketOption::SendBufferSize, AddressFamily::Ipv4);
        assert_eq!((snd.level(), snd.option()), (SOL_SOCKET, SO_SNDBUF));
    }
}
