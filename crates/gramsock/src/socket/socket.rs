//! UDP socket with signal-based event delivery.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::config::UdpSocketConfig;
use super::events::SocketEvents;
use super::state::SocketState;
use crate::driver::{AddressFamily, DatagramDriver, Endpoint, SocketHandle, SystemDriver};
use crate::error::{Result, SocketError};
use crate::options::{self, OptionValue, SocketOption};

/// A UDP socket with signal-based event delivery.
///
/// The socket owns one native handle for its whole life and walks a
/// forward-only lifecycle: unbound → bound → closed. Binding starts a
/// receive loop that turns the driver's one-shot async receive into a
/// stream of `message`/`error` signals; closing stops the loop, releases
/// the handle, and emits `closed` exactly once. A bound socket emits all
/// of its signals from that receive-loop task, so listeners always
/// observe them in one order.
///
/// # Signals
///
/// All signals live on [`events`](Self::events):
///
/// - `listening`: emitted once per successful bind, before any message
/// - `message`: emitted for every received [`Datagram`](crate::Datagram)
/// - `error`: emitted for non-terminal failures, such as receive errors
/// - `closed`: emitted exactly once, when the socket closes
///
/// # Example
///
/// ```ignore
/// let socket = UdpSocket::new(UdpSocketConfig::udp4())?;
///
/// socket.events.message.connect(|datagram| {
///     println!("{} bytes from {}", datagram.data.len(), datagram.source);
/// });
///
/// socket.bind(8080)?;
/// socket.send_to(b"hello", "127.0.0.1".parse()?, 9000)?;
/// socket.close();
/// ```
///
/// # Runtime
///
/// [`bind`](Self::bind) registers the socket with the tokio reactor and
/// spawns the receive loop, so it must be called within a tokio runtime.
pub struct UdpSocket<D: DatagramDriver = SystemDriver> {
    config: UdpSocketConfig,
    driver: Arc<D>,
    handle: SocketHandle,
    state: Mutex<SocketState>,
    /// True while the receive loop may emit; cleared by `close` before
    /// the loop is told to stop, so in-flight results are discarded.
    receiving: Arc<AtomicBool>,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,

    /// The socket's signals.
    pub events: Arc<SocketEvents>,
}

impl UdpSocket {
    /// Create a socket backed by the operating system's UDP sockets.
    ///
    /// Allocates the native handle immediately; there is no socket
    /// without one.
    pub fn new(config: UdpSocketConfig) -> Result<Self> {
        Self::with_driver(config, Arc::new(SystemDriver::new()))
    }
}

impl<D: DatagramDriver> UdpSocket<D> {
    /// Create a socket on a caller-supplied driver.
    ///
    /// Sockets sharing a driver share nothing else; each owns its handle
    /// exclusively.
    pub fn with_driver(config: UdpSocketConfig, driver: Arc<D>) -> Result<Self> {
        let handle = driver.create(config.family)?;
        tracing::debug!(
            target: "gramsock::socket",
            %handle,
            family = %config.family,
            "socket created"
        );
        Ok(Self {
            config,
            driver,
            handle,
            state: Mutex::new(SocketState::Unbound),
            receiving: Arc::new(AtomicBool::new(false)),
            stop_tx: Mutex::new(None),
            events: Arc::new(SocketEvents::new()),
        })
    }

    /// Get the current lifecycle state.
    pub fn state(&self) -> SocketState {
        *self.state.lock()
    }

    /// Check if the socket is bound.
    pub fn is_bound(&self) -> bool {
        self.state().is_bound()
    }

    /// The address family the socket was created for.
    pub fn family(&self) -> AddressFamily {
        self.config.family
    }

    /// The native handle backing this socket.
    pub fn handle(&self) -> SocketHandle {
        self.handle
    }

    /// The locally bound endpoint.
    ///
    /// Before a successful bind (and after close) this is the family's
    /// zero endpoint: the unspecified address and port 0.
    pub fn local_addr(&self) -> Endpoint {
        if self.state().is_bound() {
            match self.driver.local_name(self.handle) {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    tracing::warn!(
                        target: "gramsock::socket",
                        handle = %self.handle,
                        %err,
                        "failed to read local address"
                    );
                    Endpoint::unspecified(self.config.family)
                }
            }
        } else {
            Endpoint::unspecified(self.config.family)
        }
    }

    /// Bind to the family's unspecified address on `port`.
    ///
    /// Port 0 requests an ephemeral port; read it back with
    /// [`local_addr`](Self::local_addr) once `listening` has fired.
    pub fn bind(&self, port: u16) -> Result<()> {
        self.bind_to(self.config.family.unspecified_address(), port)
    }

    /// Bind to a specific local address and port.
    ///
    /// Applies the configured reuse flags, binds the native socket, and
    /// starts the receive loop; the loop emits `listening` before its
    /// first receive, so it precedes every `message`/`error` of this
    /// bind. Fails with [`SocketError::AlreadyBound`] if the socket is
    /// not unbound; on any native failure the socket stays unbound and
    /// remains usable.
    pub fn bind_to(&self, address: IpAddr, port: u16) -> Result<()> {
        let mut state = self.state.lock();
        if !state.is_unbound() {
            return Err(SocketError::AlreadyBound);
        }
        if !self.config.family.accepts(&address) {
            return Err(SocketError::InvalidAddress(format!(
                "{} is not an {} address",
                address, self.config.family
            )));
        }

        // Reuse flags go on the raw socket before the native bind.
        if self.config.reuse_address {
            self.set_int_option(SocketOption::ReuseAddress, 1)?;
        }
        if self.config.reuse_port {
            self.set_int_option(SocketOption::ReusePort, 1)?;
        }
        self.driver.bind(self.handle, address, port)?;

        *state = SocketState::Bound;
        *self.stop_tx.lock() = Some(self.start_receive_loop());
        drop(state);

        tracing::debug!(
            target: "gramsock::socket",
            handle = %self.handle,
            %address,
            port,
            "socket bound"
        );
        Ok(())
    }

    /// Send one datagram to `address:port`.
    ///
    /// Valid in any state before close: UDP is connectionless, and an
    /// unbound socket is bound to an ephemeral port by the OS on first
    /// send. After close this fails with [`SocketError::InvalidHandle`].
    pub fn send_to(&self, data: &[u8], address: IpAddr, port: u16) -> Result<()> {
        self.driver.send(self.handle, address, port, data)
    }

    /// Close the socket.
    ///
    /// Stops the receive loop (a receive already in flight is discarded,
    /// never emitted) and releases the native handle. `closed` is emitted
    /// exactly once and is always the last signal: the receive loop emits
    /// it after it stops, or `close` emits it directly when no loop was
    /// ever started. Closing an already-closed socket does nothing.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.is_closed() {
                return;
            }
            *state = SocketState::Closed;
        }

        self.receiving.store(false, Ordering::SeqCst);
        let stop_tx = self.stop_tx.lock().take();

        if let Err(err) = self.driver.close(self.handle) {
            tracing::warn!(
                target: "gramsock::socket",
                handle = %self.handle,
                %err,
                "native close failed"
            );
        }
        tracing::debug!(target: "gramsock::socket", handle = %self.handle, "socket closed");

        match stop_tx {
            // The loop emits `closed` once it observes the stop, after any
            // emission already in flight.
            Some(stop_tx) => {
                let _ = stop_tx.send(());
            }
            None => self.events.closed.emit(()),
        }
    }

    /// Enable or disable sending to broadcast addresses.
    pub fn set_broadcast(&self, enabled: bool) -> Result<()> {
        self.set_int_option(SocketOption::Broadcast, i32::from(enabled))
    }

    /// Set the unicast hop limit.
    pub fn set_ttl(&self, ttl: u32) -> Result<()> {
        self.set_int_option(
            SocketOption::TimeToLive,
            i32::try_from(ttl).unwrap_or(i32::MAX),
        )
    }

    /// Set the multicast hop limit.
    pub fn set_multicast_ttl(&self, ttl: u32) -> Result<()> {
        self.set_int_option(
            SocketOption::MulticastTtl,
            i32::try_from(ttl).unwrap_or(i32::MAX),
        )
    }

    /// Control whether outgoing multicast loops back to the local host.
    pub fn set_multicast_loopback(&self, enabled: bool) -> Result<()> {
        self.set_int_option(SocketOption::MulticastLoopback, i32::from(enabled))
    }

    /// Set the kernel receive buffer size in bytes.
    ///
    /// Sizes beyond `i32::MAX` saturate to `i32::MAX`, the widest value
    /// the native option accepts.
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<()> {
        self.set_int_option(
            SocketOption::ReceiveBufferSize,
            i32::try_from(size).unwrap_or(i32::MAX),
        )
    }

    /// Read the kernel receive buffer size in bytes.
    ///
    /// Kernels may report more than was requested.
    pub fn recv_buffer_size(&self) -> Result<usize> {
        self.get_int_option(SocketOption::ReceiveBufferSize)
            .map(|size| size as usize)
    }

    /// Set the kernel send buffer size in bytes.
    ///
    /// Sizes beyond `i32::MAX` saturate to `i32::MAX`.
    pub fn set_send_buffer_size(&self, size: usize) -> Result<()> {
        self.set_int_option(
            SocketOption::SendBufferSize,
            i32::try_from(size).unwrap_or(i32::MAX),
        )
    }

    /// Read the kernel send buffer size in bytes.
    pub fn send_buffer_size(&self) -> Result<usize> {
        self.get_int_option(SocketOption::SendBufferSize)
            .map(|size| size as usize)
    }

    /// Join a multicast group, optionally scoped to a local interface.
    ///
    /// For IPv6 the interface, if given, must be the unspecified address;
    /// concrete interface addresses cannot be mapped to the interface
    /// index IPv6 membership requires.
    pub fn add_membership(&self, group: IpAddr, interface: Option<IpAddr>) -> Result<()> {
        let key = options::resolve(SocketOption::MulticastAddMembership, self.config.family);
        self.driver
            .set_option(self.handle, key, OptionValue::Membership { group, interface })
    }

    /// Leave a multicast group joined with [`add_membership`](Self::add_membership).
    pub fn drop_membership(&self, group: IpAddr, interface: Option<IpAddr>) -> Result<()> {
        let key = options::resolve(SocketOption::MulticastDropMembership, self.config.family);
        self.driver
            .set_option(self.handle, key, OptionValue::Membership { group, interface })
    }

    fn set_int_option(&self, option: SocketOption, value: i32) -> Result<()> {
        let key = options::resolve(option, self.config.family);
        self.driver
            .set_option(self.handle, key, OptionValue::Int(value))
    }

    fn get_int_option(&self, option: SocketOption) -> Result<i32> {
        let key = options::resolve(option, self.config.family);
        self.driver.get_option(self.handle, key)
    }

    /// Spawn the receive loop task and return its stop handle.
    ///
    /// The task is the sole emitter for a bound socket: it emits
    /// `listening` before its first receive, each outcome as a `message`
    /// or `error` signal, and `closed` after it stops, so listeners see
    /// every signal in one order. It keeps exactly one receive in flight
    /// and yields between iterations so a busy socket cannot starve the
    /// runtime. An error outcome does not stop the loop; only the stop
    /// handle (or the receiving flag) does.
    fn start_receive_loop(&self) -> oneshot::Sender<()> {
        let driver = self.driver.clone();
        let handle = self.handle;
        let receiving = self.receiving.clone();
        let events = self.events.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        receiving.store(true, Ordering::SeqCst);
        tokio::spawn(async move {
            tracing::debug!(target: "gramsock::socket", %handle, "receive loop started");
            events.listening.emit(());
            loop {
                if !receiving.load(Ordering::SeqCst) {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    result = driver.receive_one(handle) => {
                        // A result that arrives after close is discarded,
                        // not emitted.
                        if !receiving.load(Ordering::SeqCst) {
                            break;
                        }
                        match result {
                            Ok(datagram) => events.message.emit(datagram),
                            Err(err) => events.error.emit(err),
                        }
                    }
                }
                tokio::task::yield_now().await;
            }
            receiving.store(false, Ordering::SeqCst);
            events.closed.emit(());
            tracing::debug!(target: "gramsock::socket", %handle, "receive loop stopped");
        });
        stop_tx
    }
}

impl<D: DatagramDriver> Drop for UdpSocket<D> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<D: DatagramDriver> fmt::Debug for UdpSocket<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpSocket")
            .field("handle", &self.handle)
            .field("family", &self.config.family)
            .field("state", &self.state())
            .finish()
    }
}
