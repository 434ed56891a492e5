//! The [`Signal`] type: ordered, re-entrancy-safe slot dispatch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

/// Unique identifier for a signal-slot connection.
///
/// Returned by [`Signal::connect`] and [`Signal::connect_once`]; pass it to
/// [`Signal::disconnect`] to remove that listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Internal storage for a single connection.
struct Connection<Args> {
    id: ConnectionId,
    slot: Arc<dyn Fn(&Args) + Send + Sync>,
    /// Remove this connection after its first invocation.
    once: bool,
}

/// A type-safe signal with ordered listener invocation.
///
/// Connected slots are invoked in connection order every time the signal is
/// emitted. Slots connected with [`connect_once`](Self::connect_once) are
/// removed before their single invocation, so a slot that re-emits the same
/// signal cannot fire itself again.
///
/// # Type Parameter
///
/// - `Args`: the argument type passed to slots by reference. Use `()` for
///   signals without arguments.
///
/// # Thread Safety
///
/// `Signal<Args>` is `Send + Sync`; it can be emitted from any thread, and
/// slots always run on the emitting thread. Slots are invoked outside the
/// signal's internal lock, so they may connect, disconnect, or emit freely.
///
/// # Example
///
/// ```
/// use gramsock_events::Signal;
///
/// let signal = Signal::<i32>::new();
/// signal.connect(|n| println!("got {}", n));
/// signal.emit(42);
/// ```
pub struct Signal<Args> {
    /// Active connections, in connection order.
    connections: Mutex<Vec<Connection<Args>>>,
    /// Whether emission is temporarily suppressed.
    blocked: AtomicBool,
}

impl<Args: 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: 'static> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// The slot is invoked on every emission, after all slots connected
    /// before it. Returns a [`ConnectionId`] for later disconnection.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.attach(Arc::new(slot), false)
    }

    /// Connect a slot that is invoked at most once.
    ///
    /// The connection is removed before the slot runs, so re-entrant
    /// emission from inside the slot cannot invoke it a second time.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    /// use gramsock_events::Signal;
    ///
    /// let signal = Signal::<()>::new();
    /// let calls = Arc::new(AtomicUsize::new(0));
    ///
    /// let calls_clone = calls.clone();
    /// signal.connect_once(move |_| {
    ///     calls_clone.fetch_add(1, Ordering::SeqCst);
    /// });
    ///
    /// signal.emit(());
    /// signal.emit(());
    /// assert_eq!(calls.load(Ordering::SeqCst), 1);
    /// ```
    pub fn connect_once<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.attach(Arc::new(slot), true)
    }

    fn attach(&self, slot: Arc<dyn Fn(&Args) + Send + Sync>, once: bool) -> ConnectionId {
        let id = ConnectionId::new();
        self.connections.lock().push(Connection { id, slot, once });
        id
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.lock();
        match connections.iter().position(|conn| conn.id == id) {
            Some(index) => {
                connections.remove(index);
                true
            }
            None => false,
        }
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Suppress or restore emission.
    ///
    /// While blocked, `emit` does nothing; connections are unaffected.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check whether emission is currently suppressed.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots in connection order.
    ///
    /// Once-connections are removed before their slot runs. The slots to
    /// invoke are snapshotted under the lock and called after it is
    /// released, so a slot observing this emission sees the connection list
    /// as it was when the emission started.
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: "gramsock_events::signal", "signal blocked, skipping emit");
            return;
        }

        let slots: Vec<Arc<dyn Fn(&Args) + Send + Sync>> = {
            let mut connections = self.connections.lock();
            let slots = connections.iter().map(|conn| conn.slot.clone()).collect();
            connections.retain(|conn| !conn.once);
            slots
        };

        tracing::trace!(
            target: "gramsock_events::signal",
            slot_count = slots.len(),
            "emitting signal"
        );

        for slot in slots {
            slot(&args);
        }
    }
}
