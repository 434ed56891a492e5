//! Signal/slot event dispatch for gramsock.
//!
//! This crate provides the event-stream component that `gramsock` sockets
//! compose: a type-safe [`Signal`] with ordered listener invocation and
//! once-style listeners.
//!
//! # Guarantees
//!
//! - Listeners are invoked in the order they were connected.
//! - A listener connected with [`Signal::connect_once`] fires at most once
//!   and is removed before it is invoked, so re-entrant emission cannot
//!   fire it twice.
//! - Slots run outside the signal's internal lock: a listener may connect,
//!   disconnect, or emit freely from inside its own invocation.
//!
//! # Example
//!
//! ```
//! use gramsock_events::Signal;
//!
//! let received = Signal::<String>::new();
//!
//! let id = received.connect(|text| {
//!     println!("got: {}", text);
//! });
//!
//! received.emit("hello".to_string());
//! received.disconnect(id);
//! ```

mod signal;

pub use signal::{ConnectionId, Signal};
