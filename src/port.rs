//! The port contract a [`crate::Component`] exposes on each of its inports/outports.

use crate::labels::{PortName, SocketId};

/// A single named port on a component.
///
/// Addressable ports expose indexed slots (array ports in FBP terms); plain
/// ports accept at most the sockets their component chooses to allow (the
/// coordinator does not itself enforce a single-socket limit on non-addressable
/// inports — the default-suppression rule in §4.3/§4.8 only cares whether more
/// than one socket is attached at default-send time).
pub trait Port<D>: Send + Sync {
	/// This port's name.
	fn name(&self) -> &PortName;

	/// Whether this port is addressable (array-valued).
	fn is_addressable(&self) -> bool;

	/// Attach a socket to this port. `index` must be `Some` iff
	/// [`Port::is_addressable`] is true.
	fn attach(&mut self, socket: SocketId, index: Option<usize>);

	/// Detach a previously-attached socket.
	fn detach(&mut self, socket: SocketId);

	/// Whether this port declares a default value.
	fn has_default(&self) -> bool;

	/// The port's default value, if any.
	fn default_value(&self) -> Option<D>;

	/// Whether at least one socket is currently attached.
	fn is_attached(&self) -> bool {
		!self.attached_sockets().is_empty()
	}

	/// All sockets currently attached to this port.
	fn attached_sockets(&self) -> &[SocketId];
}

/// The set of named ports (inports or outports) a component exposes.
pub trait PortSet<D>: Send + Sync {
	/// Look up a port by name.
	fn get(&self, name: &PortName) -> Option<&dyn Port<D>>;

	/// Look up a port by name, mutably.
	fn get_mut(&mut self, name: &PortName) -> Option<&mut dyn Port<D>>;

	/// Iterate over every port name in this set.
	fn names(&self) -> Vec<PortName>;
}
