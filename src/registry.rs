//! C2: the socket registry — live sockets, default-value sockets, and the
//! two initial-packet lists (`initials`/`next_initials`).

use std::collections::BTreeMap;

use crate::{
	ip::PacketData,
	labels::{NodeId, PortName, SocketId},
	socket::Socket,
};

/// A pending (or already-sent) Initial Information Packet.
pub struct InitialRecord<D> {
	/// The socket carrying this IIP.
	pub socket: SocketId,
	/// The payload to deliver.
	pub data: D,
}

impl<D: Clone> Clone for InitialRecord<D> {
	fn clone(&self) -> Self {
		Self {
			socket: self.socket,
			data: self.data.clone(),
		}
	}
}

/// Owns every live socket, the default-value sockets, and the two IIP lists.
pub struct SocketRegistry<D: PacketData> {
	sockets: BTreeMap<SocketId, Box<dyn Socket<D>>>,
	next_id: usize,

	/// Sockets created by `add_defaults`, in creation order.
	pub(crate) defaults: Vec<SocketId>,

	/// IIPs due to be sent on the next `send_initials`; drained to empty
	/// once sent.
	pub(crate) initials: Vec<InitialRecord<D>>,

	/// IIPs preserved across restarts; `initials` is refreshed from this
	/// list at the start of every `start()` (§4.8).
	pub(crate) next_initials: Vec<InitialRecord<D>>,
}

impl<D: PacketData> SocketRegistry<D> {
	/// An empty registry.
	pub fn new() -> Self {
		Self {
			sockets: BTreeMap::new(),
			next_id: 0,
			defaults: Vec::new(),
			initials: Vec::new(),
			next_initials: Vec::new(),
		}
	}

	/// Reserve the next socket id without inserting a socket yet. Used so a
	/// socket implementation can be constructed already knowing its id.
	pub fn reserve_id(&mut self) -> SocketId {
		let id = SocketId(self.next_id);
		self.next_id += 1;
		id
	}

	/// Register a socket under a previously-reserved id.
	pub fn insert(&mut self, id: SocketId, socket: Box<dyn Socket<D>>) {
		self.sockets.insert(id, socket);
	}

	/// Look up a socket by id.
	pub fn get(&self, id: SocketId) -> Option<&dyn Socket<D>> {
		self.sockets.get(&id).map(|b| b.as_ref())
	}

	/// Look up a socket by id, mutably.
	pub fn get_mut(&mut self, id: SocketId) -> Option<&mut Box<dyn Socket<D>>> {
		self.sockets.get_mut(&id)
	}

	/// Remove a socket from the registry (used by `remove_edge`/`remove_initial`).
	pub fn remove(&mut self, id: SocketId) -> Option<Box<dyn Socket<D>>> {
		self.defaults.retain(|s| *s != id);
		self.initials.retain(|r| r.socket != id);
		self.next_initials.retain(|r| r.socket != id);
		self.sockets.remove(&id)
	}

	/// Iterate over every live socket.
	pub fn iter(&self) -> impl Iterator<Item = (&SocketId, &Box<dyn Socket<D>>)> {
		self.sockets.iter()
	}

	/// Iterate over every live socket, mutably.
	pub fn iter_mut(&mut self) -> impl Iterator<Item = (&SocketId, &mut Box<dyn Socket<D>>)> {
		self.sockets.iter_mut()
	}

	/// Find the id of the socket whose `to` endpoint matches the given
	/// node/port/index (used by `remove_edge`/`remove_initial`).
	pub fn find_by_inbound(
		&self,
		node: &NodeId,
		port: &PortName,
		index: Option<usize>,
	) -> Option<SocketId> {
		self.sockets.iter().find_map(|(id, socket)| {
			let to = socket.endpoints().to.as_ref()?;
			if &to.process == node && &to.port == port && to.index == index {
				Some(*id)
			} else {
				None
			}
		})
	}

	/// How many sockets are currently attached to the given inport.
	pub fn count_attached_to(&self, node: &NodeId, port: &PortName) -> usize {
		self.sockets
			.values()
			.filter(|socket| {
				socket
					.endpoints()
					.to
					.as_ref()
					.is_some_and(|to| &to.process == node && &to.port == port)
			})
			.count()
	}

	/// Push a freshly-created IIP socket onto both `initials` and
	/// `next_initials`, per `add_initial` (§4.3).
	pub fn push_initial(&mut self, socket: SocketId, data: D) {
		self.initials.push(InitialRecord {
			socket,
			data: data.clone(),
		});
		self.next_initials.push(InitialRecord { socket, data });
	}

	/// Refresh `initials` from `next_initials`, ready for a `start()` (§4.8).
	pub fn refresh_initials(&mut self) {
		self.initials = self.next_initials.clone();
	}

	/// Drain every pending initial, emptying `initials`.
	pub fn drain_initials(&mut self) -> Vec<InitialRecord<D>> {
		std::mem::take(&mut self.initials)
	}
}

impl<D: PacketData> Default for SocketRegistry<D> {
	fn default() -> Self {
		Self::new()
	}
}
