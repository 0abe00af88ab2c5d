//! Event payloads exchanged between sockets, components, and the coordinator.

use std::time::{Duration, Instant};

use crate::{
	ip::{IpKind, IpMetadata},
	labels::{NodeId, SocketId},
};

/// Events a [`crate::Socket`] emits over its own lifetime.
#[derive(Debug, Clone)]
pub enum SocketEvent<D> {
	/// An IP was delivered across this socket.
	Ip {
		/// The kind of packet delivered.
		kind: IpKind,
		/// The packet's payload.
		data: D,
		/// The packet's metadata.
		metadata: IpMetadata,
	},
	/// A transport-level error occurred on this socket.
	Error(String),
	/// The socket became connected.
	Connect,
	/// The socket became disconnected.
	Disconnect,
}

/// Events a [`crate::Component`] emits about its own activity.
#[derive(Debug, Clone)]
pub enum ComponentEvent {
	/// The component's load increased above zero (or another activation
	/// happened while already active).
	Activate(u32),
	/// The component's load changed; carries the new load.
	Deactivate(u32),
	/// The component's icon changed.
	Icon(Option<String>),
}

/// An event emitted by a [`crate::NetworkCoordinator`] to external subscribers.
#[derive(Debug, Clone)]
pub enum NetworkEvent<D> {
	/// The network started.
	Start {
		/// The instant the network started at.
		start: Instant,
	},
	/// The network stopped (reached quiescence or was stopped explicitly).
	End {
		/// The instant the network started at.
		start: Instant,
		/// The instant the network stopped at.
		end: Instant,
		/// `end - start`.
		uptime: Duration,
	},
	/// An IP was observed travelling across some socket in the network.
	Ip {
		/// The socket the IP travelled across.
		socket: SocketId,
		/// The kind of packet.
		kind: IpKind,
		/// The packet's payload.
		data: D,
		/// The packet's metadata (includes `initial`, not `subgraph`: that is
		/// carried in this event's own `subgraph` field).
		metadata: IpMetadata,
		/// Subgraph provenance, outermost node id first.
		subgraph: Vec<NodeId>,
	},
	/// A component raised a runtime error.
	ProcessError {
		/// The node that raised the error.
		node: NodeId,
		/// A human-readable description.
		message: String,
		/// Subgraph provenance, outermost node id first.
		subgraph: Vec<NodeId>,
	},
	/// A component's icon changed.
	Icon {
		/// The node whose icon changed.
		node: NodeId,
		/// The new icon, if any.
		icon: Option<String>,
	},
	/// Legacy synthesis of [`IpKind::OpenBracket`].
	BeginGroup {
		/// The socket the IP travelled across.
		socket: SocketId,
	},
	/// Legacy synthesis of [`IpKind::CloseBracket`].
	EndGroup {
		/// The socket the IP travelled across.
		socket: SocketId,
	},
	/// Legacy synthesis of [`IpKind::Data`].
	Data {
		/// The socket the IP travelled across.
		socket: SocketId,
		/// The packet's payload.
		data: D,
	},
}

impl<D> NetworkEvent<D> {
	/// Certain event kinds bypass the start-buffer entirely: they are always
	/// emitted immediately, per §4.5.
	pub(crate) fn bypasses_buffer(&self) -> bool {
		matches!(
			self,
			Self::Icon { .. } | Self::ProcessError { .. } | Self::End { .. }
		)
	}
}
