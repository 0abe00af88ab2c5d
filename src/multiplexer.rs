//! C5: the event multiplexer — the start-buffer, legacy event synthesis,
//! and the registries of socket/component/subgraph sources the coordinator
//! polls on every drive tick.

use std::collections::BTreeMap;

use tokio::sync::broadcast;

use crate::{
	errors::MultiplexError,
	events::{ComponentEvent, NetworkEvent, SocketEvent},
	ip::{IpKind, PacketData},
	labels::{NodeId, SocketId},
};

/// A registered socket source: where its events came from, and whether it
/// participates in legacy open-connection accounting.
struct SocketSource<D> {
	id: SocketId,
	node: NodeId,
	legacy: bool,
	receiver: broadcast::Receiver<SocketEvent<D>>,
}

/// A registered component-activity source.
struct NodeSource {
	node: NodeId,
	receiver: broadcast::Receiver<ComponentEvent>,
}

/// A registered subgraph source: the inner network's external event stream,
/// tagged with the node id of the component that embeds it.
struct SubgraphSource<D> {
	node: NodeId,
	receiver: async_broadcast::Receiver<NetworkEvent<D>>,
}

/// One polled-off event, tagged with enough context for the coordinator to
/// react (quiescence bookkeeping, subgraph tagging, escalation).
pub(crate) enum MultiplexedEvent<D> {
	/// A socket produced an IP, a transport error, or a connect/disconnect.
	Socket {
		socket: SocketId,
		node: NodeId,
		legacy: bool,
		event: SocketEvent<D>,
	},
	/// A component reported an activity change.
	Node { node: NodeId, event: ComponentEvent },
	/// A subgraph's inner network produced an external event, not yet re-tagged.
	Subgraph { node: NodeId, event: NetworkEvent<D> },
}

/// The start-buffer, legacy-synthesis rules, and source registries (C5).
pub struct Multiplexer<D: PacketData> {
	external: async_broadcast::Sender<NetworkEvent<D>>,
	_inactive: async_broadcast::InactiveReceiver<NetworkEvent<D>>,
	buffer: Vec<NetworkEvent<D>>,
	sockets: Vec<SocketSource<D>>,
	nodes: Vec<NodeSource>,
	subgraphs: Vec<SubgraphSource<D>>,
	/// Legacy per-node open-connection counters, maintained from `Connect`/`Disconnect`.
	open_connections: BTreeMap<NodeId, u32>,
}

impl<D: PacketData> Multiplexer<D> {
	/// A fresh multiplexer with the given external channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (mut external, receiver) = async_broadcast::broadcast(capacity.max(1));
		external.set_overflow(true);
		Self {
			external,
			_inactive: receiver.deactivate(),
			buffer: Vec::new(),
			sockets: Vec::new(),
			nodes: Vec::new(),
			subgraphs: Vec::new(),
			open_connections: BTreeMap::new(),
		}
	}

	/// Subscribe an external consumer to the coordinator's event stream.
	pub fn subscribe(&self) -> async_broadcast::Receiver<NetworkEvent<D>> {
		self.external.new_receiver()
	}

	/// Whether any external consumer is currently subscribed.
	pub fn has_listener(&self) -> bool {
		self.external.receiver_count() > 0
	}

	/// Register a socket as an event source (§4.5, "socket subscription").
	pub(crate) fn subscribe_socket(
		&mut self,
		id: SocketId,
		node: NodeId,
		legacy: bool,
		receiver: broadcast::Receiver<SocketEvent<D>>,
	) {
		self.sockets.push(SocketSource {
			id,
			node,
			legacy,
			receiver,
		});
	}

	/// Stop polling a single socket's source (used by `remove_edge`/`remove_initial`).
	pub(crate) fn unsubscribe_socket(&mut self, id: SocketId) {
		self.sockets.retain(|s| s.id != id);
	}

	/// Register a component as an activity source (§4.5, "node subscription").
	pub(crate) fn subscribe_node(&mut self, node: NodeId, receiver: broadcast::Receiver<ComponentEvent>) {
		self.nodes.push(NodeSource { node, receiver });
	}

	/// Register a subgraph's inner network as an event source (§4.5, "subgraph
	/// subscription"). Events drained from it are re-tagged by the caller
	/// before being re-emitted.
	pub(crate) fn subscribe_subgraph(
		&mut self,
		node: NodeId,
		receiver: async_broadcast::Receiver<NetworkEvent<D>>,
	) {
		self.subgraphs.push(SubgraphSource { node, receiver });
	}

	/// Drain every currently-pending event from every registered source.
	/// Non-blocking: a source with nothing pending is simply skipped.
	pub(crate) fn poll(&mut self) -> Vec<MultiplexedEvent<D>> {
		let mut drained = Vec::new();

		for source in &mut self.sockets {
			loop {
				match source.receiver.try_recv() {
					Ok(event) => drained.push(MultiplexedEvent::Socket {
						socket: source.id,
						node: source.node.clone(),
						legacy: source.legacy,
						event,
					}),
					Err(broadcast::error::TryRecvError::Empty) => break,
					Err(broadcast::error::TryRecvError::Closed) => break,
					Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
				}
			}
		}

		for source in &mut self.nodes {
			loop {
				match source.receiver.try_recv() {
					Ok(event) => drained.push(MultiplexedEvent::Node {
						node: source.node.clone(),
						event,
					}),
					Err(broadcast::error::TryRecvError::Empty) => break,
					Err(broadcast::error::TryRecvError::Closed) => break,
					Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
				}
			}
		}

		for source in &mut self.subgraphs {
			loop {
				match source.receiver.try_recv() {
					Ok(event) => drained.push(MultiplexedEvent::Subgraph {
						node: source.node.clone(),
						event,
					}),
					Err(async_broadcast::TryRecvError::Empty) => break,
					Err(async_broadcast::TryRecvError::Closed) => break,
					Err(async_broadcast::TryRecvError::Overflowed(_)) => continue,
				}
			}
		}

		drained
	}

	/// Record a legacy `Connect`/`Disconnect`, returning the node's new
	/// open-connection count.
	pub(crate) fn record_legacy_connect(&mut self, node: &NodeId) -> u32 {
		let counter = self.open_connections.entry(node.clone()).or_insert(0);
		*counter += 1;
		*counter
	}

	/// See [`Multiplexer::record_legacy_connect`].
	pub(crate) fn record_legacy_disconnect(&mut self, node: &NodeId) -> u32 {
		let counter = self.open_connections.entry(node.clone()).or_insert(0);
		*counter = counter.saturating_sub(1);
		*counter
	}

	/// Apply the buffered-emission rule (§4.5) and hand the event to the
	/// external channel. `started` reflects the run-state at the moment of
	/// the call.
	pub(crate) fn buffered_emit(
		&mut self,
		event: NetworkEvent<D>,
		started: bool,
	) -> Result<(), MultiplexError> {
		let is_start = matches!(event, NetworkEvent::Start { .. });

		if !event.bypasses_buffer() && !started && !is_start {
			self.buffer.push(event);
			return Ok(());
		}

		self.emit_now(event)?;

		if is_start {
			let pending = std::mem::take(&mut self.buffer);
			for buffered in pending {
				self.emit_now(buffered)?;
			}
		}

		Ok(())
	}

	/// Emit an event immediately, bypassing the start-buffer, synthesizing
	/// legacy `BeginGroup`/`EndGroup`/`Data` events for `Ip` events, and
	/// escalating `ProcessError`s with nobody subscribed.
	fn emit_now(&mut self, event: NetworkEvent<D>) -> Result<(), MultiplexError> {
		if let NetworkEvent::ProcessError { node, message, .. } = &event {
			if !self.has_listener() {
				return Err(MultiplexError::Unhandled {
					node: node.clone(),
					message: message.clone(),
				});
			}
		}

		let legacy = match &event {
			NetworkEvent::Ip {
				socket, kind, data, ..
			} => Some(match kind {
				IpKind::OpenBracket => NetworkEvent::BeginGroup { socket: *socket },
				IpKind::CloseBracket => NetworkEvent::EndGroup { socket: *socket },
				IpKind::Data => NetworkEvent::Data {
					socket: *socket,
					data: data.clone(),
				},
			}),
			_ => None,
		};

		let _ = self.external.try_broadcast(event);
		if let Some(legacy_event) = legacy {
			let _ = self.external.try_broadcast(legacy_event);
		}
		Ok(())
	}

	/// Clear the start-buffer (used when (re)starting, §4.8).
	pub(crate) fn clear_buffer(&mut self) {
		self.buffer.clear();
	}

	/// Propagate a debug-mode change into every subgraph source's parent tag
	/// bookkeeping is a no-op here; subgraph debug propagation itself walks
	/// component instances directly (see `NetworkCoordinator::set_debug`).
	pub(crate) fn subgraph_nodes(&self) -> impl Iterator<Item = &NodeId> {
		self.subgraphs.iter().map(|s| &s.node)
	}
}
