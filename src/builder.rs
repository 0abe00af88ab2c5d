//! C4: the edge/initial/default builder — creates sockets for edges, IIPs,
//! and default-valued ports, awaiting component readiness first.

use crate::{
	attach::connect_port,
	errors::{AttachError, BuilderError},
	graph::{GraphEdge, GraphEndpoint, GraphInitializer, Metadata},
	ip::{Ip, PacketData},
	labels::{NodeId, SocketId},
	multiplexer::Multiplexer,
	process::ProcessTable,
	registry::SocketRegistry,
	socket::{SocketFactory, SocketMetadata},
};

fn label_from_metadata(metadata: &Metadata) -> Option<String> {
	match metadata.get("label") {
		Some(crate::graph::serde_json_value::Value::String(s)) => Some(s.clone()),
		_ => None,
	}
}

fn is_legacy<D: PacketData>(processes: &ProcessTable<D>, node: &NodeId) -> bool {
	processes
		.get_node(node)
		.and_then(|record| record.component.as_ref())
		.map(|component| component.is_legacy())
		.unwrap_or(false)
}

/// Await the readiness of the component bound to `node`, blocking this
/// builder operation but nothing else (§4.3: "awaits the component's
/// readiness future once and re-attempts").
async fn await_ready<D: PacketData>(
	processes: &mut ProcessTable<D>,
	node: &NodeId,
) -> Result<(), AttachError> {
	let record = processes
		.get_node_mut(node)
		.ok_or_else(|| AttachError::NoSuchNode { node: node.clone() })?;
	let component = record
		.component
		.as_mut()
		.ok_or_else(|| AttachError::NoComponent { node: node.clone() })?;
	if !component.is_ready() {
		component.ready().await;
	}
	Ok(())
}

/// Create a socket for a graph edge, wire both endpoints, and register it.
///
/// Attaches the inbound side first and the outbound side second, so that any
/// synchronous delivery triggered by the outbound attach already has a
/// destination (§4.3).
pub async fn add_edge<D: PacketData>(
	processes: &mut ProcessTable<D>,
	registry: &mut SocketRegistry<D>,
	multiplexer: &mut Multiplexer<D>,
	factory: &dyn SocketFactory<D>,
	edge: GraphEdge,
) -> Result<SocketId, BuilderError> {
	await_ready(processes, &edge.to.node).await?;
	await_ready(processes, &edge.from.node).await?;

	let id = registry.reserve_id();
	let metadata = SocketMetadata {
		label: label_from_metadata(&edge.metadata),
	};
	let mut socket = factory.create(id, metadata);

	connect_port(
		socket.as_mut(),
		processes,
		&edge.to.node,
		&edge.to.port,
		edge.to.index,
		true,
	)?;
	connect_port(
		socket.as_mut(),
		processes,
		&edge.from.node,
		&edge.from.port,
		edge.from.index,
		false,
	)?;

	let legacy = is_legacy(processes, &edge.to.node);
	multiplexer.subscribe_socket(id, edge.to.node.clone(), legacy, socket.subscribe());
	registry.insert(id, socket);
	Ok(id)
}

/// Create a socket for an Initial Information Packet, wire its inbound side,
/// and register both the socket and the pending initial record. The caller
/// (the lifecycle orchestrator) is responsible for deciding whether to fire
/// `send_initials` immediately, since that depends on run-state (§4.3, §4.8).
pub async fn add_initial<D: PacketData>(
	processes: &mut ProcessTable<D>,
	registry: &mut SocketRegistry<D>,
	multiplexer: &mut Multiplexer<D>,
	factory: &dyn SocketFactory<D>,
	initializer: GraphInitializer<D>,
) -> Result<SocketId, BuilderError> {
	await_ready(processes, &initializer.to.node).await?;

	let id = registry.reserve_id();
	let metadata = SocketMetadata {
		label: label_from_metadata(&initializer.metadata),
	};
	let mut socket = factory.create(id, metadata);

	connect_port(
		socket.as_mut(),
		processes,
		&initializer.to.node,
		&initializer.to.port,
		initializer.to.index,
		true,
	)?;

	let legacy = is_legacy(processes, &initializer.to.node);
	multiplexer.subscribe_socket(id, initializer.to.node.clone(), legacy, socket.subscribe());
	registry.insert(id, socket);
	registry.push_initial(id, initializer.data);
	Ok(id)
}

/// For every inport of `node` with a declared default value and no attached
/// socket, create a default-value socket and register it (§4.3).
pub async fn add_defaults<D: PacketData>(
	processes: &mut ProcessTable<D>,
	registry: &mut SocketRegistry<D>,
	multiplexer: &mut Multiplexer<D>,
	factory: &dyn SocketFactory<D>,
	node: &NodeId,
) -> Result<Vec<SocketId>, BuilderError> {
	let port_names = {
		let record = processes
			.get_node(node)
			.ok_or_else(|| BuilderError::NoSuchNode { node: node.clone() })?;
		let component = record
			.component
			.as_ref()
			.ok_or_else(|| BuilderError::NoSuchNode { node: node.clone() })?;
		component.in_ports().names()
	};

	let mut created = Vec::new();
	for port_name in port_names {
		let wants_default = {
			let record = processes.get_node(node).expect("checked above");
			let component = record.component.as_ref().expect("checked above");
			match component.in_ports().get(&port_name) {
				Some(port) => port.has_default() && !port.is_attached(),
				None => false,
			}
		};
		if !wants_default {
			continue;
		}

		let id = registry.reserve_id();
		let mut socket = factory.create(id, SocketMetadata::default());
		connect_port(socket.as_mut(), processes, node, &port_name, None, true)?;

		let legacy = is_legacy(processes, node);
		multiplexer.subscribe_socket(id, node.clone(), legacy, socket.subscribe());
		registry.insert(id, socket);
		registry.defaults.push(id);
		created.push(id);
	}

	Ok(created)
}

/// Shared teardown for `remove_edge`/`remove_initial`: detach the socket
/// bound to `to`, unsubscribe it, and drop it from every registry list.
fn remove_socket_at<D: PacketData>(
	processes: &mut ProcessTable<D>,
	registry: &mut SocketRegistry<D>,
	multiplexer: &mut Multiplexer<D>,
	to: &GraphEndpoint,
) -> Result<(), BuilderError> {
	let id = registry
		.find_by_inbound(&to.node, &to.port, to.index)
		.ok_or_else(|| BuilderError::NoSuchSocket {
			node: to.node.clone(),
			port: to.port.clone(),
		})?;

	if let Some(record) = processes.get_node_mut(&to.node) {
		if let Some(component) = record.component.as_mut() {
			if let Some(port) = component.in_ports_mut().get_mut(&to.port) {
				port.detach(id);
			}
		}
	}

	multiplexer.unsubscribe_socket(id);
	registry.remove(id);
	Ok(())
}

/// Detach and remove the socket carrying the given edge's inbound endpoint.
pub fn remove_edge<D: PacketData>(
	processes: &mut ProcessTable<D>,
	registry: &mut SocketRegistry<D>,
	multiplexer: &mut Multiplexer<D>,
	to: &GraphEndpoint,
) -> Result<(), BuilderError> {
	remove_socket_at(processes, registry, multiplexer, to)
}

/// Detach and remove the socket carrying an IIP, along with its entries in
/// `initials`/`next_initials` (handled by [`SocketRegistry::remove`]).
pub fn remove_initial<D: PacketData>(
	processes: &mut ProcessTable<D>,
	registry: &mut SocketRegistry<D>,
	multiplexer: &mut Multiplexer<D>,
	to: &GraphEndpoint,
) -> Result<(), BuilderError> {
	remove_socket_at(processes, registry, multiplexer, to)
}

/// Build `Ip::data` for an initial delivery, tagged `metadata.initial = true`.
pub(crate) fn initial_ip<D: PacketData>(data: D) -> Ip<D> {
	Ip::new(crate::ip::IpKind::Data, data, crate::ip::IpMetadata::initial())
}
