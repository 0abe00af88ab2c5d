//! C3: the attachment engine — binds one socket endpoint to a port.

use crate::{
	errors::{AttachError, PortDirection},
	ip::PacketData,
	labels::{NodeId, PortName},
	process::ProcessTable,
	socket::{Endpoint, Socket},
};

/// Bind one endpoint of `socket` to the named port of `node`.
///
/// Sets the matching endpoint on the socket (`to` when `inbound`, else
/// `from`), then looks up the port on the component and attaches it. No
/// other side effects (§4.2).
pub fn connect_port<D: PacketData>(
	socket: &mut dyn Socket<D>,
	processes: &mut ProcessTable<D>,
	node: &NodeId,
	port: &PortName,
	index: Option<usize>,
	inbound: bool,
) -> Result<(), AttachError> {
	let endpoint = Endpoint {
		process: node.clone(),
		port: port.clone(),
		index,
	};
	if inbound {
		socket.endpoints_mut().to = Some(endpoint);
	} else {
		socket.endpoints_mut().from = Some(endpoint);
	}

	let record = processes
		.get_node_mut(node)
		.ok_or_else(|| AttachError::NoSuchNode { node: node.clone() })?;
	let component = record
		.component
		.as_mut()
		.ok_or_else(|| AttachError::NoComponent { node: node.clone() })?;

	let direction = if inbound {
		PortDirection::In
	} else {
		PortDirection::Out
	};
	let port_set = if inbound {
		component.in_ports_mut()
	} else {
		component.out_ports_mut()
	};
	let port_ref = port_set
		.get_mut(port)
		.ok_or_else(|| AttachError::NoSuchPort {
			node: node.clone(),
			port: port.clone(),
			direction,
		})?;

	let addressable = port_ref.is_addressable();
	if addressable != index.is_some() {
		return Err(AttachError::AddressabilityMismatch {
			node: node.clone(),
			port: port.clone(),
			addressable,
			index_given: index.is_some(),
		});
	}

	port_ref.attach(socket.id(), index);
	Ok(())
}
