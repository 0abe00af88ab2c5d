//! The socket contract: ordered point-to-point delivery of IPs between two ports.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
	errors::AttachError,
	events::SocketEvent,
	ip::{Ip, PacketData},
	labels::{NodeId, PortName, SocketId},
};

/// One endpoint of a socket: a process, a port on it, and (for addressable
/// ports) an index into that port.
#[derive(Debug, Clone)]
pub struct Endpoint {
	/// The process this endpoint binds to.
	pub process: NodeId,
	/// The port on that process.
	pub port: PortName,
	/// The index into the port, if it is addressable.
	pub index: Option<usize>,
}

/// The two endpoints of a socket. `from` is absent for IIP and default-value
/// carriers, which have no upstream outport.
#[derive(Debug, Clone, Default)]
pub struct SocketEndpoints {
	/// The upstream (outport) endpoint, if any.
	pub from: Option<Endpoint>,
	/// The downstream (inport) endpoint.
	pub to: Option<Endpoint>,
}

/// Free-form metadata attached to a socket at creation time (carried over
/// from the originating graph edge/initializer/default).
#[derive(Debug, Clone, Default)]
pub struct SocketMetadata {
	/// An optional human-readable label for the socket.
	pub label: Option<String>,
}

/// Ordered, point-to-point delivery of IPs between two ports.
#[async_trait]
pub trait Socket<D: PacketData>: Send + Sync {
	/// This socket's id, assigned by the coordinator.
	fn id(&self) -> SocketId;

	/// Post an IP for delivery across this socket.
	async fn post(&mut self, ip: Ip<D>) -> Result<(), AttachError>;

	/// Mark the socket as connected (able to carry IPs).
	async fn connect(&mut self);

	/// Flush any buffered sends.
	async fn send(&mut self);

	/// Mark the socket as disconnected.
	async fn disconnect(&mut self);

	/// Whether the socket is currently connected.
	fn is_connected(&self) -> bool;

	/// Toggle debug mode on this socket.
	fn set_debug(&mut self, debug: bool);

	/// This socket's endpoints.
	fn endpoints(&self) -> &SocketEndpoints;

	/// This socket's endpoints, mutably (used by the attachment engine to
	/// bind `from`/`to`).
	fn endpoints_mut(&mut self) -> &mut SocketEndpoints;

	/// This socket's metadata.
	fn metadata(&self) -> &SocketMetadata;

	/// Subscribe to this socket's lifecycle events (`Ip`/`Error`/`Connect`/`Disconnect`).
	fn subscribe(&self) -> broadcast::Receiver<SocketEvent<D>>;
}

/// Constructs new socket instances. The coordinator never builds a
/// transport itself; it asks this factory for one whenever an edge, an IIP,
/// or a default value needs a carrier (mirrors [`crate::graph::ComponentLoader`]
/// for the component side).
pub trait SocketFactory<D: PacketData>: Send + Sync {
	/// Build a fresh, disconnected socket under the given id.
	fn create(&self, id: SocketId, metadata: SocketMetadata) -> Box<dyn Socket<D>>;
}
