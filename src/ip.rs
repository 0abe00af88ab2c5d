//! The Information Packet (IP) type carried by sockets.

/// The kind of an [`Ip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpKind {
	/// A normal data packet.
	Data,
	/// Opens a bracket (the start of a grouped stream, e.g. a list).
	OpenBracket,
	/// Closes a bracket opened by a matching [`IpKind::OpenBracket`].
	CloseBracket,
}

/// Metadata carried alongside an [`Ip`]'s payload.
#[derive(Debug, Clone, Default)]
pub struct IpMetadata {
	/// Set by [`crate::NetworkCoordinator::send_initials`] on every IIP delivery.
	pub initial: bool,
}

impl IpMetadata {
	/// Plain metadata: not an initial.
	pub fn new() -> Self {
		Self::default()
	}

	/// Metadata for an IIP delivery.
	pub fn initial() -> Self {
		Self { initial: true }
	}
}

/// A typed packet of data travelling on a socket.
#[derive(Debug, Clone)]
pub struct Ip<D> {
	/// The kind of this packet.
	pub kind: IpKind,
	/// The packet's payload.
	pub data: D,
	/// Metadata travelling alongside the payload.
	pub metadata: IpMetadata,
}

impl<D> Ip<D> {
	/// Construct a new IP.
	pub fn new(kind: IpKind, data: D, metadata: IpMetadata) -> Self {
		Self {
			kind,
			data,
			metadata,
		}
	}

	/// Construct a data IP with default (non-initial) metadata.
	pub fn data(data: D) -> Self {
		Self::new(IpKind::Data, data, IpMetadata::new())
	}
}

/// The bound all packet payloads must satisfy: cheap to clone, and safe to move
/// across the coordinator's single-threaded driving task.
pub trait PacketData: std::fmt::Debug + Clone + Send + Sync + 'static {}

impl<T> PacketData for T where T: std::fmt::Debug + Clone + Send + Sync + 'static {}
