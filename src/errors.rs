//! Error types for every coordinator operation, one enum per concern.

use thiserror::Error;

use crate::labels::{NodeId, PortName};

/// An error encountered while loading a component.
#[derive(Debug, Error)]
pub enum LoaderError {
	/// The loader doesn't recognize this component name.
	#[error("unknown component `{name}`")]
	UnknownComponent {
		/// The component name that was requested.
		name: String,
	},

	/// An arbitrary loader-side failure, propagated verbatim.
	#[error("component load failed: {message}")]
	Other {
		/// A human-readable description of the failure.
		message: String,
	},
}

/// An error encountered while starting or shutting down a component.
#[derive(Debug, Error)]
pub enum ComponentError {
	/// An arbitrary lifecycle failure, propagated verbatim.
	#[error("component lifecycle error: {message}")]
	Other {
		/// A human-readable description of the failure.
		message: String,
	},
}

/// An error encountered while mutating the process table (C1).
#[derive(Debug, Error)]
pub enum ProcessError {
	/// There is no process with the given id.
	#[error("no such node `{id}`")]
	NoSuchNode {
		/// The node id that was looked up.
		id: NodeId,
	},

	/// `rename_node` would collide with an existing id.
	#[error("a node with id `{id}` already exists")]
	AlreadyExists {
		/// The id that collided.
		id: NodeId,
	},

	/// The component loader failed.
	#[error("failed to load component for node `{node}`")]
	Load {
		/// The node being loaded.
		node: NodeId,
		/// The underlying loader error.
		#[source]
		source: LoaderError,
	},

	/// The component's shutdown failed; the process was not removed.
	#[error("failed to shut down node `{node}`")]
	Shutdown {
		/// The node being removed.
		node: NodeId,
		/// The underlying lifecycle error.
		#[source]
		source: ComponentError,
	},

	/// `add_node`/`rename_node`/`remove_node` was called on a placeholder
	/// record with no component where a component was required.
	#[error("node `{id}` has no component instance")]
	NoComponent {
		/// The node id in question.
		id: NodeId,
	},
}

/// An error encountered while attaching a socket to a port (C3).
#[derive(Debug, Error)]
pub enum AttachError {
	/// The process doesn't exist.
	#[error("no such node `{node}`")]
	NoSuchNode {
		/// The node id that was looked up.
		node: NodeId,
	},

	/// The node exists, but has no component instance.
	#[error("node `{node}` has no component instance")]
	NoComponent {
		/// The node id in question.
		node: NodeId,
	},

	/// No port with this name exists on the component.
	#[error("no {direction} port '{port}' defined in process {node}")]
	NoSuchPort {
		/// The node the port was looked up on.
		node: NodeId,
		/// The port name that was looked up.
		port: PortName,
		/// Whether this was an inport or an outport lookup.
		direction: PortDirection,
	},

	/// An index was given for a non-addressable port, or omitted for an
	/// addressable one.
	#[error("port '{port}' on node `{node}` addressability mismatch (addressable: {addressable}, index given: {index_given})")]
	AddressabilityMismatch {
		/// The node the port belongs to.
		node: NodeId,
		/// The port in question.
		port: PortName,
		/// Whether the port is actually addressable.
		addressable: bool,
		/// Whether an index was supplied by the caller.
		index_given: bool,
	},
}

/// Which side of a component a port lookup targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
	/// An inport.
	In,
	/// An outport.
	Out,
}

impl std::fmt::Display for PortDirection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::In => write!(f, "in"),
			Self::Out => write!(f, "out"),
		}
	}
}

/// An error encountered while building an edge, an IIP, or a default socket (C4).
#[derive(Debug, Error)]
pub enum BuilderError {
	/// Attaching the socket failed.
	#[error(transparent)]
	Attach(#[from] AttachError),

	/// The referenced node doesn't exist.
	#[error("no such node `{node}`")]
	NoSuchNode {
		/// The node id that was looked up.
		node: NodeId,
	},

	/// `remove_edge`/`remove_initial` found no socket attached to the given inport.
	#[error("no socket attached to `{node}`.{port}")]
	NoSuchSocket {
		/// The node the port belongs to.
		node: NodeId,
		/// The inport that was looked up.
		port: PortName,
	},
}

/// An error encountered while running the staged graph connector (C8).
#[derive(Debug, Error)]
pub enum ConnectError {
	/// A node failed to load.
	#[error("failed to instantiate node `{node}`")]
	Node {
		/// The node that failed.
		node: NodeId,
		/// The underlying error.
		#[source]
		source: ProcessError,
	},

	/// An edge failed to build.
	#[error("failed to connect edge into `{node}`")]
	Edge {
		/// The node the failing edge targets.
		node: NodeId,
		/// The underlying error.
		#[source]
		source: BuilderError,
	},

	/// An initializer failed to build.
	#[error("failed to connect initial packet into `{node}`")]
	Initial {
		/// The node the failing initializer targets.
		node: NodeId,
		/// The underlying error.
		#[source]
		source: BuilderError,
	},

	/// A default socket failed to build.
	#[error("failed to attach default value on `{node}`")]
	Default {
		/// The node the failing default targets.
		node: NodeId,
		/// The underlying error.
		#[source]
		source: BuilderError,
	},
}

/// An error encountered while multiplexing events (C5).
#[derive(Debug, Error)]
pub enum MultiplexError {
	/// A process-error (or socket transport error) was emitted with nobody
	/// subscribed to the coordinator's event stream. Per the source's
	/// "throw on no listener" policy, this escalates instead of vanishing.
	#[error("unhandled process error on node `{node}`: {message}")]
	Unhandled {
		/// The node that raised the error.
		node: NodeId,
		/// A human-readable description.
		message: String,
	},
}

/// An error encountered while starting, stopping, or restarting the network (C9).
#[derive(Debug, Error)]
pub enum LifecycleError {
	/// `connect` failed.
	#[error(transparent)]
	Connect(#[from] ConnectError),

	/// An edge, IIP, or default attached outside of `connect` failed.
	#[error(transparent)]
	Builder(#[from] BuilderError),

	/// A component failed to start or shut down.
	#[error("node `{node}` lifecycle failure")]
	Component {
		/// The node whose lifecycle call failed.
		node: NodeId,
		/// The underlying error.
		#[source]
		source: ComponentError,
	},

	/// A subscribed event was unhandled; see [`MultiplexError`].
	#[error(transparent)]
	Multiplex(#[from] MultiplexError),
}
