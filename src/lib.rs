//! A Flow-Based Programming network coordinator: staged graph instantiation,
//! socket attachment, Initial-Information-Packet and default-value delivery,
//! subgraph-aware event multiplexing, and debounced quiescence detection.
//!
//! The coordinator is the engine, not the program: components, sockets, the
//! component loader, and the graph-description format are all external
//! collaborators, consumed here only through the traits in [`component`],
//! [`socket`], and [`graph`].

pub mod attach;
pub mod builder;
pub mod component;
pub mod config;
pub mod connector;
pub mod errors;
pub mod events;
pub mod graph;
pub mod ip;
pub mod labels;
pub mod multiplexer;
pub mod network;
pub mod port;
pub mod process;
pub mod quiescence;
pub mod registry;
pub mod runstate;
pub mod socket;

#[cfg(test)]
mod testutil;

pub use component::{Component, IsSubgraph};
pub use config::CoordinatorConfig;
pub use errors::{
	AttachError, BuilderError, ComponentError, ConnectError, LifecycleError, LoaderError,
	MultiplexError, ProcessError,
};
pub use events::{ComponentEvent, NetworkEvent, SocketEvent};
pub use graph::{ComponentLoader, GraphDef, GraphEdge, GraphEndpoint, GraphInitializer, GraphNode, Metadata};
pub use ip::{Ip, IpKind, IpMetadata, PacketData};
pub use labels::{NodeId, PortName, SocketId};
pub use network::NetworkCoordinator;
pub use port::{Port, PortSet};
pub use process::{AddNodeOptions, ProcessRecord, ProcessTable};
pub use socket::{Endpoint, Socket, SocketEndpoints, SocketFactory, SocketMetadata};
