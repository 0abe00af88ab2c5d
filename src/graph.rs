//! The graph input model: plain data describing nodes, edges, and initializers.
//!
//! This module deliberately does not parse any particular graph-description
//! format (FBP JSON, `.fbp` DSL, ...); it only defines the shape the
//! coordinator consumes. A host application deserializes whatever format it
//! likes into these types.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
	component::Component,
	errors::LoaderError,
	ip::PacketData,
	labels::{NodeId, PortName},
};

/// Free-form metadata attached to a node, edge, or initializer.
pub type Metadata = BTreeMap<String, serde_json_value::Value>;

/// A minimal JSON-like value type so this crate doesn't need to depend on
/// `serde_json` outside of tests, while still letting metadata carry
/// arbitrary structured data.
pub mod serde_json_value {
	use serde::{Deserialize, Serialize};

	/// A minimal dynamically-typed value, structurally compatible with
	/// `serde_json::Value`.
	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	#[serde(untagged)]
	pub enum Value {
		/// `null`
		Null,
		/// `true`/`false`
		Bool(bool),
		/// A number.
		Number(f64),
		/// A string.
		String(String),
		/// A list of values.
		Array(Vec<Value>),
	}
}

/// A node in a graph definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
	/// This node's id.
	pub id: NodeId,
	/// The component to load for this node, if any. A node with no component
	/// is a reserved placeholder (§3, "Process Record").
	pub component: Option<String>,
	/// Free-form metadata, forwarded to the loader.
	#[serde(default)]
	pub metadata: Metadata,
}

/// One endpoint of a graph edge or initializer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEndpoint {
	/// The node this endpoint targets.
	pub node: NodeId,
	/// The port on that node.
	pub port: PortName,
	/// The index into the port, if it is addressable.
	#[serde(default)]
	pub index: Option<usize>,
}

/// An edge in a graph definition: a connection between an outport and an inport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
	/// The upstream (outport) endpoint.
	pub from: GraphEndpoint,
	/// The downstream (inport) endpoint.
	pub to: GraphEndpoint,
	/// Free-form metadata, carried onto the created socket.
	#[serde(default)]
	pub metadata: Metadata,
}

/// An Initial Information Packet in a graph definition.
#[derive(Debug, Clone)]
pub struct GraphInitializer<D> {
	/// The payload to deliver.
	pub data: D,
	/// The inport to deliver it to.
	pub to: GraphEndpoint,
	/// Free-form metadata, carried onto the created socket.
	pub metadata: Metadata,
}

/// A complete graph definition: the coordinator's sole constructor input.
pub struct GraphDef<D> {
	/// Every node in the graph.
	pub nodes: Vec<GraphNode>,
	/// Every edge in the graph.
	pub edges: Vec<GraphEdge>,
	/// Every initializer in the graph.
	pub initializers: Vec<GraphInitializer<D>>,
	/// An opaque base directory, forwarded to the component loader; the
	/// coordinator never reads the filesystem itself.
	pub base_dir: Option<std::path::PathBuf>,
}

impl<D> GraphDef<D> {
	/// An empty graph definition.
	pub fn new() -> Self {
		Self {
			nodes: Vec::new(),
			edges: Vec::new(),
			initializers: Vec::new(),
			base_dir: None,
		}
	}
}

impl<D> Default for GraphDef<D> {
	fn default() -> Self {
		Self::new()
	}
}

/// Resolves a component reference (a name, possibly with metadata) to a
/// process instance. The sole external collaborator for turning graph data
/// into running components.
#[async_trait]
pub trait ComponentLoader<D: PacketData>: Send + Sync {
	/// Load a new component instance of the given type.
	async fn load(
		&self,
		component_name: &str,
		metadata: &Metadata,
	) -> Result<Box<dyn Component<D>>, LoaderError>;
}
