//! C1: the process table — maps node id to process record, owns component instances.

use std::{collections::BTreeMap, sync::Arc};

use tracing::debug;

use crate::{
	component::Component,
	errors::ProcessError,
	graph::{ComponentLoader, GraphNode, Metadata},
	ip::PacketData,
	labels::NodeId,
};

/// A node in the process table: an id, optionally bound to a component instance.
pub struct ProcessRecord<D: PacketData> {
	/// This process's id.
	pub id: NodeId,
	/// The running component, or `None` for a reserved placeholder node.
	pub component: Option<Box<dyn Component<D>>>,
	/// The name the component was loaded under, if any.
	pub component_name: Option<String>,
}

impl<D: PacketData> ProcessRecord<D> {
	/// Whether this record has a component instance.
	pub fn has_component(&self) -> bool {
		self.component.is_some()
	}
}

/// Options controlling how [`ProcessTable::add_node`] instantiates a node.
#[derive(Debug, Clone, Default)]
pub struct AddNodeOptions {
	/// Metadata forwarded to the component loader.
	pub metadata: Metadata,
}

/// Maps node id to process record; owns component instances (C1).
pub struct ProcessTable<D: PacketData> {
	processes: BTreeMap<NodeId, ProcessRecord<D>>,
	loader: Arc<dyn ComponentLoader<D>>,
}

impl<D: PacketData> ProcessTable<D> {
	/// Create an empty process table backed by the given loader.
	pub fn new(loader: Arc<dyn ComponentLoader<D>>) -> Self {
		Self {
			processes: BTreeMap::new(),
			loader,
		}
	}

	/// Add a node to the table.
	///
	/// Idempotent by id: a second call with an already-registered id returns
	/// the existing record without reloading the component (§4.1).
	pub async fn add_node(
		&mut self,
		node: GraphNode,
		opts: AddNodeOptions,
	) -> Result<&ProcessRecord<D>, ProcessError> {
		if self.processes.contains_key(&node.id) {
			debug!(message = "add_node: already registered", node = %node.id);
			return Ok(self.processes.get(&node.id).expect("just checked"));
		}

		let component = match &node.component {
			None => None,
			Some(name) => {
				let mut instance = self
					.loader
					.load(name, &opts.metadata)
					.await
					.map_err(|source| ProcessError::Load {
						node: node.id.clone(),
						source,
					})?;
				// Stamping `node`/`name` onto every port happens at attach
				// time (§9 redesign note) rather than here.
				let _ = &mut instance;
				Some(instance)
			}
		};

		debug!(message = "add_node", node = %node.id, has_component = component.is_some());

		let record = ProcessRecord {
			id: node.id.clone(),
			component,
			component_name: node.component,
		};
		self.processes.insert(node.id.clone(), record);
		Ok(self.processes.get(&node.id).expect("just inserted"))
	}

	/// Remove a node: shuts down its component (if any) and, only on
	/// success, removes the record.
	pub async fn remove_node(&mut self, id: &NodeId) -> Result<(), ProcessError> {
		let record = self
			.processes
			.get_mut(id)
			.ok_or_else(|| ProcessError::NoSuchNode { id: id.clone() })?;

		if let Some(component) = record.component.as_mut() {
			component
				.shutdown()
				.await
				.map_err(|source| ProcessError::Shutdown {
					node: id.clone(),
					source,
				})?;
		}

		debug!(message = "remove_node", node = %id);
		self.processes.remove(id);
		Ok(())
	}

	/// Rename a node. Errors if the old id is absent, or if the new id is
	/// already present (§9: collision is rejected, not silently overwritten).
	pub fn rename_node(&mut self, old: &NodeId, new: NodeId) -> Result<(), ProcessError> {
		if !self.processes.contains_key(old) {
			return Err(ProcessError::NoSuchNode { id: old.clone() });
		}
		if self.processes.contains_key(&new) {
			return Err(ProcessError::AlreadyExists { id: new });
		}

		let mut record = self.processes.remove(old).expect("just checked");
		record.id = new.clone();
		debug!(message = "rename_node", old = %old, new = %new);
		self.processes.insert(new, record);
		Ok(())
	}

	/// Look up a process record by id.
	pub fn get_node(&self, id: &NodeId) -> Option<&ProcessRecord<D>> {
		self.processes.get(id)
	}

	/// Look up a process record by id, mutably.
	pub fn get_node_mut(&mut self, id: &NodeId) -> Option<&mut ProcessRecord<D>> {
		self.processes.get_mut(id)
	}

	/// Iterate over every process record.
	pub fn iter(&self) -> impl Iterator<Item = &ProcessRecord<D>> {
		self.processes.values()
	}

	/// Iterate over every process record, mutably.
	pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ProcessRecord<D>> {
		self.processes.values_mut()
	}

	/// The number of nodes in the table.
	pub fn len(&self) -> usize {
		self.processes.len()
	}

	/// Whether the table is empty.
	pub fn is_empty(&self) -> bool {
		self.processes.is_empty()
	}
}
