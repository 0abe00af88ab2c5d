//! C8: the graph connector — the staged graph-instantiation pipeline.

use tracing::debug;

use crate::{
	builder,
	errors::ConnectError,
	graph::GraphDef,
	ip::PacketData,
	labels::NodeId,
	multiplexer::Multiplexer,
	process::{AddNodeOptions, ProcessTable},
	registry::SocketRegistry,
	socket::SocketFactory,
};

/// Subscribe the multiplexer to a freshly-added process's activity stream
/// and, if it is a subgraph, to its inner network's event stream (§4.1:
/// "subgraph subscription is attached before node subscription" — the order
/// between the two doesn't matter here since both are pure registrations).
pub(crate) async fn attach_process_subscriptions<D: PacketData>(
	processes: &mut ProcessTable<D>,
	multiplexer: &mut Multiplexer<D>,
	node: &NodeId,
) {
	let activity = match processes
		.get_node(node)
		.and_then(|record| record.component.as_ref())
	{
		Some(component) => component.subscribe_activity(),
		None => return,
	};
	multiplexer.subscribe_node(node.clone(), activity);

	let subgraph = processes
		.get_node(node)
		.and_then(|record| record.component.as_ref())
		.and_then(|component| component.as_subgraph())
		.map(|subgraph| subgraph.inner_network());

	if let Some(inner) = subgraph {
		let receiver = inner.lock().await.subscribe();
		multiplexer.subscribe_subgraph(node.clone(), receiver);
	}
}

/// Yield to the scheduler after this many elements within a single phase, to
/// bound synchronous recursion when many elements complete without
/// suspending (§4.4).
const YIELD_EVERY: usize = 100;

/// Instantiate a graph definition in four strictly ordered phases: nodes,
/// then edges, then initials, then defaults. Each phase fully completes
/// before the next begins; any error aborts the whole connect.
pub async fn connect<D: PacketData>(
	graph: GraphDef<D>,
	processes: &mut ProcessTable<D>,
	registry: &mut SocketRegistry<D>,
	multiplexer: &mut Multiplexer<D>,
	factory: &dyn SocketFactory<D>,
) -> Result<(), ConnectError> {
	debug!(message = "connect: nodes", count = graph.nodes.len());
	for (i, node) in graph.nodes.into_iter().enumerate() {
		let node_id = node.id.clone();
		let opts = AddNodeOptions {
			metadata: node.metadata.clone(),
		};
		processes
			.add_node(node, opts)
			.await
			.map_err(|source| ConnectError::Node {
				node: node_id.clone(),
				source,
			})?;
		attach_process_subscriptions(processes, multiplexer, &node_id).await;
		yield_every(i).await;
	}

	debug!(message = "connect: edges", count = graph.edges.len());
	for (i, edge) in graph.edges.into_iter().enumerate() {
		let target = edge.to.node.clone();
		builder::add_edge(processes, registry, multiplexer, factory, edge)
			.await
			.map_err(|source| ConnectError::Edge {
				node: target,
				source,
			})?;
		yield_every(i).await;
	}

	debug!(
		message = "connect: initials",
		count = graph.initializers.len()
	);
	for (i, initializer) in graph.initializers.into_iter().enumerate() {
		let target = initializer.to.node.clone();
		builder::add_initial(processes, registry, multiplexer, factory, initializer)
			.await
			.map_err(|source| ConnectError::Initial {
				node: target,
				source,
			})?;
		yield_every(i).await;
	}

	let node_ids: Vec<_> = processes.iter().map(|record| record.id.clone()).collect();
	debug!(message = "connect: defaults", count = node_ids.len());
	for (i, node_id) in node_ids.into_iter().enumerate() {
		builder::add_defaults(processes, registry, multiplexer, factory, &node_id)
			.await
			.map_err(|source| ConnectError::Default {
				node: node_id,
				source,
			})?;
		yield_every(i).await;
	}

	Ok(())
}

async fn yield_every(index: usize) {
	if index != 0 && index % YIELD_EVERY == 0 {
		tokio::task::yield_now().await;
	}
}
