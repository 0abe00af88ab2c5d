//! C9: the network coordinator — the lifecycle orchestrator tying every
//! other component together into one driveable object.

use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use tracing::warn;

use crate::{
	builder, connector,
	config::CoordinatorConfig,
	errors::{BuilderError, ConnectError, LifecycleError, ProcessError},
	events::{ComponentEvent, NetworkEvent, SocketEvent},
	graph::{ComponentLoader, GraphDef, GraphEdge, GraphEndpoint, GraphInitializer, GraphNode},
	ip::{Ip, PacketData},
	labels::{NodeId, SocketId},
	multiplexer::{Multiplexer, MultiplexedEvent},
	process::{AddNodeOptions, ProcessTable},
	quiescence::{is_active, QuiescenceDetector},
	registry::SocketRegistry,
	runstate::RunState,
	socket::SocketFactory,
};

/// The coordinator: a single in-process object parameterized by a graph
/// (§2). Owns every other component (C1–C8) and drives the network.
pub struct NetworkCoordinator<D: PacketData> {
	processes: ProcessTable<D>,
	registry: SocketRegistry<D>,
	multiplexer: Multiplexer<D>,
	runstate: RunState,
	quiescence: QuiescenceDetector,
	config: CoordinatorConfig,
	socket_factory: Arc<dyn SocketFactory<D>>,
	debug: bool,
}

impl<D: PacketData> NetworkCoordinator<D> {
	/// Construct a coordinator with no nodes, sockets, or subscribers yet.
	pub fn new(
		loader: Arc<dyn ComponentLoader<D>>,
		socket_factory: Arc<dyn SocketFactory<D>>,
		config: CoordinatorConfig,
	) -> Self {
		Self {
			processes: ProcessTable::new(loader),
			registry: SocketRegistry::new(),
			multiplexer: Multiplexer::new(config.event_channel_capacity),
			runstate: RunState::new(),
			quiescence: QuiescenceDetector::new(),
			config,
			socket_factory,
			debug: false,
		}
	}

	/// Subscribe to this coordinator's external event stream.
	pub fn subscribe(&self) -> async_broadcast::Receiver<NetworkEvent<D>> {
		self.multiplexer.subscribe()
	}

	/// Whether the network is currently started.
	pub fn is_started(&self) -> bool {
		self.runstate.is_started()
	}

	/// `now - startup_time`, or `Duration::ZERO` if never started.
	pub fn uptime(&self) -> Duration {
		self.runstate.uptime()
	}

	/// The number of live sockets currently registered.
	pub fn socket_count(&self) -> usize {
		self.registry.iter().count()
	}

	/// Instantiate an entire graph definition (C8): nodes, then edges, then
	/// initials, then defaults.
	pub async fn connect(&mut self, graph: GraphDef<D>) -> Result<(), ConnectError> {
		connector::connect(
			graph,
			&mut self.processes,
			&mut self.registry,
			&mut self.multiplexer,
			self.socket_factory.as_ref(),
		)
		.await
	}

	/// Add a single node outside of `connect` (C1), subscribing its activity
	/// stream and, if it is a subgraph, its inner network's event stream.
	pub async fn add_node(&mut self, node: GraphNode) -> Result<(), ProcessError> {
		let id = node.id.clone();
		let opts = AddNodeOptions {
			metadata: node.metadata.clone(),
		};
		self.processes.add_node(node, opts).await?;
		connector::attach_process_subscriptions(&mut self.processes, &mut self.multiplexer, &id).await;
		Ok(())
	}

	/// Remove a node (C1).
	pub async fn remove_node(&mut self, id: &NodeId) -> Result<(), ProcessError> {
		self.processes.remove_node(id).await
	}

	/// Rename a node (C1).
	pub fn rename_node(&mut self, old: &NodeId, new: NodeId) -> Result<(), ProcessError> {
		self.processes.rename_node(old, new)
	}

	/// Add a single edge outside of `connect` (C4).
	pub async fn add_edge(&mut self, edge: GraphEdge) -> Result<SocketId, BuilderError> {
		builder::add_edge(
			&mut self.processes,
			&mut self.registry,
			&mut self.multiplexer,
			self.socket_factory.as_ref(),
			edge,
		)
		.await
	}

	/// Add a single IIP outside of `connect` (C4). If the network is already
	/// running, the IIP is sent immediately; if it has started before but
	/// quiesced without an explicit `stop`, it is restarted and then sent
	/// (§4.3).
	pub async fn add_initial(
		&mut self,
		initializer: GraphInitializer<D>,
	) -> Result<SocketId, LifecycleError> {
		let id = builder::add_initial(
			&mut self.processes,
			&mut self.registry,
			&mut self.multiplexer,
			self.socket_factory.as_ref(),
			initializer,
		)
		.await?;

		if self.runstate.is_started() {
			self.send_initials().await?;
		} else if !self.runstate.is_stopped() {
			self.runstate.mark_started();
			let start = self.runstate.startup_time().expect("just set by mark_started");
			self.multiplexer.buffered_emit(NetworkEvent::Start { start }, true)?;
			self.send_initials().await?;
		}

		Ok(id)
	}

	/// Add default-value sockets for a node outside of `connect` (C4).
	pub async fn add_defaults(&mut self, node: &NodeId) -> Result<Vec<SocketId>, BuilderError> {
		builder::add_defaults(
			&mut self.processes,
			&mut self.registry,
			&mut self.multiplexer,
			self.socket_factory.as_ref(),
			node,
		)
		.await
	}

	/// Remove the socket carrying an edge's inbound endpoint (C4).
	pub fn remove_edge(&mut self, to: &GraphEndpoint) -> Result<(), BuilderError> {
		builder::remove_edge(&mut self.processes, &mut self.registry, &mut self.multiplexer, to)
	}

	/// Remove the socket carrying an IIP's inbound endpoint (C4).
	pub fn remove_initial(&mut self, to: &GraphEndpoint) -> Result<(), BuilderError> {
		builder::remove_initial(&mut self.processes, &mut self.registry, &mut self.multiplexer, to)
	}

	/// Every process currently reporting load or open connections (§4.7).
	fn active_processes(&self) -> usize {
		self.processes
			.iter()
			.filter(|record| {
				record
					.component
					.as_ref()
					.is_some_and(|component| is_active(component.as_ref()))
			})
			.count()
	}

	fn check_quiescence(&mut self) {
		if self.active_processes() == 0 {
			self.quiescence.schedule_check(self.config.quiescence_debounce);
		}
	}

	async fn finish_quiescence(&mut self) -> Result<(), LifecycleError> {
		if !self.runstate.is_started() {
			return Ok(());
		}
		let start = self.runstate.startup_time().unwrap_or_else(Instant::now);
		let end = Instant::now();
		let uptime = self.runstate.uptime();
		self.runstate.mark_quiesced();
		self.multiplexer
			.buffered_emit(NetworkEvent::End { start, end, uptime }, false)?;
		Ok(())
	}

	/// Drain and react to every currently-pending multiplexed event, then
	/// check whether a debounced quiescence check has fired. One tick of the
	/// coordinator's single driving task (§5).
	pub async fn run_once(&mut self) -> Result<(), LifecycleError> {
		let drained = self.multiplexer.poll();
		for event in drained {
			self.handle_multiplexed(event).await?;
		}

		if self.quiescence.poll_fired() && self.active_processes() == 0 {
			self.finish_quiescence().await?;
		}

		Ok(())
	}

	async fn handle_multiplexed(&mut self, event: MultiplexedEvent<D>) -> Result<(), LifecycleError> {
		match event {
			MultiplexedEvent::Socket {
				socket,
				node,
				legacy,
				event,
			} => self.handle_socket_event(socket, node, legacy, event)?,
			MultiplexedEvent::Node { node, event } => self.handle_node_event(node, event)?,
			MultiplexedEvent::Subgraph { node, event } => {
				let started = self.runstate.is_started();
				self.multiplexer
					.buffered_emit(tag_subgraph(node, event), started)?;
			}
		}
		Ok(())
	}

	fn handle_socket_event(
		&mut self,
		socket: SocketId,
		node: NodeId,
		legacy: bool,
		event: SocketEvent<D>,
	) -> Result<(), LifecycleError> {
		let started = self.runstate.is_started();
		match event {
			SocketEvent::Ip { kind, data, metadata } => {
				self.multiplexer.buffered_emit(
					NetworkEvent::Ip {
						socket,
						kind,
						data,
						metadata,
						subgraph: Vec::new(),
					},
					started,
				)?;
			}
			SocketEvent::Error(message) => {
				self.multiplexer.buffered_emit(
					NetworkEvent::ProcessError {
						node,
						message,
						subgraph: Vec::new(),
					},
					started,
				)?;
			}
			SocketEvent::Connect => {
				if legacy {
					self.multiplexer.record_legacy_connect(&node);
				}
			}
			SocketEvent::Disconnect => {
				if legacy && self.multiplexer.record_legacy_disconnect(&node) == 0 {
					self.check_quiescence();
				}
			}
		}
		Ok(())
	}

	fn handle_node_event(&mut self, node: NodeId, event: ComponentEvent) -> Result<(), LifecycleError> {
		match event {
			ComponentEvent::Activate(_) => self.quiescence.on_activate(),
			ComponentEvent::Deactivate(_) => self.check_quiescence(),
			ComponentEvent::Icon(icon) => {
				let started = self.runstate.is_started();
				self.multiplexer
					.buffered_emit(NetworkEvent::Icon { node, icon }, started)?;
			}
		}
		Ok(())
	}

	/// Drive the coordinator until it stops, polling once per tick. A host
	/// embedding the coordinator in its own task loop may call `run_once`
	/// directly instead (§9: the driving call is where `MultiplexError`
	/// escalation surfaces).
	pub async fn drive(&mut self) -> Result<(), LifecycleError> {
		loop {
			self.run_once().await?;
			if self.runstate.is_stopped() {
				return Ok(());
			}
			tokio::time::sleep(Duration::from_millis(1)).await;
		}
	}

	/// Start the network (§4.8). If already started, performs a full
	/// `stop` first.
	pub async fn start(&mut self) -> Result<(), LifecycleError> {
		if self.runstate.is_started() {
			self.stop().await?;
		}

		self.registry.refresh_initials();
		self.multiplexer.clear_buffer();
		self.start_components().await?;

		self.runstate.mark_started();
		let start = self.runstate.startup_time().expect("set by mark_started");
		self.multiplexer.buffered_emit(NetworkEvent::Start { start }, true)?;

		self.send_initials().await?;
		self.send_defaults().await?;
		Ok(())
	}

	async fn start_components(&mut self) -> Result<(), LifecycleError> {
		for record in self.processes.iter_mut() {
			if let Some(component) = record.component.as_mut() {
				if !component.is_started() {
					component
						.start()
						.await
						.map_err(|source| LifecycleError::Component {
							node: record.id.clone(),
							source,
						})?;
				}
			}
		}
		Ok(())
	}

	/// Post every pending IIP, tagged `metadata.initial = true`, then empty
	/// `initials`. Deferred by one scheduler turn so subscribers can attach
	/// first (§4.8).
	pub async fn send_initials(&mut self) -> Result<(), LifecycleError> {
		let pending = self.registry.drain_initials();
		tokio::task::yield_now().await;
		for record in pending {
			if let Some(socket) = self.registry.get_mut(record.socket) {
				let ip = builder::initial_ip(record.data);
				if let Err(error) = socket.post(ip).await {
					warn!(message = "send_initials: post failed", socket = %record.socket, %error);
				}
			}
		}
		Ok(())
	}

	/// Connect, send, and disconnect every default-value socket whose target
	/// inport has exactly one attached socket (§4.8).
	pub async fn send_defaults(&mut self) -> Result<(), LifecycleError> {
		let defaults = self.registry.defaults.clone();
		for id in defaults {
			let Some(to) = self.registry.get(id).and_then(|s| s.endpoints().to.clone()) else {
				continue;
			};
			if self.registry.count_attached_to(&to.process, &to.port) > 1 {
				continue;
			}

			let default_value = self
				.processes
				.get_node(&to.process)
				.and_then(|record| record.component.as_ref())
				.and_then(|component| component.in_ports().get(&to.port))
				.and_then(|port| port.default_value());

			let Some(value) = default_value else {
				continue;
			};

			if let Some(socket) = self.registry.get_mut(id) {
				socket.connect().await;
				let _ = socket.post(Ip::data(value)).await;
				socket.send().await;
				socket.disconnect().await;
			}
		}
		Ok(())
	}

	/// Stop the network: disconnect every socket, shut down every component,
	/// then transition to stopped (§4.8).
	pub async fn stop(&mut self) -> Result<(), LifecycleError> {
		if !self.runstate.is_started() {
			self.runstate.mark_stopped();
			return Ok(());
		}

		for (_, socket) in self.registry.iter_mut() {
			if socket.is_connected() {
				socket.disconnect().await;
			}
		}

		for record in self.processes.iter_mut() {
			if let Some(component) = record.component.as_mut() {
				if component.is_started() {
					component
						.shutdown()
						.await
						.map_err(|source| LifecycleError::Component {
							node: record.id.clone(),
							source,
						})?;
				}
			}
		}

		let start = self.runstate.startup_time().unwrap_or_else(Instant::now);
		let end = Instant::now();
		let uptime = self.runstate.uptime();
		self.runstate.mark_stopped();
		self.multiplexer
			.buffered_emit(NetworkEvent::End { start, end, uptime }, false)?;
		Ok(())
	}

	/// `stop` then `start` (§4.8).
	pub async fn restart(&mut self) -> Result<(), LifecycleError> {
		self.stop().await?;
		self.start().await
	}

	/// Terminal teardown: `stop` (if running), then remove every process and
	/// socket so the coordinator can be dropped cleanly. Not present verbatim
	/// in the distilled design — Rust has no garbage-collected fallback, so a
	/// `NetworkCoordinator` needs an explicit terminal teardown distinct from
	/// a restartable `stop`.
	pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
		if self.runstate.is_started() {
			self.stop().await?;
		}

		let node_ids: Vec<NodeId> = self.processes.iter().map(|record| record.id.clone()).collect();
		for id in node_ids {
			if let Err(error) = self.processes.remove_node(&id).await {
				warn!(message = "shutdown: remove_node failed", node = %id, %error);
			}
		}

		let socket_ids: Vec<SocketId> = self.registry.iter().map(|(id, _)| *id).collect();
		for id in socket_ids {
			self.registry.remove(id);
		}

		Ok(())
	}

	/// Propagate a debug-mode change to every socket and recursively into
	/// every subgraph network (§4.8).
	pub async fn set_debug(&mut self, active: bool) {
		self.debug = active;
		for (_, socket) in self.registry.iter_mut() {
			socket.set_debug(active);
		}

		let subgraphs: Vec<_> = self
			.processes
			.iter()
			.filter_map(|record| {
				record
					.component
					.as_ref()
					.and_then(|component| component.as_subgraph())
					.map(|subgraph| subgraph.inner_network())
			})
			.collect();

		for inner in subgraphs {
			let mut guard = inner.lock().await;
			Box::pin(guard.set_debug(active)).await;
		}
	}

	/// Whether debug mode is currently active.
	pub fn is_debug(&self) -> bool {
		self.debug
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{Arc, Mutex as StdMutex};
	use std::time::Duration;

	use async_trait::async_trait;
	use tokio::sync::{broadcast, Mutex as TokioMutex};

	use super::*;
	use crate::{
		component::{Component, IsSubgraph},
		errors::{AttachError, ComponentError, MultiplexError, PortDirection},
		graph::Metadata,
		labels::PortName,
		port::PortSet,
		testutil::{TestComponent, TestLoader, TestPort, TestPortSet, TestSocketFactory},
	};

	fn drain_all<D: PacketData>(events: &mut async_broadcast::Receiver<NetworkEvent<D>>) -> Vec<NetworkEvent<D>> {
		let mut out = Vec::new();
		while let Ok(event) = events.try_recv() {
			out.push(event);
		}
		out
	}

	fn initial_payloads<D: Clone>(events: &[NetworkEvent<D>]) -> Vec<D> {
		events
			.iter()
			.filter_map(|event| match event {
				NetworkEvent::Ip { data, metadata, .. } if metadata.initial => Some(data.clone()),
				_ => None,
			})
			.collect()
	}

	#[tokio::test]
	async fn iip_redelivered_on_every_start() {
		let mut loader = TestLoader::<String>::new();
		loader.register("Sink", || {
			Box::new(TestComponent::new(
				TestPortSet::new().with(TestPort::new("IN")),
				TestPortSet::new(),
			))
		});

		let mut network = NetworkCoordinator::new(
			Arc::new(loader),
			Arc::new(TestSocketFactory::<String>::new()),
			CoordinatorConfig::default(),
		);

		let mut graph = GraphDef::<String>::new();
		graph.nodes.push(GraphNode {
			id: NodeId::new("A"),
			component: Some("Sink".into()),
			metadata: Metadata::new(),
		});
		graph.initializers.push(GraphInitializer {
			data: "hello".to_string(),
			to: GraphEndpoint {
				node: NodeId::new("A"),
				port: PortName::new("IN"),
				index: None,
			},
			metadata: Metadata::new(),
		});
		network.connect(graph).await.unwrap();

		let mut events = network.subscribe();

		network.start().await.unwrap();
		network.run_once().await.unwrap();
		let first = drain_all(&mut events);
		assert!(matches!(first.first(), Some(NetworkEvent::Start { .. })));
		assert_eq!(initial_payloads(&first), vec!["hello".to_string()]);

		// Already started: `start` stops first, re-emitting `End`, then
		// starts again, which re-sends every preserved IIP.
		network.start().await.unwrap();
		network.run_once().await.unwrap();
		let second = drain_all(&mut events);
		assert!(second.iter().any(|event| matches!(event, NetworkEvent::End { .. })));
		assert!(second.iter().any(|event| matches!(event, NetworkEvent::Start { .. })));
		assert_eq!(initial_payloads(&second), vec!["hello".to_string()]);
	}

	#[tokio::test]
	async fn default_value_created_then_suppressed_by_a_second_socket() {
		let mut loader = TestLoader::<i32>::new();
		loader.register("Sink", || {
			Box::new(TestComponent::new(
				TestPortSet::new().with(TestPort::new("IN").with_default(42)),
				TestPortSet::new(),
			))
		});
		loader.register("Source", || {
			Box::new(TestComponent::new(
				TestPortSet::new(),
				TestPortSet::new().with(TestPort::new("OUT")),
			))
		});

		let mut solo_loader = TestLoader::<i32>::new();
		solo_loader.register("Sink", || {
			Box::new(TestComponent::new(
				TestPortSet::new().with(TestPort::new("IN").with_default(42)),
				TestPortSet::new(),
			))
		});

		// No edge into IN: the default socket is created and fires.
		let mut solo = NetworkCoordinator::new(
			Arc::new(solo_loader),
			Arc::new(TestSocketFactory::<i32>::new()),
			CoordinatorConfig::default(),
		);
		let mut solo_graph = GraphDef::<i32>::new();
		solo_graph.nodes.push(GraphNode {
			id: NodeId::new("A"),
			component: Some("Sink".into()),
			metadata: Metadata::new(),
		});
		solo.connect(solo_graph).await.unwrap();
		assert_eq!(solo.socket_count(), 1);

		let mut solo_events = solo.subscribe();
		solo.start().await.unwrap();
		solo.run_once().await.unwrap();
		let solo_drained = drain_all(&mut solo_events);
		let data: Vec<i32> = solo_drained
			.iter()
			.filter_map(|event| match event {
				NetworkEvent::Ip { data, .. } => Some(*data),
				_ => None,
			})
			.collect();
		assert_eq!(data, vec![42]);

		// An edge into IN before `connect` reaches the defaults phase:
		// the default socket is never created at all.
		let mut wired = NetworkCoordinator::new(Arc::new(loader), Arc::new(TestSocketFactory::<i32>::new()), CoordinatorConfig::default());
		let mut wired_graph = GraphDef::<i32>::new();
		wired_graph.nodes.push(GraphNode {
			id: NodeId::new("A"),
			component: Some("Sink".into()),
			metadata: Metadata::new(),
		});
		wired_graph.nodes.push(GraphNode {
			id: NodeId::new("Z"),
			component: Some("Source".into()),
			metadata: Metadata::new(),
		});
		wired_graph.edges.push(GraphEdge {
			from: GraphEndpoint {
				node: NodeId::new("Z"),
				port: PortName::new("OUT"),
				index: None,
			},
			to: GraphEndpoint {
				node: NodeId::new("A"),
				port: PortName::new("IN"),
				index: None,
			},
			metadata: Metadata::new(),
		});
		wired.connect(wired_graph).await.unwrap();
		assert_eq!(wired.socket_count(), 1);

		let mut wired_events = wired.subscribe();
		wired.start().await.unwrap();
		wired.run_once().await.unwrap();
		let wired_drained = drain_all(&mut wired_events);
		assert!(wired_drained.iter().all(|event| !matches!(event, NetworkEvent::Ip { .. })));
	}

	#[tokio::test(start_paused = true)]
	async fn quiescence_debounce_aborts_on_reactivation() {
		let mut loader = TestLoader::<i32>::new();
		let component = TestComponent::<i32>::new(TestPortSet::new(), TestPortSet::new());
		let handle = component.activity_handle();
		let slot: StdMutex<Option<Box<dyn Component<i32>>>> = StdMutex::new(Some(Box::new(component)));
		loader.register("Worker", move || slot.lock().expect("poisoned").take().expect("Worker loaded once"));

		let config = CoordinatorConfig {
			quiescence_debounce: Duration::from_millis(50),
			..CoordinatorConfig::default()
		};
		let mut network = NetworkCoordinator::new(Arc::new(loader), Arc::new(TestSocketFactory::<i32>::new()), config);

		let mut graph = GraphDef::<i32>::new();
		graph.nodes.push(GraphNode {
			id: NodeId::new("W"),
			component: Some("Worker".into()),
			metadata: Metadata::new(),
		});
		network.connect(graph).await.unwrap();

		let mut events = network.subscribe();
		network.start().await.unwrap();
		network.run_once().await.unwrap();
		drain_all(&mut events); // the initial `Start`

		// No reactivation: the debounce fires exactly once.
		handle.deactivate();
		network.run_once().await.unwrap();
		tokio::time::advance(Duration::from_millis(60)).await;
		for _ in 0..5 {
			tokio::task::yield_now().await;
		}
		network.run_once().await.unwrap();
		let ended = drain_all(&mut events);
		assert_eq!(ended.len(), 1);
		assert!(matches!(ended[0], NetworkEvent::End { .. }));

		// Restart, then reactivate mid-debounce: the pending check is aborted
		// and only the second one fires.
		network.start().await.unwrap();
		network.run_once().await.unwrap();
		drain_all(&mut events); // the second `Start`

		handle.deactivate();
		network.run_once().await.unwrap();
		tokio::time::advance(Duration::from_millis(30)).await;
		for _ in 0..5 {
			tokio::task::yield_now().await;
		}
		network.run_once().await.unwrap();
		assert!(drain_all(&mut events).is_empty());

		handle.activate();
		network.run_once().await.unwrap();
		handle.deactivate();
		network.run_once().await.unwrap();
		tokio::time::advance(Duration::from_millis(60)).await;
		for _ in 0..5 {
			tokio::task::yield_now().await;
		}
		network.run_once().await.unwrap();
		let ended = drain_all(&mut events);
		assert_eq!(ended.len(), 1);
		assert!(matches!(ended[0], NetworkEvent::End { .. }));
	}

	#[tokio::test]
	async fn missing_port_on_edge_is_rejected_without_creating_a_socket() {
		let mut loader = TestLoader::<i32>::new();
		loader.register("A", || {
			Box::new(TestComponent::new(
				TestPortSet::new(),
				TestPortSet::new().with(TestPort::new("OUT")),
			))
		});
		loader.register("B", || {
			Box::new(TestComponent::new(
				TestPortSet::new().with(TestPort::new("IN")),
				TestPortSet::new(),
			))
		});

		let mut network = NetworkCoordinator::new(Arc::new(loader), Arc::new(TestSocketFactory::<i32>::new()), CoordinatorConfig::default());

		let mut graph = GraphDef::<i32>::new();
		graph.nodes.push(GraphNode {
			id: NodeId::new("A"),
			component: Some("A".into()),
			metadata: Metadata::new(),
		});
		graph.nodes.push(GraphNode {
			id: NodeId::new("B"),
			component: Some("B".into()),
			metadata: Metadata::new(),
		});
		graph.edges.push(GraphEdge {
			from: GraphEndpoint {
				node: NodeId::new("A"),
				port: PortName::new("OUT"),
				index: None,
			},
			to: GraphEndpoint {
				node: NodeId::new("B"),
				port: PortName::new("NOSUCH"),
				index: None,
			},
			metadata: Metadata::new(),
		});

		let result = network.connect(graph).await;
		match result {
			Err(ConnectError::Edge {
				node,
				source: BuilderError::Attach(AttachError::NoSuchPort { node: port_node, port, direction }),
			}) => {
				assert_eq!(node, NodeId::new("B"));
				assert_eq!(port_node, NodeId::new("B"));
				assert_eq!(port, PortName::new("NOSUCH"));
				assert_eq!(direction, PortDirection::In);
			}
			other => panic!("expected a NoSuchPort edge failure, got {other:?}"),
		}
		assert_eq!(network.socket_count(), 0);
	}

	#[tokio::test]
	async fn unhandled_process_error_escalates_out_of_run_once() {
		let mut loader = TestLoader::<i32>::new();
		loader.register("A", || {
			Box::new(TestComponent::new(
				TestPortSet::new().with(TestPort::new("IN")),
				TestPortSet::new(),
			))
		});

		let factory = Arc::new(TestSocketFactory::<i32>::new());
		let mut network = NetworkCoordinator::new(
			Arc::new(loader),
			Arc::clone(&factory) as Arc<dyn SocketFactory<i32>>,
			CoordinatorConfig::default(),
		);

		let mut graph = GraphDef::<i32>::new();
		graph.nodes.push(GraphNode {
			id: NodeId::new("A"),
			component: Some("A".into()),
			metadata: Metadata::new(),
		});
		graph.initializers.push(GraphInitializer {
			data: 7,
			to: GraphEndpoint {
				node: NodeId::new("A"),
				port: PortName::new("IN"),
				index: None,
			},
			metadata: Metadata::new(),
		});
		network.connect(graph).await.unwrap();

		// No `subscribe()` call: nobody is listening.
		network.start().await.unwrap();
		network.run_once().await.unwrap();

		factory.raise_error(SocketId(0), "boom");
		let result = network.run_once().await;
		match result {
			Err(LifecycleError::Multiplex(MultiplexError::Unhandled { node, message })) => {
				assert_eq!(node, NodeId::new("A"));
				assert_eq!(message, "boom");
			}
			other => panic!("expected an unhandled process error, got {other:?}"),
		}
	}

	struct SubgraphComponent<D: PacketData> {
		inner: Arc<TokioMutex<NetworkCoordinator<D>>>,
		shell: TestComponent<D>,
	}

	impl<D: PacketData> SubgraphComponent<D> {
		fn new(inner: Arc<TokioMutex<NetworkCoordinator<D>>>) -> Self {
			Self {
				inner,
				shell: TestComponent::new(TestPortSet::new(), TestPortSet::new()),
			}
		}
	}

	#[async_trait]
	impl<D: PacketData> Component<D> for SubgraphComponent<D> {
		fn in_ports(&self) -> &dyn PortSet<D> {
			self.shell.in_ports()
		}

		fn in_ports_mut(&mut self) -> &mut dyn PortSet<D> {
			self.shell.in_ports_mut()
		}

		fn out_ports(&self) -> &dyn PortSet<D> {
			self.shell.out_ports()
		}

		fn out_ports_mut(&mut self) -> &mut dyn PortSet<D> {
			self.shell.out_ports_mut()
		}

		fn is_ready(&self) -> bool {
			self.shell.is_ready()
		}

		async fn ready(&mut self) {
			self.shell.ready().await
		}

		fn is_started(&self) -> bool {
			self.shell.is_started()
		}

		async fn start(&mut self) -> Result<(), ComponentError> {
			self.shell.start().await
		}

		async fn shutdown(&mut self) -> Result<(), ComponentError> {
			self.shell.shutdown().await
		}

		fn load(&self) -> u32 {
			self.shell.load()
		}

		fn subscribe_activity(&self) -> broadcast::Receiver<ComponentEvent> {
			self.shell.subscribe_activity()
		}

		fn as_subgraph(&self) -> Option<&dyn IsSubgraph<D>> {
			Some(self)
		}
	}

	impl<D: PacketData> IsSubgraph<D> for SubgraphComponent<D> {
		fn inner_network(&self) -> Arc<TokioMutex<NetworkCoordinator<D>>> {
			Arc::clone(&self.inner)
		}
	}

	#[tokio::test]
	async fn subgraph_events_are_tagged_with_the_embedding_node() {
		let mut inner_loader = TestLoader::<String>::new();
		inner_loader.register("X", || {
			Box::new(TestComponent::new(
				TestPortSet::new().with(TestPort::new("IN")),
				TestPortSet::new(),
			))
		});
		let inner = Arc::new(TokioMutex::new(NetworkCoordinator::new(
			Arc::new(inner_loader),
			Arc::new(TestSocketFactory::<String>::new()),
			CoordinatorConfig::default(),
		)));

		let mut outer_loader = TestLoader::<String>::new();
		let inner_for_builder = Arc::clone(&inner);
		outer_loader.register("Subgraph", move || Box::new(SubgraphComponent::new(Arc::clone(&inner_for_builder))));

		let mut outer = NetworkCoordinator::new(
			Arc::new(outer_loader),
			Arc::new(TestSocketFactory::<String>::new()),
			CoordinatorConfig::default(),
		);
		let mut outer_graph = GraphDef::<String>::new();
		outer_graph.nodes.push(GraphNode {
			id: NodeId::new("S"),
			component: Some("Subgraph".into()),
			metadata: Metadata::new(),
		});
		outer.connect(outer_graph).await.unwrap();

		let mut outer_events = outer.subscribe();
		outer.start().await.unwrap();
		outer.run_once().await.unwrap();
		drain_all(&mut outer_events); // the outer `Start`

		{
			let mut guard = inner.lock().await;
			let mut inner_graph = GraphDef::<String>::new();
			inner_graph.nodes.push(GraphNode {
				id: NodeId::new("X"),
				component: Some("X".into()),
				metadata: Metadata::new(),
			});
			inner_graph.initializers.push(GraphInitializer {
				data: "payload".to_string(),
				to: GraphEndpoint {
					node: NodeId::new("X"),
					port: PortName::new("IN"),
					index: None,
				},
				metadata: Metadata::new(),
			});
			guard.connect(inner_graph).await.unwrap();
			guard.start().await.unwrap();
			guard.run_once().await.unwrap();
		}

		outer.run_once().await.unwrap();
		let drained = drain_all(&mut outer_events);
		let tagged = drained.iter().find_map(|event| match event {
			NetworkEvent::Ip { data, subgraph, metadata, .. } if metadata.initial => Some((data.clone(), subgraph.clone())),
			_ => None,
		});
		let (data, subgraph) = tagged.expect("expected a tagged Ip event from the inner network");
		assert_eq!(data, "payload");
		assert_eq!(subgraph, vec![NodeId::new("S")]);
	}
}

fn tag_subgraph<D: PacketData>(parent: NodeId, event: NetworkEvent<D>) -> NetworkEvent<D> {
	match event {
		NetworkEvent::Ip {
			socket,
			kind,
			data,
			metadata,
			mut subgraph,
		} => {
			subgraph.insert(0, parent);
			NetworkEvent::Ip {
				socket,
				kind,
				data,
				metadata,
				subgraph,
			}
		}
		NetworkEvent::ProcessError {
			node,
			message,
			mut subgraph,
		} => {
			subgraph.insert(0, parent);
			NetworkEvent::ProcessError {
				node,
				message,
				subgraph,
			}
		}
		other => other,
	}
}
