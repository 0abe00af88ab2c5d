//! In-memory reference implementations of every external collaborator
//! trait, used only by this crate's own test suite.

use std::{
	collections::BTreeMap,
	sync::{
		atomic::{AtomicBool, AtomicU32, Ordering},
		Arc, Mutex as StdMutex,
	},
};

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};

use crate::{
	component::Component,
	errors::{AttachError, ComponentError, LoaderError},
	events::{ComponentEvent, SocketEvent},
	graph::{ComponentLoader, Metadata},
	ip::{Ip, PacketData},
	labels::{PortName, SocketId},
	port::{Port, PortSet},
	socket::{Socket, SocketEndpoints, SocketFactory, SocketMetadata},
};

/// A single in-memory port: optionally addressable, optionally carrying a
/// default value.
pub struct TestPort<D> {
	name: PortName,
	addressable: bool,
	default: Option<D>,
	attached: Vec<SocketId>,
}

impl<D: PacketData> TestPort<D> {
	pub fn new(name: &str) -> Self {
		Self {
			name: PortName::new(name),
			addressable: false,
			default: None,
			attached: Vec::new(),
		}
	}

	pub fn addressable(mut self) -> Self {
		self.addressable = true;
		self
	}

	pub fn with_default(mut self, value: D) -> Self {
		self.default = Some(value);
		self
	}
}

impl<D: PacketData> Port<D> for TestPort<D> {
	fn name(&self) -> &PortName {
		&self.name
	}

	fn is_addressable(&self) -> bool {
		self.addressable
	}

	fn attach(&mut self, socket: SocketId, _index: Option<usize>) {
		self.attached.push(socket);
	}

	fn detach(&mut self, socket: SocketId) {
		self.attached.retain(|existing| *existing != socket);
	}

	fn has_default(&self) -> bool {
		self.default.is_some()
	}

	fn default_value(&self) -> Option<D> {
		self.default.clone()
	}

	fn attached_sockets(&self) -> &[SocketId] {
		&self.attached
	}
}

/// A named set of [`TestPort`]s.
#[derive(Default)]
pub struct TestPortSet<D>(BTreeMap<PortName, TestPort<D>>);

impl<D: PacketData> TestPortSet<D> {
	pub fn new() -> Self {
		Self(BTreeMap::new())
	}

	pub fn with(mut self, port: TestPort<D>) -> Self {
		self.0.insert(port.name.clone(), port);
		self
	}
}

impl<D: PacketData> PortSet<D> for TestPortSet<D> {
	fn get(&self, name: &PortName) -> Option<&dyn Port<D>> {
		self.0.get(name).map(|port| port as &dyn Port<D>)
	}

	fn get_mut(&mut self, name: &PortName) -> Option<&mut dyn Port<D>> {
		self.0.get_mut(name).map(|port| port as &mut dyn Port<D>)
	}

	fn names(&self) -> Vec<PortName> {
		self.0.keys().cloned().collect()
	}
}

/// A component whose readiness, activation, and lifecycle are all driven by
/// hand, for deterministic tests.
pub struct TestComponent<D: PacketData> {
	in_ports: TestPortSet<D>,
	out_ports: TestPortSet<D>,
	ready: Arc<AtomicBool>,
	ready_notify: Arc<Notify>,
	started: bool,
	load: Arc<AtomicU32>,
	legacy: bool,
	open_connections: Arc<AtomicU32>,
	activity_tx: broadcast::Sender<ComponentEvent>,
	icon: Option<String>,
}

impl<D: PacketData> TestComponent<D> {
	pub fn new(in_ports: TestPortSet<D>, out_ports: TestPortSet<D>) -> Self {
		let (activity_tx, _) = broadcast::channel(64);
		Self {
			in_ports,
			out_ports,
			ready: Arc::new(AtomicBool::new(true)),
			ready_notify: Arc::new(Notify::new()),
			started: false,
			load: Arc::new(AtomicU32::new(0)),
			legacy: false,
			open_connections: Arc::new(AtomicU32::new(0)),
			activity_tx,
			icon: None,
		}
	}

	pub fn not_ready(mut self) -> Self {
		self.ready = Arc::new(AtomicBool::new(false));
		self
	}

	pub fn legacy(mut self) -> Self {
		self.legacy = true;
		self
	}

	/// A handle that can flip this component ready after construction,
	/// independent of the component itself (which the process table owns).
	pub fn readiness_handle(&self) -> (Arc<AtomicBool>, Arc<Notify>) {
		(Arc::clone(&self.ready), Arc::clone(&self.ready_notify))
	}

	pub fn activate(&self) {
		ActivityHandle {
			load: Arc::clone(&self.load),
			tx: self.activity_tx.clone(),
		}
		.activate();
	}

	pub fn deactivate(&self) {
		ActivityHandle {
			load: Arc::clone(&self.load),
			tx: self.activity_tx.clone(),
		}
		.deactivate();
	}

	/// A handle that can drive `Activate`/`Deactivate` independently of the
	/// component itself, once it has been moved into a process table.
	pub fn activity_handle(&self) -> ActivityHandle {
		ActivityHandle {
			load: Arc::clone(&self.load),
			tx: self.activity_tx.clone(),
		}
	}

	pub fn legacy_connect(&self) {
		self.open_connections.fetch_add(1, Ordering::SeqCst);
	}

	pub fn legacy_disconnect(&self) {
		self.open_connections.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some(c.saturating_sub(1))).ok();
	}
}

/// Flip a component's readiness flag and wake any waiter, from outside the
/// process table.
pub fn make_ready(handle: &(Arc<AtomicBool>, Arc<Notify>)) {
	handle.0.store(true, Ordering::SeqCst);
	handle.1.notify_waiters();
}

/// Drives a [`TestComponent`]'s activation state from outside the process
/// table that owns it.
pub struct ActivityHandle {
	load: Arc<AtomicU32>,
	tx: broadcast::Sender<ComponentEvent>,
}

impl ActivityHandle {
	pub fn activate(&self) {
		let load = self.load.fetch_add(1, Ordering::SeqCst) + 1;
		let _ = self.tx.send(ComponentEvent::Activate(load));
	}

	pub fn deactivate(&self) {
		let previous = self
			.load
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |load| Some(load.saturating_sub(1)))
			.unwrap_or(0);
		let new_load = previous.saturating_sub(1);
		let _ = self.tx.send(ComponentEvent::Deactivate(new_load));
	}
}

#[async_trait]
impl<D: PacketData> Component<D> for TestComponent<D> {
	fn in_ports(&self) -> &dyn PortSet<D> {
		&self.in_ports
	}

	fn in_ports_mut(&mut self) -> &mut dyn PortSet<D> {
		&mut self.in_ports
	}

	fn out_ports(&self) -> &dyn PortSet<D> {
		&self.out_ports
	}

	fn out_ports_mut(&mut self) -> &mut dyn PortSet<D> {
		&mut self.out_ports
	}

	fn is_ready(&self) -> bool {
		self.ready.load(Ordering::SeqCst)
	}

	async fn ready(&mut self) {
		while !self.is_ready() {
			self.ready_notify.notified().await;
		}
	}

	fn is_legacy(&self) -> bool {
		self.legacy
	}

	fn is_started(&self) -> bool {
		self.started
	}

	async fn start(&mut self) -> Result<(), ComponentError> {
		self.started = true;
		Ok(())
	}

	async fn shutdown(&mut self) -> Result<(), ComponentError> {
		self.started = false;
		Ok(())
	}

	fn load(&self) -> u32 {
		self.load.load(Ordering::SeqCst)
	}

	fn open_connections(&self) -> u32 {
		self.open_connections.load(Ordering::SeqCst)
	}

	fn subscribe_activity(&self) -> broadcast::Receiver<ComponentEvent> {
		self.activity_tx.subscribe()
	}

	fn icon(&self) -> Option<String> {
		self.icon.clone()
	}
}

/// A socket that delivers synchronously: `post` immediately re-emits the IP
/// as a `SocketEvent::Ip` to its own subscribers.
pub struct TestSocket<D> {
	id: SocketId,
	endpoints: SocketEndpoints,
	metadata: SocketMetadata,
	connected: bool,
	debug: bool,
	events: broadcast::Sender<SocketEvent<D>>,
}

#[async_trait]
impl<D: PacketData> Socket<D> for TestSocket<D> {
	fn id(&self) -> SocketId {
		self.id
	}

	async fn post(&mut self, ip: Ip<D>) -> Result<(), AttachError> {
		let _ = self.events.send(SocketEvent::Ip {
			kind: ip.kind,
			data: ip.data,
			metadata: ip.metadata,
		});
		Ok(())
	}

	async fn connect(&mut self) {
		self.connected = true;
		let _ = self.events.send(SocketEvent::Connect);
	}

	async fn send(&mut self) {}

	async fn disconnect(&mut self) {
		self.connected = false;
		let _ = self.events.send(SocketEvent::Disconnect);
	}

	fn is_connected(&self) -> bool {
		self.connected
	}

	fn set_debug(&mut self, debug: bool) {
		self.debug = debug;
	}

	fn endpoints(&self) -> &SocketEndpoints {
		&self.endpoints
	}

	fn endpoints_mut(&mut self) -> &mut SocketEndpoints {
		&mut self.endpoints
	}

	fn metadata(&self) -> &SocketMetadata {
		&self.metadata
	}

	fn subscribe(&self) -> broadcast::Receiver<SocketEvent<D>> {
		self.events.subscribe()
	}
}

/// Builds [`TestSocket`]s, keeping a side-table of each one's event sender so
/// a test can inject a transport error onto a socket it otherwise has no
/// handle to (the registry only ever hands out `&dyn Socket<D>`).
#[derive(Default)]
pub struct TestSocketFactory<D> {
	senders: StdMutex<BTreeMap<SocketId, broadcast::Sender<SocketEvent<D>>>>,
}

impl<D: PacketData> TestSocketFactory<D> {
	pub fn new() -> Self {
		Self {
			senders: StdMutex::new(BTreeMap::new()),
		}
	}

	/// Raise a transport error on the named socket, as if its underlying
	/// connection had failed.
	pub fn raise_error(&self, id: SocketId, message: impl Into<String>) {
		if let Some(sender) = self.senders.lock().expect("poisoned").get(&id) {
			let _ = sender.send(SocketEvent::Error(message.into()));
		}
	}
}

impl<D: PacketData> SocketFactory<D> for TestSocketFactory<D> {
	fn create(&self, id: SocketId, metadata: SocketMetadata) -> Box<dyn Socket<D>> {
		let (events, _) = broadcast::channel(64);
		self.senders.lock().expect("poisoned").insert(id, events.clone());
		Box::new(TestSocket {
			id,
			endpoints: SocketEndpoints::default(),
			metadata,
			connected: false,
			debug: false,
			events,
		})
	}
}

type ComponentBuilder<D> = Arc<dyn Fn() -> Box<dyn Component<D>> + Send + Sync>;

/// Resolves component names to freshly-built [`TestComponent`]s registered
/// ahead of time.
#[derive(Default)]
pub struct TestLoader<D: PacketData> {
	builders: BTreeMap<String, ComponentBuilder<D>>,
}

impl<D: PacketData> TestLoader<D> {
	pub fn new() -> Self {
		Self {
			builders: BTreeMap::new(),
		}
	}

	pub fn register(&mut self, name: &str, builder: impl Fn() -> Box<dyn Component<D>> + Send + Sync + 'static) {
		self.builders.insert(name.to_string(), Arc::new(builder));
	}
}

#[async_trait]
impl<D: PacketData> ComponentLoader<D> for TestLoader<D> {
	async fn load(&self, component_name: &str, _metadata: &Metadata) -> Result<Box<dyn Component<D>>, LoaderError> {
		match self.builders.get(component_name) {
			Some(builder) => Ok(builder()),
			None => Err(LoaderError::UnknownComponent {
				name: component_name.to_string(),
			}),
		}
	}
}
