//! The component contract: the black-box unit of computation a process wraps.

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use crate::{
	errors::ComponentError,
	events::ComponentEvent,
	ip::PacketData,
	port::PortSet,
};

/// Core capability every component must implement.
///
/// Optional capabilities (today: [`IsSubgraph`]) are detected explicitly via
/// [`Component::as_subgraph`] rather than sniffed at runtime, per the
/// capability-interface redesign in §9 of the spec.
#[async_trait]
pub trait Component<D: PacketData>: Send + Sync {
	/// This component's inports.
	fn in_ports(&self) -> &dyn PortSet<D>;

	/// This component's inports, mutably.
	fn in_ports_mut(&mut self) -> &mut dyn PortSet<D>;

	/// This component's outports.
	fn out_ports(&self) -> &dyn PortSet<D>;

	/// This component's outports, mutably.
	fn out_ports_mut(&mut self) -> &mut dyn PortSet<D>;

	/// Whether the component is ready to have sockets attached to it.
	fn is_ready(&self) -> bool;

	/// Resolves once the component becomes ready. If the component is
	/// already ready, this resolves immediately.
	async fn ready(&mut self);

	/// Whether this component uses the legacy open-connection accounting
	/// (`open_connections`) instead of, or in addition to, `load`.
	fn is_legacy(&self) -> bool {
		false
	}

	/// Whether the component has been started.
	fn is_started(&self) -> bool;

	/// Start the component. A no-op if already started.
	async fn start(&mut self) -> Result<(), ComponentError>;

	/// Shut the component down. A no-op if already shut down.
	async fn shutdown(&mut self) -> Result<(), ComponentError>;

	/// The component's current activation load (modern accounting).
	fn load(&self) -> u32;

	/// The component's current open-connection count (legacy accounting).
	/// Components that don't use legacy accounting return 0.
	fn open_connections(&self) -> u32 {
		0
	}

	/// Subscribe to this component's activity events
	/// (`Activate`/`Deactivate`/`Icon`).
	fn subscribe_activity(&self) -> broadcast::Receiver<ComponentEvent>;

	/// The component's current icon, if it has one.
	fn icon(&self) -> Option<String> {
		None
	}

	/// If this component is a subgraph, a handle onto its inner network.
	fn as_subgraph(&self) -> Option<&dyn IsSubgraph<D>> {
		None
	}
}

/// The subgraph capability: a component whose implementation is itself a
/// network, driven by a nested [`crate::NetworkCoordinator`].
///
/// The inner coordinator is shared behind an `Arc<Mutex<_>>` so the owning
/// component can drive it while the outer coordinator's subgraph-subscription
/// task concurrently reads its event stream (§5, "shared resources").
pub trait IsSubgraph<D: PacketData>: Send + Sync {
	/// A handle onto the inner network driven by this subgraph component.
	fn inner_network(&self) -> std::sync::Arc<Mutex<crate::network::NetworkCoordinator<D>>>;
}
