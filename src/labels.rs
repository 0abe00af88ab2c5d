//! Compact interned-ish identifiers used throughout the coordinator.

use serde::{Deserialize, Serialize};
use smartstring::{LazyCompact, SmartString};
use std::fmt::Display;

/// The id of a node (process) in a graph.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeId(SmartString<LazyCompact>);

impl NodeId {
	/// Make a new node id.
	pub fn new(id: &str) -> Self {
		Self(id.into())
	}
}

impl Display for NodeId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

impl From<&str> for NodeId {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for NodeId {
	fn from(value: String) -> Self {
		Self::new(&value)
	}
}

/// The name of a port on a component.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Serialize, Deserialize, PartialOrd, Ord)]
pub struct PortName(SmartString<LazyCompact>);

impl PortName {
	/// Make a new port name.
	pub fn new(id: &str) -> Self {
		Self(id.into())
	}
}

impl Display for PortName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

impl From<&str> for PortName {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for PortName {
	fn from(value: String) -> Self {
		Self::new(&value)
	}
}

/// The id of a socket, assigned by the coordinator when the socket is created.
///
/// Socket ids are only unique within one [`crate::NetworkCoordinator`]; they are not
/// meaningful across networks.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
pub struct SocketId(pub(crate) usize);

impl Display for SocketId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "socket#{}", self.0)
	}
}
