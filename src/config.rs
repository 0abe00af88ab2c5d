//! In-process tuning knobs. The coordinator never reads the filesystem or
//! environment itself; a host embedding it is free to build this from
//! whatever configuration layer it already uses (env vars, a file, `serde`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::quiescence::DEBOUNCE;

/// Default capacity of the coordinator's external event broadcast channel.
const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Tuning knobs for one [`crate::NetworkCoordinator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
	/// How long the network must stay fully quiescent before `End` fires.
	#[serde(with = "duration_millis")]
	pub quiescence_debounce: Duration,

	/// Capacity of the external event broadcast channel (§6).
	pub event_channel_capacity: usize,
}

impl Default for CoordinatorConfig {
	fn default() -> Self {
		Self {
			quiescence_debounce: DEBOUNCE,
			event_channel_capacity: DEFAULT_EVENT_CAPACITY,
		}
	}
}

mod duration_millis {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		(value.as_millis() as u64).serialize(serializer)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		let millis = u64::deserialize(deserializer)?;
		Ok(Duration::from_millis(millis))
	}
}
