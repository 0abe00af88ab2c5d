//! C7: the quiescence detector — debounced end-of-run detection.

use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::{component::Component, ip::PacketData};

/// How long the network must stay fully quiescent before `End` fires.
pub(crate) const DEBOUNCE: Duration = Duration::from_millis(50);

/// A process is active if it reports load under modern accounting, or open
/// connections under legacy accounting. Both are counted; the set is the
/// union (§4.7).
pub fn is_active<D: PacketData>(component: &dyn Component<D>) -> bool {
	component.load() > 0 || component.open_connections() > 0
}

/// Debounced quiescence detection: a pending end-of-run check can be
/// aborted by a subsequent activation before its delay elapses.
pub struct QuiescenceDetector {
	generation: Arc<AtomicU64>,
	wake_tx: mpsc::UnboundedSender<u64>,
	wake_rx: mpsc::UnboundedReceiver<u64>,
}

impl QuiescenceDetector {
	/// A detector with no pending check.
	pub fn new() -> Self {
		let (wake_tx, wake_rx) = mpsc::unbounded_channel();
		Self {
			generation: Arc::new(AtomicU64::new(0)),
			wake_tx,
			wake_rx,
		}
	}

	/// A process activated: abort any in-flight debounced check.
	pub fn on_activate(&self) {
		self.generation.fetch_add(1, Ordering::SeqCst);
	}

	/// Called on every deactivation once the network as a whole has become
	/// quiescent (`active_processes()` empty). Schedules a debounced
	/// re-check; a concurrent [`QuiescenceDetector::on_activate`] invalidates
	/// it before it fires.
	pub fn schedule_check(&self, debounce: Duration) {
		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let current = Arc::clone(&self.generation);
		let wake_tx = self.wake_tx.clone();
		tokio::spawn(async move {
			tokio::time::sleep(debounce).await;
			if current.load(Ordering::SeqCst) == generation {
				let _ = wake_tx.send(generation);
			}
		});
	}

	/// Non-blocking: true if a debounced check fired and was not since
	/// invalidated by an activation. The caller is still responsible for
	/// re-verifying `active_processes()` before emitting `End`, since a
	/// reactivation can race the wake message itself.
	pub fn poll_fired(&mut self) -> bool {
		let mut fired = false;
		while let Ok(generation) = self.wake_rx.try_recv() {
			if self.generation.load(Ordering::SeqCst) == generation {
				fired = true;
			}
		}
		fired
	}
}

impl Default for QuiescenceDetector {
	fn default() -> Self {
		Self::new()
	}
}
