//! Write-once outcome cell shared by the racing tasks of one request.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tokio::sync::oneshot::{self, Receiver, Sender};
// self
use crate::_prelude::*;

/// Cell that accepts exactly one value.
///
/// Writers race through a single compare-and-swap; only the winner's value reaches the receiver.
/// Losers get `false` back and must drop their value without side effects.
pub struct OutcomeSlot<T> {
	claimed: AtomicBool,
	sender: Mutex<Option<Sender<T>>>,
}
impl<T> OutcomeSlot<T> {
	/// Creates an empty slot and the receiver that observes its value.
	pub fn new() -> (Self, Receiver<T>) {
		let (sender, receiver) = oneshot::channel();

		(Self { claimed: AtomicBool::new(false), sender: Mutex::new(Some(sender)) }, receiver)
	}

	/// Attempts to write `value`; returns `true` only for the first caller.
	pub fn settle(&self, value: T) -> bool {
		if self.claimed.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
			return false;
		}
		if let Some(sender) = self.sender.lock().take() {
			// Receiver may be gone if the caller was cancelled; the claim still counts.
			let _ = sender.send(value);
		}

		true
	}

	/// Returns `true` once any writer has claimed the slot.
	pub fn is_settled(&self) -> bool {
		self.claimed.load(Ordering::Acquire)
	}
}
impl<T> Debug for OutcomeSlot<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OutcomeSlot").field("settled", &self.is_settled()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		sync::{
			Barrier,
			atomic::{AtomicUsize, Ordering},
		},
		thread,
	};
	// self
	use super::*;

	#[tokio::test]
	async fn first_writer_wins() {
		let (slot, receiver) = OutcomeSlot::new();

		assert!(!slot.is_settled());
		assert!(slot.settle("network"));
		assert!(!slot.settle("timer"));
		assert!(slot.is_settled());
		assert_eq!(receiver.await.expect("Winner should be delivered."), "network");
	}

	#[test]
	fn concurrent_writers_claim_once() {
		const WRITERS: usize = 8;

		let (slot, mut receiver) = OutcomeSlot::new();
		let slot = Arc::new(slot);
		let barrier = Arc::new(Barrier::new(WRITERS));
		let winners = Arc::new(AtomicUsize::new(0));
		let handles = (0..WRITERS)
			.map(|writer| {
				let slot = slot.clone();
				let barrier = barrier.clone();
				let winners = winners.clone();

				thread::spawn(move || {
					barrier.wait();

					if slot.settle(writer) {
						winners.fetch_add(1, Ordering::SeqCst);
					}
				})
			})
			.collect::<Vec<_>>();

		for handle in handles {
			handle.join().expect("Writer thread should not panic.");
		}

		assert_eq!(winners.load(Ordering::SeqCst), 1);
		assert!(receiver.try_recv().is_ok());
	}

	#[test]
	fn settling_after_receiver_drop_still_claims() {
		let (slot, receiver) = OutcomeSlot::new();

		drop(receiver);

		assert!(slot.settle(1));
		assert!(!slot.settle(2));
	}
}
