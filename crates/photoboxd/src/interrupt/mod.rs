//! Bridge from hardware interrupt context into the hub's event stream.
//!
//! Interrupt callbacks run on threads the hub does not control. They only
//! ever touch an [`InterruptProducer`], whose `push` is a plain synchronous
//! call. The hub owns the single [`InterruptBridge`] consumer and drains it
//! from a fixed-interval poll task.
//!
//! ```text
//!  GPIO thread(s)                         tokio runtime
//! ┌──────────────────┐  push()   ┌──────────────┐  drain() every tick
//! │InterruptProducer │──────────▶│   unbounded  │──────────────────▶ Event queue
//! │   (Clone, Send)  │           │  FIFO queue  │   (poll task)
//! └──────────────────┘           └──────────────┘
//! ```
//!
//! The queue is unbounded and drops nothing: button presses are rare, and
//! coalescing bursts is left to the line's debounce and to clients.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use photobox_core::InterruptSignal;
use photobox_protocol::Event;

#[cfg(feature = "gpio")]
mod gpio;

#[cfg(feature = "gpio")]
pub use gpio::{GpioButtons, GpioError};

/// Default interval between two drains of the bridge.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Producer side of the bridge, safe to use from any thread.
#[derive(Debug, Clone)]
pub struct InterruptProducer {
    sender: mpsc::UnboundedSender<InterruptSignal>,
}

impl InterruptProducer {
    /// Queues a signal. Never blocks.
    ///
    /// Returns `false` if the consumer is gone (hub shut down).
    pub fn push(&self, signal: InterruptSignal) -> bool {
        self.sender.send(signal).is_ok()
    }
}

/// Single-consumer side of the bridge, owned by the hub.
#[derive(Debug)]
pub struct InterruptBridge {
    sender: mpsc::UnboundedSender<InterruptSignal>,
    receiver: mpsc::UnboundedReceiver<InterruptSignal>,
}

impl InterruptBridge {
    /// Creates an empty bridge.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    /// Returns a new producer feeding this bridge.
    pub fn producer(&self) -> InterruptProducer {
        InterruptProducer {
            sender: self.sender.clone(),
        }
    }

    /// Takes every pending signal, oldest first. Never blocks.
    pub fn drain(&mut self) -> Vec<InterruptSignal> {
        let mut signals = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(signal) => signals.push(signal),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        signals
    }
}

impl Default for InterruptBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the poll task that turns drained signals into events.
///
/// Every `poll_interval` the bridge is drained and each signal is forwarded
/// to `events` in arrival order. The task ends when `cancel_token` fires or
/// the event queue closes.
pub fn spawn_interrupt_poller(
    mut bridge: InterruptBridge,
    events: mpsc::Sender<Event>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    debug!("Interrupt poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    for signal in bridge.drain() {
                        info!(signal = %signal, "Hardware signal received");
                        if events.send(Event::from(signal)).await.is_err() {
                            debug!("Event queue closed, interrupt poller stopping");
                            return;
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empty_bridge() {
        let mut bridge = InterruptBridge::new();
        assert!(bridge.drain().is_empty());
    }

    #[test]
    fn test_drain_preserves_order_and_duplicates() {
        let mut bridge = InterruptBridge::new();
        let producer = bridge.producer();
        assert!(producer.push(InterruptSignal::ButtonPressed));
        assert!(producer.push(InterruptSignal::Settings));
        assert!(producer.push(InterruptSignal::ButtonPressed));

        assert_eq!(
            bridge.drain(),
            vec![
                InterruptSignal::ButtonPressed,
                InterruptSignal::Settings,
                InterruptSignal::ButtonPressed
            ]
        );
        // Consumed exactly once.
        assert!(bridge.drain().is_empty());
    }

    #[test]
    fn test_push_from_other_threads() {
        let mut bridge = InterruptBridge::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let producer = bridge.producer();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        producer.push(InterruptSignal::ButtonPressed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(bridge.drain().len(), 100);
    }

    #[test]
    fn test_push_after_bridge_dropped() {
        let bridge = InterruptBridge::new();
        let producer = bridge.producer();
        drop(bridge);
        assert!(!producer.push(InterruptSignal::Settings));
    }

    #[tokio::test]
    async fn test_poller_forwards_signals_as_events() {
        let bridge = InterruptBridge::new();
        let producer = bridge.producer();
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = spawn_interrupt_poller(bridge, tx, Duration::from_millis(5), cancel.clone());

        producer.push(InterruptSignal::ButtonPressed);
        producer.push(InterruptSignal::Settings);

        assert_eq!(rx.recv().await, Some(Event::ButtonPressed));
        assert_eq!(rx.recv().await, Some(Event::Settings));

        cancel.cancel();
        task.await.unwrap();
    }
}
