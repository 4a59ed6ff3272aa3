//! Live position source as an explicit, cancellable subscription.
//!
//! A source hands out independent subscriptions so that multiple
//! sessions (real or under test) never interfere through a shared
//! callback registry.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use wildnav_core::models::GeoPoint;

/// One update from the live position stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionUpdate {
    Fix(GeoPoint),
    /// Stream failure (e.g. signal loss). The stream may recover.
    SignalLost,
}

/// Consumer half of a live position stream.
pub struct PositionSubscription {
    rx: mpsc::Receiver<PositionUpdate>,
    stop: watch::Sender<bool>,
}

/// Producer half, held by the position source implementation.
pub struct PositionFeed {
    tx: mpsc::Sender<PositionUpdate>,
    stop: watch::Receiver<bool>,
}

/// Create a connected feed/subscription pair.
pub fn channel(buffer: usize) -> (PositionFeed, PositionSubscription) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let (stop_tx, stop_rx) = watch::channel(false);
    (
        PositionFeed { tx, stop: stop_rx },
        PositionSubscription { rx, stop: stop_tx },
    )
}

impl PositionSubscription {
    /// Next update, or None once the stream has ended.
    pub async fn next(&mut self) -> Option<PositionUpdate> {
        self.rx.recv().await
    }

    /// Cancel the subscription. Synchronous: after this returns no
    /// further update can be observed through `next`.
    pub fn cancel(&mut self) {
        let _ = self.stop.send(true);
        self.rx.close();
    }
}

impl PositionFeed {
    /// Deliver an update. Returns false once the subscription is
    /// cancelled; producers should then stop.
    pub async fn send(&self, update: PositionUpdate) -> bool {
        if *self.stop.borrow() {
            return false;
        }
        self.tx.send(update).await.is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.stop.borrow()
    }
}

/// Something that can provide live position subscriptions.
pub trait PositionSource {
    fn subscribe(&self) -> PositionSubscription;
}

/// Replays a fixed script of updates at an interval. Used by the
/// simulator and by tests.
pub struct ScriptedSource {
    pub updates: Vec<PositionUpdate>,
    pub interval: Duration,
}

impl PositionSource for ScriptedSource {
    fn subscribe(&self) -> PositionSubscription {
        let (feed, subscription) = channel(16);
        let updates = self.updates.clone();
        let interval = self.interval;
        tokio::spawn(async move {
            for update in updates {
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                if !feed.send(update).await {
                    break;
                }
            }
        });
        subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_source_replays_in_order() {
        let source = ScriptedSource {
            updates: vec![
                PositionUpdate::Fix(GeoPoint::new(1.0, 2.0)),
                PositionUpdate::SignalLost,
                PositionUpdate::Fix(GeoPoint::new(1.1, 2.0)),
            ],
            interval: Duration::ZERO,
        };
        let mut sub = source.subscribe();
        assert_eq!(sub.next().await, Some(PositionUpdate::Fix(GeoPoint::new(1.0, 2.0))));
        assert_eq!(sub.next().await, Some(PositionUpdate::SignalLost));
        assert_eq!(sub.next().await, Some(PositionUpdate::Fix(GeoPoint::new(1.1, 2.0))));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn cancel_stops_delivery() {
        let (feed, mut sub) = channel(4);
        assert!(feed.send(PositionUpdate::SignalLost).await);
        sub.cancel();
        assert!(!feed.send(PositionUpdate::SignalLost).await);
        assert!(feed.is_cancelled());
    }
}
