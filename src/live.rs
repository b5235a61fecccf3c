// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Fan-out of match events to live dashboard subscribers.

use crate::models::MatchEvent;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct LiveFeed {
    tx: broadcast::Sender<MatchEvent>,
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Never blocks; events published with no subscribers are dropped.
    pub fn publish(&self, event: MatchEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Publishes in order, sleeping `pace` between events when non-zero.
    pub async fn publish_all(&self, events: Vec<MatchEvent>, pace: Duration) {
        let total = events.len();
        let mut delivered = 0usize;
        for ev in events {
            if self.publish(ev) > 0 {
                delivered += 1;
            }
            if !pace.is_zero() {
                tokio::time::sleep(pace).await;
            }
        }
        debug!(total, delivered, "match events broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchType;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tokio::sync::broadcast::error::RecvError;

    fn ev(id: &str) -> MatchEvent {
        MatchEvent {
            id: id.into(),
            match_type: MatchType::Exact,
            amount: Decimal::ONE,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            bank_desc: "b".into(),
            ledger_desc: "l".into(),
            confidence: 1.0,
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let feed = LiveFeed::new(4);
        assert_eq!(feed.publish(ev("a")), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let feed = LiveFeed::new(8);
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();
        feed.publish_all(vec![ev("1"), ev("2")], Duration::ZERO).await;
        assert_eq!(a.recv().await.unwrap().id, "1");
        assert_eq!(a.recv().await.unwrap().id, "2");
        assert_eq!(b.recv().await.unwrap().id, "1");
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_growing() {
        let feed = LiveFeed::new(2);
        let mut rx = feed.subscribe();
        for i in 0..5 {
            feed.publish(ev(&i.to_string()));
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.unwrap().id, "3");
    }
}
