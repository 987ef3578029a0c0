//! Single-flight bookkeeping for revalidation.
//!
//! At most one refresh may be in flight per key within one process. The
//! first caller to join becomes the leader and runs the fetch; everyone
//! else follows the same flight and receives the leader's settlement. The
//! record lives only in this map, keyed per engine instance, and is removed
//! exactly once when the flight settles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use larder_core::{CacheError, CacheResult};

/// The outcome published to every caller awaiting a flight.
pub(crate) type Settlement<V> = CacheResult<V>;

/// Per-key in-flight refresh records.
pub(crate) struct FlightMap<V> {
    seats: Mutex<HashMap<String, broadcast::Sender<Settlement<V>>>>,
}

/// A caller's position in a flight.
pub(crate) enum Flight<V: Clone> {
    /// No flight was outstanding; this caller runs the fetch and must
    /// settle the guard with the outcome.
    Lead(FlightGuard<V>),
    /// A flight is outstanding; await its settlement.
    Follow(broadcast::Receiver<Settlement<V>>),
}

impl<V: Clone> FlightMap<V> {
    pub fn new() -> Self {
        Self {
            seats: Mutex::new(HashMap::new()),
        }
    }

    /// Join the flight for a key, leading it if none is outstanding.
    pub fn join(self: &Arc<Self>, key: &str) -> Flight<V> {
        let mut seats = self.lock();
        if let Some(tx) = seats.get(key) {
            return Flight::Follow(tx.subscribe());
        }
        let (tx, _rx) = broadcast::channel(1);
        seats.insert(key.to_string(), tx);
        Flight::Lead(FlightGuard::new(Arc::clone(self), key))
    }

    /// Lead a flight for a key, or back off if one is already outstanding.
    ///
    /// Used by fire-and-forget refreshes, where a caller that is not the
    /// leader has nothing to wait for.
    pub fn try_lead(self: &Arc<Self>, key: &str) -> Option<FlightGuard<V>> {
        let mut seats = self.lock();
        if seats.contains_key(key) {
            return None;
        }
        let (tx, _rx) = broadcast::channel(1);
        seats.insert(key.to_string(), tx);
        Some(FlightGuard::new(Arc::clone(self), key))
    }

    /// Whether a flight is outstanding for the key.
    #[cfg(test)]
    pub fn in_flight(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn settle(&self, key: &str, result: Settlement<V>) {
        let tx = self.lock().remove(key);
        if let Some(tx) = tx {
            // Send fails when no follower subscribed, which is fine.
            let _ = tx.send(result);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<Settlement<V>>>> {
        self.seats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Leadership of one in-flight refresh.
///
/// Dropping the guard without settling publishes an abort to any followers,
/// so an abandoned leader never strands them or wedges the key.
pub(crate) struct FlightGuard<V: Clone> {
    map: Arc<FlightMap<V>>,
    key: String,
    settled: bool,
}

impl<V: Clone> FlightGuard<V> {
    fn new(map: Arc<FlightMap<V>>, key: &str) -> Self {
        Self {
            map,
            key: key.to_string(),
            settled: false,
        }
    }

    /// Publish the outcome to all followers and release the record.
    pub fn settle(mut self, result: Settlement<V>) {
        self.settled = true;
        self.map.settle(&self.key, result);
    }
}

impl<V: Clone> Drop for FlightGuard<V> {
    fn drop(&mut self) {
        if !self.settled {
            self.map.settle(
                &self.key,
                Err(CacheError::RevalidationAborted {
                    key: self.key.clone(),
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_caller_leads_second_follows() {
        let map: Arc<FlightMap<u32>> = Arc::new(FlightMap::new());

        let guard = match map.join("k") {
            Flight::Lead(guard) => guard,
            Flight::Follow(_) => panic!("first caller should lead"),
        };
        let mut rx = match map.join("k") {
            Flight::Follow(rx) => rx,
            Flight::Lead(_) => panic!("second caller should follow"),
        };

        guard.settle(Ok(7));

        assert_eq!(rx.recv().await.unwrap(), Ok(7));
        assert!(!map.in_flight("k"));
    }

    #[tokio::test]
    async fn test_record_is_removed_once_on_settle() {
        let map: Arc<FlightMap<u32>> = Arc::new(FlightMap::new());

        match map.join("k") {
            Flight::Lead(guard) => guard.settle(Ok(1)),
            Flight::Follow(_) => panic!("expected lead"),
        }

        // Settled flights leave nothing behind; the next caller leads anew.
        assert!(matches!(map.join("k"), Flight::Lead(_)));
    }

    #[tokio::test]
    async fn test_failure_settlement_reaches_all_followers() {
        let map: Arc<FlightMap<u32>> = Arc::new(FlightMap::new());

        let guard = match map.join("k") {
            Flight::Lead(guard) => guard,
            Flight::Follow(_) => panic!("expected lead"),
        };
        let mut rx_a = match map.join("k") {
            Flight::Follow(rx) => rx,
            Flight::Lead(_) => panic!("expected follow"),
        };
        let mut rx_b = match map.join("k") {
            Flight::Follow(rx) => rx,
            Flight::Lead(_) => panic!("expected follow"),
        };

        let err = CacheError::Upstream {
            key: "k".to_string(),
            reason: "boom".to_string(),
        };
        guard.settle(Err(err.clone()));

        assert_eq!(rx_a.recv().await.unwrap(), Err(err.clone()));
        assert_eq!(rx_b.recv().await.unwrap(), Err(err));
    }

    #[tokio::test]
    async fn test_try_lead_backs_off_while_outstanding() {
        let map: Arc<FlightMap<u32>> = Arc::new(FlightMap::new());

        let guard = map.try_lead("k").expect("no flight outstanding yet");
        assert!(map.try_lead("k").is_none());

        guard.settle(Ok(1));
        assert!(map.try_lead("k").is_some());
    }

    #[tokio::test]
    async fn test_dropped_leader_aborts_followers() {
        let map: Arc<FlightMap<u32>> = Arc::new(FlightMap::new());

        let guard = match map.join("k") {
            Flight::Lead(guard) => guard,
            Flight::Follow(_) => panic!("expected lead"),
        };
        let mut rx = match map.join("k") {
            Flight::Follow(rx) => rx,
            Flight::Lead(_) => panic!("expected follow"),
        };

        drop(guard);

        assert_eq!(
            rx.recv().await.unwrap(),
            Err(CacheError::RevalidationAborted {
                key: "k".to_string()
            })
        );
        assert!(!map.in_flight("k"));
    }

    #[tokio::test]
    async fn test_keys_fly_independently() {
        let map: Arc<FlightMap<u32>> = Arc::new(FlightMap::new());

        let _guard_a = map.try_lead("a").expect("lead a");
        assert!(map.try_lead("b").is_some());
    }
}
