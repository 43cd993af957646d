/// Dream Garage: the persisted collection of liked vehicles
///
/// The garage is a service object that owns its storage backend.
/// Every mutation swaps in a new immutable snapshot, writes the whole
/// collection back to storage and notifies subscribers once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::data::Vehicle;
use super::storage::KeyValueStorage;

/// Storage key used by the dealership site
pub const DEFAULT_STORAGE_KEY: &str = "woody-motors-dream-garage";

/// Persisted envelope version
const ENVELOPE_VERSION: u32 = 0;

/// Immutable view of the garage at one point in time
pub type GarageSnapshot = Arc<[Vehicle]>;

/// Handle returned by [`Garage::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&GarageSnapshot) + Send>;

/// Entries are written as `Vehicle` and read back as raw JSON so one
/// bad entry can be skipped without losing the rest
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GarageState<T> {
    #[serde(default = "Vec::new")]
    liked_vehicles: Vec<T>,
}

/// What ends up under the storage key
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PersistedGarage<T> {
    state: GarageState<T>,
    #[serde(default)]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

pub struct Garage<S: KeyValueStorage> {
    storage: S,
    key: String,
    liked: GarageSnapshot,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl<S: KeyValueStorage> Garage<S> {
    /// Open the garage under the default key, hydrating from storage
    pub fn new(storage: S) -> Self {
        Self::with_key(storage, DEFAULT_STORAGE_KEY)
    }

    /// Open the garage under a custom storage key
    ///
    /// Missing, unreadable or corrupted data yields an empty garage.
    pub fn with_key(storage: S, key: impl Into<String>) -> Self {
        let key = key.into();
        let liked = hydrate(&storage, &key);
        debug!("Garage hydrated with {} vehicles", liked.len());

        Self {
            storage,
            key,
            liked,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Like the vehicle if it is not in the garage, otherwise remove it
    ///
    /// Returns whether the vehicle is liked after the call.
    pub fn toggle_like(&mut self, vehicle: Vehicle) -> bool {
        let exists = self.is_liked(&vehicle.id);

        let next: GarageSnapshot = if exists {
            self.liked
                .iter()
                .filter(|v| v.id != vehicle.id)
                .cloned()
                .collect()
        } else {
            self.liked
                .iter()
                .cloned()
                .chain(std::iter::once(vehicle))
                .collect()
        };

        self.replace(next);
        !exists
    }

    /// Check whether a vehicle id is in the garage
    pub fn is_liked(&self, vehicle_id: &str) -> bool {
        self.liked.iter().any(|v| v.id == vehicle_id)
    }

    /// Remove every vehicle. Clearing an empty garage does nothing.
    pub fn clear_garage(&mut self) {
        if self.liked.is_empty() {
            return;
        }
        self.replace(Arc::from(Vec::new()));
    }

    /// Liked vehicles, oldest like first
    pub fn liked_vehicles(&self) -> GarageSnapshot {
        Arc::clone(&self.liked)
    }

    pub fn len(&self) -> usize {
        self.liked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.liked.is_empty()
    }

    /// Register a listener called with the new snapshot after each change
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GarageSnapshot) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    /// Borrow the storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn replace(&mut self, next: GarageSnapshot) {
        self.liked = next;
        self.persist();

        let snapshot = Arc::clone(&self.liked);
        for (_, listener) in self.listeners.iter_mut() {
            listener(&snapshot);
        }
    }

    /// Write the whole collection. Failures are logged and dropped;
    /// the in-memory garage stays authoritative.
    fn persist(&self) {
        let envelope = PersistedGarage {
            state: GarageState {
                liked_vehicles: self.liked.to_vec(),
            },
            version: ENVELOPE_VERSION,
            saved_at: Some(Utc::now()),
        };

        let json = match serde_json::to_string(&envelope) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize garage: {}", e);
                return;
            }
        };

        if let Err(e) = self.storage.set_item(&self.key, &json) {
            warn!("⚠️  Garage not saved ({}), keeping changes in memory", e);
        }
    }
}

fn hydrate<S: KeyValueStorage>(storage: &S, key: &str) -> GarageSnapshot {
    let raw = match storage.get_item(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Arc::from(Vec::new()),
        Err(e) => {
            warn!("Could not read garage from storage ({}), starting empty", e);
            return Arc::from(Vec::new());
        }
    };

    let envelope: PersistedGarage<Value> = match serde_json::from_str(&raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Stored garage under '{}' is corrupted ({}), starting empty", key, e);
            return Arc::from(Vec::new());
        }
    };

    // Older writes may hold the same vehicle twice; keep the first
    let mut seen = HashSet::new();
    envelope
        .state
        .liked_vehicles
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value::<Vehicle>(entry) {
            Ok(vehicle) => Some(vehicle),
            Err(e) => {
                warn!("Skipping stored garage entry {} ({})", i, e);
                None
            }
        })
        .filter(|v| seen.insert(v.id.clone()))
        .collect()
}

impl<S: KeyValueStorage + std::fmt::Debug> std::fmt::Debug for Garage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Garage")
            .field("storage", &self.storage)
            .field("key", &self.key)
            .field("liked", &self.liked.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::storage::{MemoryStorage, SqliteStorage};
    use std::sync::Mutex;

    fn vehicle(id: &str) -> Vehicle {
        Vehicle::new(id, "Toyota", format!("Model {}", id), 2020, 20000.0)
    }

    fn ids(garage: &Garage<MemoryStorage>) -> Vec<String> {
        garage.liked_vehicles().iter().map(|v| v.id.clone()).collect()
    }

    #[test]
    fn test_toggle_twice_restores_prior_state() {
        let mut garage = Garage::new(MemoryStorage::new());
        garage.toggle_like(vehicle("a"));
        garage.toggle_like(vehicle("b"));
        let before = garage.liked_vehicles();

        assert!(garage.toggle_like(vehicle("c")));
        assert!(!garage.toggle_like(vehicle("c")));

        assert_eq!(&*garage.liked_vehicles(), &*before);
    }

    #[test]
    fn test_ids_stay_unique() {
        let mut garage = Garage::new(MemoryStorage::new());
        for id in ["a", "b", "a", "c", "b", "a", "d", "c"] {
            garage.toggle_like(vehicle(id));
        }

        let ids = ids(&garage);
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(ids, vec!["a", "d"]);
    }

    #[test]
    fn test_reliked_vehicle_moves_to_end() {
        let mut garage = Garage::new(MemoryStorage::new());
        garage.toggle_like(vehicle("a"));
        garage.toggle_like(vehicle("b"));
        garage.toggle_like(vehicle("c"));
        assert_eq!(ids(&garage), vec!["a", "b", "c"]);

        garage.toggle_like(vehicle("b"));
        garage.toggle_like(vehicle("b"));
        assert_eq!(ids(&garage), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_is_liked() {
        let mut garage = Garage::new(MemoryStorage::new());
        assert!(!garage.is_liked("a"));
        garage.toggle_like(vehicle("a"));
        assert!(garage.is_liked("a"));
        assert!(!garage.is_liked("b"));
    }

    #[test]
    fn test_reload_hydrates_identical_garage() {
        let storage = MemoryStorage::new();
        let mut garage = Garage::new(storage.clone());

        let mut pricey = vehicle("a");
        pricey.price = 123456.5;
        pricey.images = vec!["data:image/jpeg;base64,AAAA".to_string()];
        pricey
            .extra
            .insert("color".to_string(), serde_json::Value::from("red"));
        garage.toggle_like(pricey);
        garage.toggle_like(vehicle("b"));
        garage.toggle_like(vehicle("c"));

        let reloaded = Garage::new(storage);
        assert_eq!(&*reloaded.liked_vehicles(), &*garage.liked_vehicles());
    }

    #[test]
    fn test_envelope_layout() {
        let storage = MemoryStorage::new();
        let mut garage = Garage::new(storage.clone());
        garage.toggle_like(vehicle("a"));

        let raw = storage.get_item(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 0);
        assert_eq!(value["state"]["likedVehicles"][0]["id"], "a");
    }

    #[test]
    fn test_hydrates_envelope_with_extra_fields() {
        let storage = MemoryStorage::new();
        storage
            .set_item(
                DEFAULT_STORAGE_KEY,
                r#"{"state":{"likedVehicles":[
                    {"id":"x","make":"Kia","model":"Rio","year":2017,"price":8000},
                    {"id":"x","make":"Kia","model":"Rio","year":2017,"price":9000}
                ],"theme":"dark"},"version":3,"migratedBy":"v2"}"#,
            )
            .unwrap();

        let garage = Garage::new(storage);
        assert_eq!(garage.len(), 1);
        assert_eq!(garage.liked_vehicles()[0].price, 8000.0);
    }

    #[test]
    fn test_bad_entry_does_not_wipe_garage() {
        let storage = MemoryStorage::new();
        storage
            .set_item(
                DEFAULT_STORAGE_KEY,
                r#"{"state":{"likedVehicles":[
                    {"id":"a","make":"Toyota","model":"Camry","year":2019,"price":15000},
                    {"id":"b","make":"Honda","model":"Fit","year":2015,"price":6000,
                     "mileage":null,"transmission":null,"images":null},
                    {"id":"broken","make":"Kia","model":"Rio","year":"2017","price":8000},
                    {"make":"Ford","model":"Ranger","year":2020,"price":30000}
                ]},"version":0}"#,
            )
            .unwrap();

        let mut garage = Garage::new(storage.clone());
        assert_eq!(ids(&garage), vec!["a", "b"]);
        assert_eq!(garage.liked_vehicles()[1].mileage, 0.0);

        garage.toggle_like(vehicle("c"));
        assert_eq!(garage.len(), 3);

        let reloaded = Garage::new(storage);
        assert_eq!(ids(&reloaded), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reload_from_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("garage.db");

        let mut listed = vehicle("a");
        listed.images = vec!["data:image/jpeg;base64,AAAA".to_string()];
        listed.vin = Some("JTDBR32E720012345".to_string());

        let before = {
            let mut garage = Garage::new(SqliteStorage::open(&db_path).unwrap());
            garage.toggle_like(listed);
            garage.toggle_like(vehicle("b"));
            garage.toggle_like(vehicle("c"));
            garage.toggle_like(vehicle("b"));
            garage.liked_vehicles()
        };

        let reopened = Garage::new(SqliteStorage::open(&db_path).unwrap());
        assert_eq!(&*reopened.liked_vehicles(), &*before);
        assert!(reopened.is_liked("a"));
        assert!(!reopened.is_liked("b"));
    }

    #[test]
    fn test_corrupted_storage_starts_empty() {
        let storage = MemoryStorage::new();
        storage.set_item(DEFAULT_STORAGE_KEY, "{not json").unwrap();

        let mut garage = Garage::new(storage);
        assert!(garage.is_empty());

        // The next write replaces the corrupted value
        garage.toggle_like(vehicle("a"));
        let reloaded = Garage::new(garage.storage().clone());
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_unreadable_storage_starts_empty() {
        let storage = MemoryStorage::new();
        storage.set_disabled(true);
        let garage = Garage::new(storage);
        assert!(garage.is_empty());
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let storage = MemoryStorage::with_quota(8);
        let mut garage = Garage::new(storage.clone());

        assert!(garage.toggle_like(vehicle("a")));
        assert!(garage.is_liked("a"));
        assert_eq!(storage.get_item(DEFAULT_STORAGE_KEY).unwrap(), None);

        storage.set_disabled(true);
        garage.toggle_like(vehicle("b"));
        assert_eq!(garage.len(), 2);
    }

    #[test]
    fn test_one_notification_per_mutation() {
        let mut garage = Garage::new(MemoryStorage::new());
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        garage.subscribe(move |snapshot| sink.lock().unwrap().push(snapshot.len()));

        garage.toggle_like(vehicle("a"));
        garage.toggle_like(vehicle("b"));
        garage.toggle_like(vehicle("a"));
        garage.clear_garage();
        garage.clear_garage();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 1, 0]);
    }

    #[test]
    fn test_every_subscriber_sees_same_snapshot() {
        let mut garage = Garage::new(MemoryStorage::new());
        let first: Arc<Mutex<Vec<GarageSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let second: Arc<Mutex<Vec<GarageSnapshot>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&first);
        garage.subscribe(move |s| sink.lock().unwrap().push(Arc::clone(s)));
        let sink = Arc::clone(&second);
        garage.subscribe(move |s| sink.lock().unwrap().push(Arc::clone(s)));

        garage.toggle_like(vehicle("a"));

        let first = first.lock().unwrap();
        let second = second.lock().unwrap();
        assert!(Arc::ptr_eq(&first[0], &second[0]));
        assert!(Arc::ptr_eq(&first[0], &garage.liked_vehicles()));
    }

    #[test]
    fn test_old_snapshots_are_not_mutated() {
        let mut garage = Garage::new(MemoryStorage::new());
        garage.toggle_like(vehicle("a"));
        let old = garage.liked_vehicles();

        garage.toggle_like(vehicle("b"));
        garage.clear_garage();

        assert_eq!(old.len(), 1);
        assert!(!Arc::ptr_eq(&old, &garage.liked_vehicles()));
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut garage = Garage::new(MemoryStorage::new());
        let count = Arc::new(Mutex::new(0));

        let sink = Arc::clone(&count);
        let id = garage.subscribe(move |_| *sink.lock().unwrap() += 1);

        garage.toggle_like(vehicle("a"));
        assert!(garage.unsubscribe(id));
        assert!(!garage.unsubscribe(id));
        garage.toggle_like(vehicle("b"));

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_clear_empty_garage_does_not_write() {
        let storage = MemoryStorage::new();
        let mut garage = Garage::new(storage.clone());
        garage.clear_garage();
        assert_eq!(storage.get_item(DEFAULT_STORAGE_KEY).unwrap(), None);

        garage.toggle_like(vehicle("a"));
        garage.clear_garage();
        let reloaded = Garage::new(storage);
        assert!(reloaded.is_empty());
    }
}
