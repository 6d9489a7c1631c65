use chrono::{SubsecRound, Utc};
use log::{debug, error, info};

use crate::label::generate_label;
use crate::marker::{Marker, MarkerDraft, MarkerId};
use crate::storage::KeyValueStore;

/// Key under which the marker snapshot is stored
pub const SNAPSHOT_KEY: &str = "cableDropMarkers";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added(MarkerId),
    Removed(MarkerId),
    Loaded(usize),
}

type Listener = Box<dyn FnMut(&StoreEvent)>;

/// Owns every marker, in creation order, and mirrors them to a key/value
/// snapshot after each mutation.
pub struct MarkerStore<S: KeyValueStore> {
    storage: S,
    markers: Vec<Marker>,
    listeners: Vec<Listener>,
}

impl<S: KeyValueStore> MarkerStore<S> {
    /// Read the snapshot from `storage`. A missing snapshot is an empty store,
    /// and so is a corrupt one (logged, never fatal).
    pub fn load(storage: S) -> Self {
        let markers = Self::read_snapshot(&storage);
        info!("Loaded {} markers", markers.len());

        Self {
            storage,
            markers,
            listeners: Vec::new(),
        }
    }

    fn read_snapshot(storage: &S) -> Vec<Marker> {
        match storage.get(SNAPSHOT_KEY) {
            Some(raw) => Self::parse_snapshot(&raw).unwrap_or_else(|e| {
                error!("Error loading markers from storage: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    pub fn parse_snapshot(raw: &str) -> Result<Vec<Marker>, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(raw)
    }

    pub fn snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.markers)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StoreEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, event: StoreEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    /// Re-read the snapshot, replacing the in-memory list.
    pub fn reload(&mut self) {
        self.markers = Self::read_snapshot(&self.storage);
        let count = self.markers.len();
        self.notify(StoreEvent::Loaded(count));
    }

    /// Append a marker built from `draft`, labeled against every current label.
    pub fn add(&mut self, draft: MarkerDraft) -> &Marker {
        let label = generate_label(&draft.kind, &draft.purpose, &self.labels());
        let marker = Marker {
            id: MarkerId::generate(),
            x: draft.x,
            y: draft.y,
            page_index: draft.page_index,
            quantity: draft.quantity,
            kind: draft.kind,
            location: draft.location,
            purpose: draft.purpose,
            label,
            // Snapshots keep millisecond precision
            created_at: Utc::now().trunc_subsecs(3),
        };
        debug!("Adding marker {} ({})", marker.label, marker.id);

        let id = marker.id.clone();
        let idx = self.markers.len();
        self.markers.push(marker);
        self.persist();
        self.notify(StoreEvent::Added(id));
        &self.markers[idx]
    }

    /// Remove a marker by id. Unknown ids are ignored.
    pub fn remove(&mut self, id: &MarkerId) -> Option<Marker> {
        let idx = self.markers.iter().position(|m| &m.id == id)?;
        let removed = self.markers.remove(idx);
        debug!("Removed marker {} ({})", removed.label, removed.id);

        self.persist();
        self.notify(StoreEvent::Removed(removed.id.clone()));
        Some(removed)
    }

    /// Write the full snapshot. Failures are logged and the in-memory state is
    /// kept as is.
    fn persist(&mut self) {
        let snapshot = match self.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to serialize markers: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.set(SNAPSHOT_KEY, snapshot) {
            error!("Failed to save markers: {e}");
        }
    }

    pub fn get(&self, id: &MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|m| &m.id == id)
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn labels(&self) -> Vec<&str> {
        self.markers.iter().map(|m| m.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn on_page(&self, page_index: usize) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(move |m| m.page_index == page_index)
    }

    /// Distinct cable types in first-seen order
    pub fn distinct_types(&self) -> Vec<&str> {
        Self::distinct(self.markers.iter().map(|m| m.kind.as_str()))
    }

    /// Distinct locations in first-seen order
    pub fn distinct_locations(&self) -> Vec<&str> {
        Self::distinct(self.markers.iter().map(|m| m.location.as_str()))
    }

    fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        let mut seen: Vec<&str> = Vec::new();
        for value in values {
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        seen
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn draft(kind: &str, purpose: &str, page_index: usize) -> MarkerDraft {
        MarkerDraft {
            x: 0.3,
            y: 0.7,
            page_index,
            quantity: 2,
            kind: kind.to_string(),
            location: "Room 1".to_string(),
            purpose: purpose.to_string(),
        }
    }

    #[test]
    fn add_labels_and_persists() {
        let mut store = MarkerStore::load(MemoryStore::new());
        let first = store.add(draft("Ethernet", "Network", 0)).label.clone();
        let second = store.add(draft("Ethernet", "Network", 1)).label.clone();
        let other = store.add(draft("Data", "Network", 0)).label.clone();

        assert_eq!(first, "ETH-NET-1");
        assert_eq!(second, "ETH-NET-2");
        assert_eq!(other, "DAT-NET-1");

        let raw = store.storage().get(SNAPSHOT_KEY).unwrap();
        let persisted = MarkerStore::<MemoryStore>::parse_snapshot(&raw).unwrap();
        assert_eq!(persisted, store.markers());
    }

    #[test]
    fn remove_keeps_other_labels_and_numbering_monotonic() {
        let mut store = MarkerStore::load(MemoryStore::new());
        let a = store.add(draft("Ethernet", "Network", 0)).id.clone();
        let b = store.add(draft("Ethernet", "Network", 0)).id.clone();
        let c = store.add(draft("Ethernet", "Network", 0)).id.clone();

        let removed = store.remove(&b).unwrap();
        assert_eq!(removed.label, "ETH-NET-2");
        assert_eq!(store.get(&a).unwrap().label, "ETH-NET-1");
        assert_eq!(store.get(&c).unwrap().label, "ETH-NET-3");

        assert_eq!(store.add(draft("Ethernet", "Network", 0)).label, "ETH-NET-4");
    }

    #[test]
    fn remove_unknown_id_is_a_noop() {
        let mut store = MarkerStore::load(MemoryStore::new());
        store.add(draft("Coax", "Audio", 0));
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        assert!(store.remove(&MarkerId::from("missing")).is_none());
        assert_eq!(store.len(), 1);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn corrupt_snapshot_loads_empty() {
        let mut storage = MemoryStore::new();
        storage.set(SNAPSHOT_KEY, "[{\"id\": 12".to_string()).unwrap();
        let store = MarkerStore::load(storage);
        assert!(store.is_empty());
    }

    #[test]
    fn reload_of_corrupt_snapshot_empties_the_store() {
        let mut store = MarkerStore::load(MemoryStore::new());
        store.add(draft("Fiber", "Data", 0));
        store.storage.set(SNAPSHOT_KEY, "not json".to_string()).unwrap();

        store.reload();
        assert!(store.is_empty());

        store.storage.set(SNAPSHOT_KEY, String::new()).unwrap();
        store.reload();
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_roundtrip_preserves_order_and_fields() {
        let mut store = MarkerStore::load(MemoryStore::new());
        store.add(draft("Fiber", "Data", 2));
        store.add(draft("Speaker", "Audio", 0));
        store.add(draft("Fiber", "Data", 1));
        let original = store.markers().to_vec();

        let reloaded = MarkerStore::load(store.storage().clone());
        assert_eq!(reloaded.markers(), original.as_slice());
    }

    #[test]
    fn listeners_see_add_and_remove() {
        let mut store = MarkerStore::load(MemoryStore::new());
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        let id = store.add(draft("Cat6", "Power", 0)).id.clone();
        store.remove(&id);
        store.reload();

        assert_eq!(
            *events.borrow(),
            vec![
                StoreEvent::Added(id.clone()),
                StoreEvent::Removed(id),
                StoreEvent::Loaded(0)
            ]
        );
    }

    #[test]
    fn distinct_values_keep_first_seen_order() {
        let mut store = MarkerStore::load(MemoryStore::new());
        store.add(draft("Fiber", "Data", 0));
        store.add(draft("Cat6", "Data", 0));
        store.add(draft("Fiber", "Power", 0));
        assert_eq!(store.distinct_types(), vec!["Fiber", "Cat6"]);
        assert_eq!(store.distinct_locations(), vec!["Room 1"]);
        assert_eq!(store.on_page(0).count(), 3);
    }
}
