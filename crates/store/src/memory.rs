use crate::{CatalogStore, EntryFields, RunCompletion, StoreError, StoredDeadLetter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};
use vinolink_model::{
    producer_label, varietal_label, CatalogEntry, DeadLetterRecord, IngestionRun, QualitySignal,
    RunId, RunStatus, SignalSource, StoreListing, WineId, WineIdentity,
};

/// On-disk shape of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    next_wine_id: u64,
    next_run_id: u64,
    entries: Vec<CatalogEntry>,
    signals: Vec<QualitySignal>,
    dead_letters: Vec<StoredDeadLetter>,
    runs: Vec<IngestionRun>,
}

#[derive(Debug, Default)]
struct State {
    next_wine_id: u64,
    next_run_id: u64,
    entries: BTreeMap<WineId, CatalogEntry>,
    by_external_id: HashMap<String, WineId>,
    by_identity: HashMap<WineIdentity, WineId>,
    signals: HashMap<(WineId, SignalSource), QualitySignal>,
    dead_letters: Vec<StoredDeadLetter>,
    runs: Vec<IngestionRun>,
}

impl State {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = Self {
            next_wine_id: snapshot.next_wine_id,
            next_run_id: snapshot.next_run_id,
            dead_letters: snapshot.dead_letters,
            runs: snapshot.runs,
            ..Self::default()
        };
        for entry in snapshot.entries {
            state.next_wine_id = state.next_wine_id.max(entry.id.0);
            state.index(&entry);
            state.entries.insert(entry.id, entry);
        }
        for signal in snapshot.signals {
            state.signals.insert((signal.wine_id, signal.source), signal);
        }
        if let Some(max_run) = state.runs.iter().map(|r| r.id.0).max() {
            state.next_run_id = state.next_run_id.max(max_run);
        }
        state
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut signals: Vec<QualitySignal> = self.signals.values().cloned().collect();
        signals.sort_by_key(|s| (s.wine_id, s.source.as_str()));
        Snapshot {
            next_wine_id: self.next_wine_id,
            next_run_id: self.next_run_id,
            entries: self.entries.values().cloned().collect(),
            signals,
            dead_letters: self.dead_letters.clone(),
            runs: self.runs.clone(),
        }
    }

    fn index(&mut self, entry: &CatalogEntry) {
        if let Some(external_id) = &entry.external_id {
            self.by_external_id.insert(external_id.clone(), entry.id);
        }
        self.by_identity.insert(entry.identity(), entry.id);
    }

    fn unindex(&mut self, entry: &CatalogEntry) {
        if let Some(external_id) = &entry.external_id {
            self.by_external_id.remove(external_id);
        }
        self.by_identity.remove(&entry.identity());
    }

    fn entry_mut(&mut self, id: WineId) -> Result<&mut CatalogEntry, StoreError> {
        self.entries.get_mut(&id).ok_or(StoreError::WineNotFound(id))
    }

    fn check_identity(&self, identity: &WineIdentity, owner: Option<WineId>) -> Result<(), StoreError> {
        match self.by_identity.get(identity) {
            Some(&holder) if Some(holder) != owner => {
                debug!(%identity, %holder, "Identity collision");
                Err(StoreError::IdentityCollision {
                    identity: identity.clone(),
                    holder,
                })
            }
            _ => Ok(()),
        }
    }

    /// Apply `edit` to an entry and keep both indexes in step.
    fn rewrite(&mut self, id: WineId, edit: impl FnOnce(&mut CatalogEntry)) -> Result<(), StoreError> {
        let mut entry = self.entry_mut(id)?.clone();
        self.unindex(&entry);
        edit(&mut entry);
        self.index(&entry);
        self.entries.insert(id, entry);
        Ok(())
    }

    fn insert(&mut self, fields: EntryFields) -> WineId {
        self.next_wine_id += 1;
        let id = WineId(self.next_wine_id);
        let entry = CatalogEntry {
            id,
            external_id: fields.external_id,
            name: fields.name,
            producer: fields.producer,
            varietal: fields.varietal,
            wine_type: fields.wine_type,
            country: fields.country,
            sub_region: fields.sub_region,
            region_label: fields.region_label,
            lcbo_url: fields.lcbo_url,
            vivino_url: fields.vivino_url,
            listings: Vec::new(),
        };
        self.index(&entry);
        self.entries.insert(id, entry);
        id
    }

    fn upsert_by_external_id(&mut self, fields: EntryFields) -> Result<WineId, StoreError> {
        let existing = fields
            .external_id
            .as_deref()
            .and_then(|external_id| self.by_external_id.get(external_id))
            .copied();
        self.check_identity(&fields.identity(), existing)?;

        match existing {
            Some(id) => {
                self.rewrite(id, |entry| apply_fields(entry, fields, true))?;
                Ok(id)
            }
            None => Ok(self.insert(fields)),
        }
    }

    fn update_by_identity(&mut self, fields: EntryFields) -> Result<WineId, StoreError> {
        let identity = fields.identity();
        let id = *self
            .by_identity
            .get(&identity)
            .ok_or(StoreError::IdentityNotFound(identity))?;

        // An SKU owned by a different entry cannot move here.
        let sku_free = fields
            .external_id
            .as_deref()
            .map_or(true, |sku| self.by_external_id.get(sku).map_or(true, |&owner| owner == id));

        self.rewrite(id, |entry| {
            let keep_sku = entry.external_id.is_some() || !sku_free;
            apply_fields(entry, fields, !keep_sku)
        })?;
        Ok(id)
    }

    fn update_attributes(
        &mut self,
        id: WineId,
        producer: Option<String>,
        varietal: Option<String>,
    ) -> Result<(), StoreError> {
        let mut identity = self
            .entries
            .get(&id)
            .ok_or(StoreError::WineNotFound(id))?
            .identity();
        identity.producer = producer_label(producer.as_deref()).to_string();
        identity.varietal = varietal_label(varietal.as_deref()).to_string();
        self.check_identity(&identity, Some(id))?;

        self.rewrite(id, |entry| {
            entry.producer = producer;
            entry.varietal = varietal;
        })
    }
}

fn apply_fields(entry: &mut CatalogEntry, fields: EntryFields, take_external_id: bool) {
    if take_external_id && fields.external_id.is_some() {
        entry.external_id = fields.external_id;
    }
    entry.name = fields.name;
    entry.producer = fields.producer;
    entry.varietal = fields.varietal;
    entry.wine_type = fields.wine_type;
    entry.country = fields.country;
    entry.sub_region = fields.sub_region;
    entry.region_label = fields.region_label;
    if fields.lcbo_url.is_some() {
        entry.lcbo_url = fields.lcbo_url;
    }
    if fields.vivino_url.is_some() {
        entry.vivino_url = fields.vivino_url;
    }
}

/// In-memory `CatalogStore`, optionally backed by a JSON snapshot file.
///
/// Writes only reach disk on `save`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Empty store with no snapshot file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the snapshot at `path`, or start empty when it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Snapshot>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };
        info!(
            path = %path.display(),
            entries = snapshot.entries.len(),
            signals = snapshot.signals.len(),
            "Opened catalog store"
        );
        Ok(Self {
            state: Mutex::new(State::from_snapshot(snapshot)),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the snapshot file (via a temp file and rename). No-op without a path.
    pub async fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = {
            let state = self.state.lock().await;
            serde_json::to_vec_pretty(&state.to_snapshot())?
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Saved catalog store");
        Ok(())
    }
}

impl CatalogStore for MemoryStore {
    async fn entries(&self) -> Result<Vec<CatalogEntry>, StoreError> {
        Ok(self.state.lock().await.entries.values().cloned().collect())
    }

    async fn entry(&self, id: WineId) -> Result<Option<CatalogEntry>, StoreError> {
        Ok(self.state.lock().await.entries.get(&id).cloned())
    }

    async fn entry_by_external_id(&self, external_id: &str) -> Result<Option<CatalogEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .by_external_id
            .get(external_id)
            .and_then(|id| state.entries.get(id))
            .cloned())
    }

    async fn upsert_by_external_id(&self, fields: EntryFields) -> Result<WineId, StoreError> {
        self.state.lock().await.upsert_by_external_id(fields)
    }

    async fn update_by_identity(&self, fields: EntryFields) -> Result<WineId, StoreError> {
        self.state.lock().await.update_by_identity(fields)
    }

    async fn replace_listing(&self, id: WineId, listing: StoreListing) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entry = state.entry_mut(id)?;
        entry.listings.retain(|l| l.store_code != listing.store_code);
        entry.listings.push(listing);
        Ok(())
    }

    async fn update_attributes(
        &self,
        id: WineId,
        producer: Option<String>,
        varietal: Option<String>,
    ) -> Result<(), StoreError> {
        self.state.lock().await.update_attributes(id, producer, varietal)
    }

    async fn set_vivino_url(&self, id: WineId, url: Option<String>) -> Result<(), StoreError> {
        self.state.lock().await.entry_mut(id)?.vivino_url = url;
        Ok(())
    }

    async fn signals(&self) -> Result<Vec<QualitySignal>, StoreError> {
        let mut signals: Vec<QualitySignal> =
            self.state.lock().await.signals.values().cloned().collect();
        signals.sort_by_key(|s| s.wine_id);
        Ok(signals)
    }

    async fn signal(&self, id: WineId, source: SignalSource) -> Result<Option<QualitySignal>, StoreError> {
        Ok(self.state.lock().await.signals.get(&(id, source)).cloned())
    }

    async fn replace_signal(&self, signal: QualitySignal) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.entries.contains_key(&signal.wine_id) {
            return Err(StoreError::WineNotFound(signal.wine_id));
        }
        state.signals.insert((signal.wine_id, signal.source), signal);
        Ok(())
    }

    async fn remove_signal(&self, id: WineId, source: SignalSource) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.signals.remove(&(id, source)).is_some())
    }

    async fn record_dead_letters(
        &self,
        run_id: Option<RunId>,
        letters: Vec<DeadLetterRecord>,
        received_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let count = letters.len();
        let mut state = self.state.lock().await;
        state
            .dead_letters
            .extend(letters.into_iter().map(|letter| StoredDeadLetter {
                run_id,
                received_at,
                letter,
            }));
        Ok(count)
    }

    async fn dead_letters_since(&self, since: DateTime<Utc>) -> Result<Vec<StoredDeadLetter>, StoreError> {
        let state = self.state.lock().await;
        let mut letters: Vec<StoredDeadLetter> = state
            .dead_letters
            .iter()
            .filter(|d| d.received_at >= since)
            .cloned()
            .collect();
        letters.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        Ok(letters)
    }

    async fn start_run(
        &self,
        source: &str,
        items_read: usize,
        rejected_items: usize,
        started_at: DateTime<Utc>,
    ) -> Result<RunId, StoreError> {
        let mut state = self.state.lock().await;
        state.next_run_id += 1;
        let id = RunId(state.next_run_id);
        state.runs.push(IngestionRun {
            id,
            source: source.to_string(),
            status: RunStatus::Running,
            items_read,
            items_written: 0,
            rejected_items,
            started_at,
            completed_at: None,
            error_message: None,
        });
        Ok(id)
    }

    async fn finish_run(&self, id: RunId, completion: RunCompletion) -> Result<IngestionRun, StoreError> {
        let mut state = self.state.lock().await;
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::RunNotFound(id))?;
        run.status = completion.status;
        run.items_written = completion.items_written;
        run.error_message = completion.error_message;
        run.completed_at = Some(completion.completed_at);
        Ok(run.clone())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<IngestionRun>, StoreError> {
        let state = self.state.lock().await;
        let mut runs = state.runs.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        runs.truncate(limit);
        Ok(runs)
    }

    async fn last_completed_run(&self, source: &str) -> Result<Option<IngestionRun>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .runs
            .iter()
            .filter(|r| r.source == source && r.status == RunStatus::Completed)
            .max_by_key(|r| (r.completed_at, r.id))
            .cloned())
    }
}
