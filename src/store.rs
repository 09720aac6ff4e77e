use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::{info, warn};

use crate::match_set::MatchSet;
use crate::types::{BracketSettings, Participant};

pub type SharedTournament = Arc<Mutex<TournamentRecord>>;

/// Everything persisted for one tournament.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentRecord {
    pub id: String,
    pub name: String,
    pub participants: Vec<Participant>,
    pub settings: BracketSettings,
    /// `None` until the bracket is generated.
    pub matches: Option<MatchSet>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TournamentRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        participants: Vec<Participant>,
        settings: BracketSettings,
    ) -> Self {
        let now = Utc::now();
        TournamentRecord {
            id: id.into(),
            name: name.into(),
            participants,
            settings,
            matches: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Tournament ids double as file names, so keep them to a safe alphabet.
pub fn validate_tournament_id(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("Tournament id is empty.".to_string());
    }
    if trimmed.len() > 64 {
        return Err("Tournament id is longer than 64 characters.".to_string());
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(format!(
            "Tournament id \"{trimmed}\" may only contain letters, digits, '-' and '_'."
        ));
    }
    Ok(trimmed.to_string())
}

/// In-memory tournament map, optionally mirrored to `<data_dir>/<id>.json`.
///
/// Each tournament sits behind its own mutex; holding it for the whole
/// read-apply-persist cycle is what serializes writers.
#[derive(Default)]
pub struct TournamentStore {
    tournaments: Mutex<HashMap<String, SharedTournament>>,
    data_dir: Option<PathBuf>,
}

impl TournamentStore {
    pub fn in_memory() -> Self {
        TournamentStore::default()
    }

    /// Open a store over `data_dir`, loading every record already there.
    /// Unreadable files are skipped with a warning.
    pub fn load(data_dir: Option<PathBuf>) -> Result<Self, String> {
        let mut tournaments = HashMap::new();
        if let Some(dir) = data_dir.as_deref() {
            fs::create_dir_all(dir).map_err(|e| format!("create data dir {}: {e}", dir.display()))?;
            let entries = fs::read_dir(dir).map_err(|e| format!("read data dir {}: {e}", dir.display()))?;
            for entry in entries {
                let path = entry.map_err(|e| e.to_string())?.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                match read_record(&path) {
                    Ok(record) => {
                        tournaments.insert(record.id.clone(), Arc::new(Mutex::new(record)));
                    }
                    Err(e) => warn!("skipping tournament file: {e}"),
                }
            }
            info!("loaded {} tournaments from {}", tournaments.len(), dir.display());
        }
        Ok(TournamentStore {
            tournaments: Mutex::new(tournaments),
            data_dir,
        })
    }

    pub fn ids(&self) -> Result<Vec<String>, String> {
        let guard = self.tournaments.lock().map_err(|e| e.to_string())?;
        let mut ids = guard.keys().cloned().collect::<Vec<_>>();
        ids.sort();
        Ok(ids)
    }

    pub fn get(&self, id: &str) -> Result<Option<SharedTournament>, String> {
        let guard = self.tournaments.lock().map_err(|e| e.to_string())?;
        Ok(guard.get(id).cloned())
    }

    /// Insert or replace a tournament and persist it.
    ///
    /// An existing tournament is replaced in place under its own lock, so a
    /// writer already holding that lock finishes before the new record lands.
    pub fn upsert(&self, record: TournamentRecord) -> Result<SharedTournament, String> {
        let existing = {
            let mut guard = self.tournaments.lock().map_err(|e| e.to_string())?;
            match guard.get(&record.id).cloned() {
                Some(shared) => shared,
                None => {
                    self.persist(&record)?;
                    let id = record.id.clone();
                    let shared = Arc::new(Mutex::new(record));
                    guard.insert(id, shared.clone());
                    return Ok(shared);
                }
            }
        };
        {
            let mut current = existing.lock().map_err(|e| e.to_string())?;
            self.persist(&record)?;
            *current = record;
        }
        Ok(existing)
    }

    pub fn persist(&self, record: &TournamentRecord) -> Result<(), String> {
        let Some(dir) = self.data_dir.as_deref() else {
            return Ok(());
        };
        let path = record_path(dir, &record.id);
        let payload = serde_json::to_string_pretty(record).map_err(|e| e.to_string())?;
        fs::write(&path, payload).map_err(|e| format!("write tournament {}: {e}", path.display()))
    }
}

fn record_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.json"))
}

fn read_record(path: &Path) -> Result<TournamentRecord, String> {
    let data = fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
    serde_json::from_str(&data).map_err(|e| format!("parse {}: {e}", path.display()))
}
