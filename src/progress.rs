//! Player progress for the emoji game and its key-value persistence.
//!
//! `ProgressStore::load` fails soft: anything missing, unreadable or structurally
//! off becomes the empty default (logged, never surfaced). `save` is
//! fire-and-forget. `TrackedProgress::transact` pairs every mutation with a save.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::domain::{CategoryId, MAX_LEVELS, POINTS_PER_LEVEL};
use crate::error::StorageError;

/// Storage slot for the emoji game.
pub const PROGRESS_STORAGE_KEY: &str = "emojiGuessChallengeProgress";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProgress {
  /// Highest level completed per category.
  #[serde(default)]
  pub completed_levels: BTreeMap<CategoryId, u32>,
  #[serde(default)]
  pub scores: BTreeMap<CategoryId, u32>,
  /// Always equals the sum of `scores`.
  #[serde(default)]
  pub total_score: u32,
  #[serde(default)]
  pub hints_used: BTreeMap<CategoryId, u32>,
}

impl PlayerProgress {
  pub fn completed(&self, cat: CategoryId) -> u32 {
    self.completed_levels.get(&cat).copied().unwrap_or(0)
  }

  pub fn score(&self, cat: CategoryId) -> u32 {
    self.scores.get(&cat).copied().unwrap_or(0)
  }

  pub fn hints_used(&self, cat: CategoryId) -> u32 {
    self.hints_used.get(&cat).copied().unwrap_or(0)
  }

  /// Highest selectable level: one past the best completed, capped at MAX_LEVELS.
  pub fn unlocked(&self, cat: CategoryId) -> u32 {
    (self.completed(cat) + 1).min(MAX_LEVELS)
  }

  pub fn is_unlocked(&self, cat: CategoryId, level: u32) -> bool {
    (1..=MAX_LEVELS).contains(&level) && level <= self.completed(cat) + 1
  }

  /// Record a completed level. Points are awarded only for a new best level;
  /// returns the awarded delta. Category score and total move together.
  pub fn award_level(&mut self, cat: CategoryId, level: u32) -> Option<u32> {
    if level <= self.completed(cat) {
      return None;
    }
    self.completed_levels.insert(cat, level);
    *self.scores.entry(cat).or_insert(0) += POINTS_PER_LEVEL;
    self.total_score += POINTS_PER_LEVEL;
    Some(POINTS_PER_LEVEL)
  }

  /// Structural checks a stored value must pass to be trusted.
  pub fn is_consistent(&self) -> bool {
    let sum: u32 = self.scores.values().sum();
    sum == self.total_score && self.completed_levels.values().all(|l| *l <= MAX_LEVELS)
  }

  pub fn category_summaries(&self) -> Vec<CategorySummary> {
    CategoryId::ALL
      .iter()
      .map(|&id| {
        let completed = self.completed(id);
        CategorySummary {
          id,
          title: id.info().title,
          emoji: id.info().emoji,
          description: id.info().description,
          completed,
          max_levels: MAX_LEVELS,
          percent: completed * 100 / MAX_LEVELS,
          score: self.score(id),
        }
      })
      .collect()
  }
}

/// One card on the category grid.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
  pub id: CategoryId,
  pub title: &'static str,
  pub emoji: &'static str,
  pub description: &'static str,
  pub completed: u32,
  pub max_levels: u32,
  pub percent: u32,
  pub score: u32,
}

// --- Key-value storage ---

/// One string value per key. Reads and writes are synchronous.
pub trait KeyValueStorage: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
  fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// `<dir>/<key>.json` files, written through a temp file + rename.
pub struct FileStorage {
  dir: PathBuf,
}

impl FileStorage {
  pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
    std::fs::create_dir_all(dir.as_ref())?;
    Ok(Self { dir: dir.as_ref().to_path_buf() })
  }

  fn path_for(&self, key: &str) -> PathBuf {
    let safe: String = key.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect();
    self.dir.join(format!("{safe}.json"))
  }
}

impl KeyValueStorage for FileStorage {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    match std::fs::read_to_string(self.path_for(key)) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let path = self.path_for(key);
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, value)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
  }
}

#[derive(Default)]
pub struct MemoryStorage {
  slots: Mutex<HashMap<String, String>>,
}

impl KeyValueStorage for MemoryStorage {
  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    Ok(self.slots.lock().unwrap_or_else(|p| p.into_inner()).get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    self.slots.lock().unwrap_or_else(|p| p.into_inner()).insert(key.to_string(), value.to_string());
    Ok(())
  }
}

// --- Progress store ---

#[derive(Clone)]
pub struct ProgressStore {
  storage: Arc<dyn KeyValueStorage>,
  key: String,
}

impl ProgressStore {
  pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
    Self { storage, key: key.into() }
  }

  /// Never fails: missing or incompatible data yields the empty default.
  pub fn load(&self) -> PlayerProgress {
    let raw = match self.storage.get(&self.key) {
      Ok(Some(raw)) => raw,
      Ok(None) => {
        debug!(target: "progress", key = %self.key, "No saved progress; starting fresh");
        return PlayerProgress::default();
      }
      Err(e) => {
        warn!(target: "progress", key = %self.key, error = %e, "Failed to read progress; starting fresh");
        return PlayerProgress::default();
      }
    };
    match serde_json::from_str::<PlayerProgress>(&raw) {
      Ok(p) if p.is_consistent() => p,
      Ok(_) => {
        warn!(target: "progress", key = %self.key, "Saved progress is inconsistent; resetting to defaults");
        PlayerProgress::default()
      }
      Err(e) => {
        warn!(target: "progress", key = %self.key, error = %e, "Failed to parse saved progress; resetting to defaults");
        PlayerProgress::default()
      }
    }
  }

  /// Fire-and-forget: failures are logged only.
  pub fn save(&self, progress: &PlayerProgress) {
    let result = serde_json::to_string(progress)
      .map_err(StorageError::from)
      .and_then(|json| self.storage.set(&self.key, &json));
    if let Err(e) = result {
      error!(target: "progress", key = %self.key, error = %e, "Failed to persist progress");
    }
  }
}

/// In-memory progress bound to its store. Clones share one value, so every
/// session playing against the same slot sees the others' awards. The only way
/// to mutate it is `transact`, which saves right after the closure runs.
#[derive(Clone)]
pub struct TrackedProgress {
  store: ProgressStore,
  current: Arc<Mutex<PlayerProgress>>,
}

impl TrackedProgress {
  pub fn load(store: ProgressStore) -> Self {
    let current = store.load();
    Self { store, current: Arc::new(Mutex::new(current)) }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, PlayerProgress> {
    self.current.lock().unwrap_or_else(|p| p.into_inner())
  }

  pub fn snapshot(&self) -> PlayerProgress {
    self.lock().clone()
  }

  /// Mutate and persist under one lock, so concurrent writers never save over each other.
  pub fn transact<R>(&self, f: impl FnOnce(&mut PlayerProgress) -> R) -> R {
    let mut current = self.lock();
    let out = f(&mut current);
    self.store.save(&current);
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn memory_store() -> (Arc<MemoryStorage>, ProgressStore) {
    let mem = Arc::new(MemoryStorage::default());
    let store = ProgressStore::new(mem.clone(), PROGRESS_STORAGE_KEY);
    (mem, store)
  }

  #[test]
  fn award_is_once_per_new_best_level() {
    let mut p = PlayerProgress::default();
    assert_eq!(p.award_level(CategoryId::Tenses, 1), Some(POINTS_PER_LEVEL));
    assert_eq!(p.award_level(CategoryId::Tenses, 1), None);
    assert_eq!(p.award_level(CategoryId::Punctuation, 1), Some(POINTS_PER_LEVEL));
    assert_eq!(p.award_level(CategoryId::Tenses, 2), Some(POINTS_PER_LEVEL));
    assert_eq!(p.score(CategoryId::Tenses), 20);
    assert_eq!(p.total_score, 30);
    assert!(p.is_consistent());
  }

  #[test]
  fn unlock_gating_follows_completed_levels() {
    let mut p = PlayerProgress::default();
    assert!(p.is_unlocked(CategoryId::Tenses, 1));
    assert!(!p.is_unlocked(CategoryId::Tenses, 2));
    assert!(!p.is_unlocked(CategoryId::Tenses, 0));
    p.award_level(CategoryId::Tenses, 1);
    assert!(p.is_unlocked(CategoryId::Tenses, 2));
    assert_eq!(p.unlocked(CategoryId::Tenses), 2);
    p.award_level(CategoryId::Tenses, MAX_LEVELS);
    assert_eq!(p.unlocked(CategoryId::Tenses), MAX_LEVELS);
    assert!(!p.is_unlocked(CategoryId::Tenses, MAX_LEVELS + 1));
  }

  #[test]
  fn save_then_load_round_trips() {
    let (_mem, store) = memory_store();
    let mut p = PlayerProgress::default();
    p.award_level(CategoryId::IdiomsAndPhrases, 1);
    p.award_level(CategoryId::IdiomsAndPhrases, 2);
    p.hints_used.insert(CategoryId::Tenses, 1);
    store.save(&p);
    let loaded = store.load();
    assert_eq!(loaded, p);
    store.save(&loaded);
    assert_eq!(store.load(), p);
  }

  #[test]
  fn stored_json_uses_category_names() {
    let (mem, store) = memory_store();
    let mut p = PlayerProgress::default();
    p.award_level(CategoryId::Tenses, 1);
    store.save(&p);
    let raw = mem.get(PROGRESS_STORAGE_KEY).expect("get").expect("present");
    let v: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(v["completedLevels"]["Tenses"], 1);
    assert_eq!(v["scores"]["Tenses"], 10);
    assert_eq!(v["totalScore"], 10);
  }

  #[test]
  fn missing_or_corrupt_data_loads_default() {
    let (mem, store) = memory_store();
    assert_eq!(store.load(), PlayerProgress::default());

    for bad in [
      "{ not json",
      r#"{"completedLevels": {"Geography": 2}, "scores": {}, "totalScore": 0, "hintsUsed": {}}"#,
      r#"{"completedLevels": {}, "scores": {"Tenses": 10}, "totalScore": 99}"#,
      r#"{"completedLevels": {"Tenses": 9}, "scores": {}, "totalScore": 0}"#,
      r#"[1, 2, 3]"#,
    ] {
      mem.set(PROGRESS_STORAGE_KEY, bad).expect("set");
      assert_eq!(store.load(), PlayerProgress::default(), "input: {bad}");
    }
  }

  #[test]
  fn partial_document_fills_missing_maps() {
    let (mem, store) = memory_store();
    mem.set(PROGRESS_STORAGE_KEY, r#"{"completedLevels": {"Punctuation": 2}, "scores": {"Punctuation": 20}, "totalScore": 20}"#).expect("set");
    let p = store.load();
    assert_eq!(p.completed(CategoryId::Punctuation), 2);
    assert!(p.hints_used.is_empty());
  }

  #[test]
  fn transact_persists_each_mutation() {
    let (_mem, store) = memory_store();
    let tracked = TrackedProgress::load(store.clone());
    let delta = tracked.transact(|p| p.award_level(CategoryId::Tenses, 1));
    assert_eq!(delta, Some(10));
    assert_eq!(store.load(), tracked.snapshot());
  }

  #[test]
  fn clones_share_awards_and_storage() {
    let (_mem, store) = memory_store();
    let first = TrackedProgress::load(store.clone());
    let second = first.clone();
    first.transact(|p| p.award_level(CategoryId::Tenses, 1));
    second.transact(|p| p.award_level(CategoryId::Punctuation, 1));

    let stored = store.load();
    assert_eq!(stored.completed(CategoryId::Tenses), 1);
    assert_eq!(stored.completed(CategoryId::Punctuation), 1);
    assert_eq!(stored.total_score, 20);
    assert_eq!(first.snapshot(), stored);
  }

  #[test]
  fn file_storage_round_trips() {
    let dir = std::env::temp_dir().join(format!("grammar-galaxy-test-{}", uuid::Uuid::new_v4()));
    let fs = FileStorage::open(&dir).expect("open");
    assert_eq!(fs.get("slot").expect("get"), None);
    fs.set("slot", "{\"a\":1}").expect("set");
    assert_eq!(fs.get("slot").expect("get").as_deref(), Some("{\"a\":1}"));
    assert!(dir.join("slot.json").exists());
    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn summaries_cover_all_categories() {
    let mut p = PlayerProgress::default();
    p.award_level(CategoryId::SentenceStructures, 1);
    p.award_level(CategoryId::SentenceStructures, 2);
    let s = p.category_summaries();
    assert_eq!(s.len(), 5);
    let sent = s.iter().find(|c| c.id == CategoryId::SentenceStructures).expect("present");
    assert_eq!((sent.completed, sent.percent, sent.score), (2, 40, 20));
  }
}
