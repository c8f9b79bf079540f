//! Application state: content client, progress, live sessions, score board.
//!
//! This module owns:
//!   - the content request client (with the Gemini backend when configured)
//!   - the one in-memory progress value for the emoji game, shared by every session
//!   - the live HTTP emoji sessions by id, evicted once idle (WebSocket sessions are owned by their connection)
//!   - the score board fed by session score notifications

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::content::ContentClient;
use crate::gemini::{GeminiBackend, GenerationBackend};
use crate::progress::{FileStorage, KeyValueStorage, MemoryStorage, ProgressStore, TrackedProgress, PROGRESS_STORAGE_KEY};
use crate::session::{EmojiSession, ScoreListener};

pub type SessionHandle = Arc<Mutex<EmojiSession>>;

/// Idle lifetime of an HTTP session when nothing else is configured.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// Aggregates points reported by game sessions (the menu/leaderboard side).
#[derive(Default)]
pub struct ScoreBoard {
  total: AtomicU64,
}

impl ScoreBoard {
  pub fn record(&self, points: u32) {
    let total = self.total.fetch_add(u64::from(points), Ordering::Relaxed) + u64::from(points);
    info!(target: "grammar_galaxy", points, total, "Game points recorded");
  }

  pub fn total(&self) -> u64 {
    self.total.load(Ordering::Relaxed)
  }
}

struct SessionEntry {
  handle: SessionHandle,
  last_seen: Instant,
}

pub struct AppState {
  pub content: ContentClient,
  pub progress: TrackedProgress,
  sessions: RwLock<HashMap<Uuid, SessionEntry>>,
  session_ttl: Duration,
  pub scores: Arc<ScoreBoard>,
}

impl AppState {
  /// Build state from config: Gemini backend (if a key is present) and file-backed progress.
  #[instrument(level = "info", skip_all)]
  pub fn new(config: &AppConfig) -> Self {
    let backend: Option<Arc<dyn GenerationBackend>> = match config.gemini.clone().map(GeminiBackend::from_config) {
      Some(Ok(b)) => {
        info!(target: "grammar_galaxy", model = %b.model(), "Gemini enabled.");
        Some(Arc::new(b))
      }
      Some(Err(e)) => {
        error!(target: "grammar_galaxy", error = %e, "Failed to build Gemini HTTP client; running unconfigured.");
        None
      }
      None => None,
    };

    let storage: Arc<dyn KeyValueStorage> = match FileStorage::open(&config.progress_dir) {
      Ok(fs) => {
        info!(target: "progress", dir = %config.progress_dir.display(), "File-backed progress storage ready.");
        Arc::new(fs)
      }
      Err(e) => {
        error!(target: "progress", dir = %config.progress_dir.display(), error = %e, "Cannot open progress dir; progress kept in memory only.");
        Arc::new(MemoryStorage::default())
      }
    };

    Self::with_parts(ContentClient::new(backend, config.prompts.clone()), storage)
      .with_session_ttl(config.session_idle)
  }

  pub fn with_parts(content: ContentClient, storage: Arc<dyn KeyValueStorage>) -> Self {
    Self {
      content,
      progress: TrackedProgress::load(ProgressStore::new(storage, PROGRESS_STORAGE_KEY)),
      sessions: RwLock::new(HashMap::new()),
      session_ttl: DEFAULT_SESSION_TTL,
      scores: Arc::new(ScoreBoard::default()),
    }
  }

  pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
    self.session_ttl = ttl;
    self
  }

  /// Fresh session on the shared progress, with points routed to the score board.
  pub fn new_session(&self) -> EmojiSession {
    let board = self.scores.clone();
    let listener: ScoreListener = Arc::new(move |points| board.record(points));
    EmojiSession::new(self.progress.clone(), Some(listener))
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn create_session(&self) -> (Uuid, SessionHandle) {
    self.evict_idle(Instant::now()).await;
    let id = Uuid::new_v4();
    let handle = Arc::new(Mutex::new(self.new_session()));
    let entry = SessionEntry { handle: handle.clone(), last_seen: Instant::now() };
    self.sessions.write().await.insert(id, entry);
    info!(target: "session", %id, "Session created");
    (id, handle)
  }

  /// Look up a session and mark it as used.
  pub async fn session(&self, id: &Uuid) -> Option<SessionHandle> {
    let mut sessions = self.sessions.write().await;
    let entry = sessions.get_mut(id)?;
    entry.last_seen = Instant::now();
    Some(entry.handle.clone())
  }

  pub async fn drop_session(&self, id: &Uuid) -> bool {
    self.sessions.write().await.remove(id).is_some()
  }

  /// Remove sessions idle for at least the TTL as of `now`. Returns how many went.
  /// Requests already holding a handle finish normally.
  pub async fn evict_idle(&self, now: Instant) -> usize {
    let ttl = self.session_ttl;
    let mut sessions = self.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|_, e| now.saturating_duration_since(e.last_seen) < ttl);
    let evicted = before - sessions.len();
    if evicted > 0 {
      info!(target: "session", evicted, live = sessions.len(), "Idle sessions evicted");
    }
    evicted
  }

  /// Periodic eviction for servers that stop creating sessions.
  pub fn spawn_session_sweeper(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
    let period = (self.session_ttl / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
      let mut tick = tokio::time::interval(period);
      loop {
        tick.tick().await;
        let evicted = self.evict_idle(Instant::now()).await;
        debug!(target: "session", evicted, "Session sweep");
      }
    })
  }
}
