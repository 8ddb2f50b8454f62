//! In-memory story store
//!
//! Backs `hn-ingest run --dry-run` and the pipeline tests. Writes are staged
//! per transaction and applied on commit; the primary key is enforced at
//! insert and again at commit.

use async_trait::async_trait;
use chrono::Utc;
use hn_common::{ErrorRecord, Story};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{StoreConnector, StoreError, StoreResult, StoreTransaction, StoryStore};

#[derive(Debug, Default)]
struct MemoryState {
    stories: BTreeMap<i64, Story>,
    errors: Vec<ErrorRecord>,
    story_writes: usize,
    sessions_opened: usize,
    sessions_closed: usize,
}

/// Cloning shares the underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `stories` (not counted as writes).
    pub fn with_stories(stories: impl IntoIterator<Item = Story>) -> Self {
        let store = Self::new();
        {
            let mut state = lock(&store.state);
            for story in stories {
                state.stories.insert(story.id, story);
            }
        }
        store
    }

    pub fn story(&self, id: i64) -> Option<Story> {
        lock(&self.state).stories.get(&id).cloned()
    }

    pub fn stories(&self) -> Vec<Story> {
        lock(&self.state).stories.values().cloned().collect()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        lock(&self.state).errors.clone()
    }

    /// Committed story inserts and updates.
    pub fn story_writes(&self) -> usize {
        lock(&self.state).story_writes
    }

    pub fn sessions_opened(&self) -> usize {
        lock(&self.state).sessions_opened
    }

    pub fn sessions_closed(&self) -> usize {
        lock(&self.state).sessions_closed
    }
}

#[async_trait]
impl StoreConnector for MemoryStore {
    type Store = MemoryStore;

    async fn connect(&self) -> StoreResult<MemoryStore> {
        lock(&self.state).sessions_opened += 1;
        Ok(self.clone())
    }
}

#[async_trait]
impl StoryStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
        }))
    }

    async fn close(&self) {
        lock(&self.state).sessions_closed += 1;
    }
}

#[derive(Debug)]
enum Pending {
    Insert(Story),
    Update {
        id: i64,
        score: Option<i32>,
        descendants: Option<i32>,
    },
    Error {
        story_id: Option<i64>,
        message: String,
    },
}

pub struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    pending: Vec<Pending>,
}

impl MemoryTransaction {
    /// Committed row with this transaction's staged writes applied.
    fn view(&self, id: i64) -> Option<Story> {
        let mut story = lock(&self.state).stories.get(&id).cloned();
        for op in &self.pending {
            match op {
                Pending::Insert(s) if s.id == id => story = Some(s.clone()),
                Pending::Update {
                    id: target,
                    score,
                    descendants,
                } if *target == id => {
                    if let Some(s) = story.as_mut() {
                        s.score = *score;
                        s.descendants = *descendants;
                    }
                },
                _ => {},
            }
        }
        story
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_story(&mut self, id: i64) -> StoreResult<Option<Story>> {
        Ok(self.view(id))
    }

    async fn insert_story(&mut self, story: &Story) -> StoreResult<()> {
        if self.view(story.id).is_some() {
            return Err(StoreError::Conflict(story.id));
        }
        self.pending.push(Pending::Insert(story.clone()));
        Ok(())
    }

    async fn update_counters(
        &mut self,
        id: i64,
        score: Option<i32>,
        descendants: Option<i32>,
    ) -> StoreResult<()> {
        if self.view(id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        self.pending.push(Pending::Update {
            id,
            score,
            descendants,
        });
        Ok(())
    }

    async fn insert_error(&mut self, story_id: Option<i64>, message: &str) -> StoreResult<()> {
        self.pending.push(Pending::Error {
            story_id,
            message: message.to_string(),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut state = lock(&self.state);

        for op in &self.pending {
            if let Pending::Insert(story) = op {
                if state.stories.contains_key(&story.id) {
                    return Err(StoreError::Conflict(story.id));
                }
            }
        }

        for op in self.pending {
            match op {
                Pending::Insert(story) => {
                    state.stories.insert(story.id, story);
                    state.story_writes += 1;
                },
                Pending::Update {
                    id,
                    score,
                    descendants,
                } => {
                    if let Some(story) = state.stories.get_mut(&id) {
                        story.score = score;
                        story.descendants = descendants;
                        state.story_writes += 1;
                    }
                },
                Pending::Error { story_id, message } => {
                    let id = state.errors.len() as i64 + 1;
                    state.errors.push(ErrorRecord {
                        id,
                        story_id,
                        error_message: message,
                        created_at: Utc::now(),
                    });
                },
            }
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
