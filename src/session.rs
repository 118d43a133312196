use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{Instrument, Level, info, warn};

use crate::compat::{VarietySource, variety_source};
use crate::error::{MatchError, StoreError};
use crate::metrics::metrics_recorder;
use crate::pool::{PoolKey, ScoredCandidate, build_pool};
use crate::profile::{LAST_SUPER_LIKED_AT, SetField, SwipeAction, UserId, UserProfile};
use crate::store::{ErrorReporter, FieldValue, ProfileStore};


/// How much of a swipe [`MatchSession::undo`] takes back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UndoPolicy {
    /// Remove the candidate from the current user's set only. A
    /// `superLikedBy` mark or a completed match on the candidate's record
    /// stays in place.
    #[default]
    Compatible,
    /// Also withdraw the super-like mark and both sides of a match the
    /// undone like created.
    FullReversal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub undo_policy: UndoPolicy,
    /// Roll back the current user's side of a match when the candidate's
    /// side cannot be written.
    pub compensate_partial_match: bool,
    /// Seed for the variety term; `None` draws from entropy.
    pub variety_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            undo_policy: UndoPolicy::Compatible,
            compensate_partial_match: true,
            variety_seed: None,
        }
    }
}

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No pool has been built yet (or the session was closed).
    NotBuilt,
    Browsing,
    /// A like just produced a mutual match; cleared by
    /// [`MatchSession::dismiss_celebration`].
    MatchCelebration,
    Exhausted,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwipeStatus {
    Recorded,
    Matched,
    /// A write failed and was reported; the cursor advanced anyway.
    WriteFailed,
}

/// An entry in the undo history.
#[derive(Debug, Clone)]
pub struct SwipeRecord {
    pub candidate: ScoredCandidate,
    pub action: SwipeAction,
    pub timestamp: DateTime<Utc>,
    /// The swipe completed a mutual match.
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwipeOutcome {
    pub candidate_id: UserId,
    pub action: SwipeAction,
    pub status: SwipeStatus,
    /// Candidates left after this one.
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoOutcome {
    /// The candidate now back under the cursor.
    pub candidate_id: UserId,
    pub action: SwipeAction,
    pub write_failed: bool,
}

enum SwipeEffect {
    Recorded,
    Matched(UserProfile),
}

struct SessionState {
    key: Option<PoolKey>,
    pool: Vec<ScoredCandidate>,
    cursor: usize,
    history: Vec<SwipeRecord>,
    celebration: Option<UserProfile>,
    variety: Box<dyn VarietySource>,
}

impl SessionState {
    fn check_owner(&self, current: &UserProfile) -> Result<(), MatchError> {
        match &self.key {
            None => Err(MatchError::NotBuilt),
            Some(key) if key.user_id != current.id => Err(MatchError::WrongUser {
                expected: key.user_id.clone(),
                actual: current.id.clone(),
            }),
            Some(_) => Ok(()),
        }
    }

    fn remaining(&self) -> usize {
        self.pool.len().saturating_sub(self.cursor)
    }

    fn phase(&self) -> SessionPhase {
        if self.key.is_none() {
            SessionPhase::NotBuilt
        } else if self.celebration.is_some() {
            SessionPhase::MatchCelebration
        } else if self.cursor >= self.pool.len() {
            SessionPhase::Exhausted
        } else {
            SessionPhase::Browsing
        }
    }

    fn discard(&mut self) {
        self.key = None;
        self.pool.clear();
        self.cursor = 0;
        self.history.clear();
        self.celebration = None;
    }
}

/// Swipe session over one ranked candidate pool.
///
/// Operations are serialized by an in-flight guard: a call made while
/// another one is still running is rejected with [`MatchError::InFlight`].
/// Session state moves before any write is awaited. Writes then run on a
/// spawned task that owns the guard and settles the outcome into the
/// session itself, so dropping a pending call neither cancels issued writes
/// nor loses a match they produce. The operation counts as in flight until
/// that task finishes.
///
/// Store failures are reported to the [`ErrorReporter`] and turned into
/// degraded outcomes; `Err` is reserved for misuse of the session.
pub struct MatchSession {
    store: Arc<dyn ProfileStore>,
    reporter: Arc<dyn ErrorReporter>,
    config: SessionConfig,
    state: Arc<Mutex<SessionState>>,
}

impl MatchSession {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        reporter: Arc<dyn ErrorReporter>,
        config: SessionConfig,
    ) -> Self {
        let variety = variety_source(config.variety_seed);
        Self {
            store,
            reporter,
            config,
            state: Arc::new(Mutex::new(SessionState {
                key: None,
                pool: Vec::new(),
                cursor: 0,
                history: Vec::new(),
                celebration: None,
                variety,
            })),
        }
    }

    /// Replace the variety source, e.g. with a fixed one in tests.
    pub fn with_variety(mut self, variety: Box<dyn VarietySource>) -> Self {
        // Only a fresh session is configured this way; nothing shares the
        // state yet.
        if let Some(state) = Arc::get_mut(&mut self.state) {
            state.get_mut().variety = variety;
        }
        self
    }

    fn begin(&self) -> Result<OwnedMutexGuard<SessionState>, MatchError> {
        Arc::clone(&self.state)
            .try_lock_owned()
            .map_err(|_| MatchError::InFlight)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Build a fresh pool for `current`, resetting cursor and history.
    /// Returns the pool size.
    pub async fn rebuild(&self, current: &UserProfile) -> Result<usize, MatchError> {
        let mut state = self.state.try_lock().map_err(|_| MatchError::InFlight)?;
        let pool = build_pool(
            current,
            self.store.as_ref(),
            self.reporter.as_ref(),
            state.variety.as_mut(),
        )
        .await?;

        state.discard();
        state.pool = pool.into_candidates();
        state.key = Some(PoolKey::of(current));
        Ok(state.pool.len())
    }

    /// Rebuild only if `current`'s id or preferences differ from the last
    /// build. Returns whether a rebuild happened.
    pub async fn refresh(&self, current: &UserProfile) -> Result<bool, MatchError> {
        {
            let state = self.state.try_lock().map_err(|_| MatchError::InFlight)?;
            if state.key.as_ref() == Some(&PoolKey::of(current)) {
                return Ok(false);
            }
        }
        self.rebuild(current).await.map(|_| true)
    }

    /// Apply `action` to the candidate under the cursor.
    pub async fn swipe(
        &self,
        current: &UserProfile,
        candidate_id: &str,
        action: SwipeAction,
    ) -> Result<SwipeOutcome, MatchError> {
        let span = tracing::span!(
            Level::INFO,
            "session.swipe",
            user_id = %current.id,
            candidate_id = %candidate_id,
            action = %action
        );
        self.swipe_inner(current, candidate_id, action)
            .instrument(span)
            .await
    }

    async fn swipe_inner(
        &self,
        current: &UserProfile,
        candidate_id: &str,
        action: SwipeAction,
    ) -> Result<SwipeOutcome, MatchError> {
        let mut state = self.begin()?;
        state.check_owner(current)?;
        let candidate = state
            .pool
            .get(state.cursor)
            .cloned()
            .ok_or(MatchError::Exhausted)?;
        if candidate.id() != candidate_id {
            return Err(MatchError::StaleCandidate {
                requested: candidate_id.to_string(),
                expected: candidate.id().to_string(),
            });
        }

        let start = Instant::now();
        let entry = state.history.len();
        state.history.push(SwipeRecord {
            candidate,
            action,
            timestamp: Utc::now(),
            matched: false,
        });
        state.cursor += 1;

        let task = SwipeTask {
            store: Arc::clone(&self.store),
            reporter: Arc::clone(&self.reporter),
            compensate: self.config.compensate_partial_match,
            me: current.id.clone(),
            them: candidate_id.to_string(),
            action,
            entry,
            start,
        };
        match tokio::spawn(task.run(state).in_current_span()).await {
            Ok(outcome) => Ok(outcome),
            Err(join) => {
                let err = MatchError::TaskAborted {
                    candidate_id: candidate_id.to_string(),
                    reason: join.to_string(),
                };
                warn!(error = %err, "swipe_write_failure");
                self.reporter.report(&err);
                Ok(SwipeOutcome {
                    candidate_id: candidate_id.to_string(),
                    action,
                    status: SwipeStatus::WriteFailed,
                    remaining: self.remaining().await,
                })
            }
        }
    }

    /// Take back the most recent swipe.
    ///
    /// Returns `Ok(None)` without touching anything when there is nothing
    /// to undo, and [`MatchError::Exhausted`] once the pool is used up.
    pub async fn undo(&self, current: &UserProfile) -> Result<Option<UndoOutcome>, MatchError> {
        let mut state = self.begin()?;
        if state.history.is_empty() || state.cursor == 0 {
            return Ok(None);
        }
        state.check_owner(current)?;
        // Exhausted is terminal: only a rebuild leaves it.
        if state.phase() == SessionPhase::Exhausted {
            return Err(MatchError::Exhausted);
        }

        let Some(record) = state.history.pop() else {
            return Ok(None);
        };
        state.cursor -= 1;
        let candidate_id = record.candidate.id().to_string();
        if state
            .celebration
            .as_ref()
            .is_some_and(|profile| profile.id == candidate_id)
        {
            state.celebration = None;
        }

        let task = UndoTask {
            store: Arc::clone(&self.store),
            reporter: Arc::clone(&self.reporter),
            policy: self.config.undo_policy,
            me: current.id.clone(),
            them: candidate_id.clone(),
            action: record.action,
            matched: record.matched,
        };
        let write_failed = match tokio::spawn(task.run(state).in_current_span()).await {
            Ok(write_failed) => write_failed,
            Err(join) => {
                let err = MatchError::TaskAborted {
                    candidate_id: candidate_id.clone(),
                    reason: join.to_string(),
                };
                warn!(user_id = %current.id, error = %err, "undo_write_failure");
                self.reporter.report(&err);
                true
            }
        };

        Ok(Some(UndoOutcome {
            candidate_id,
            action: record.action,
            write_failed,
        }))
    }

    /// Leave the celebration overlay, returning the matched profile.
    pub async fn dismiss_celebration(&self) -> Option<UserProfile> {
        self.state.lock().await.celebration.take()
    }

    pub async fn celebration(&self) -> Option<UserProfile> {
        self.state.lock().await.celebration.clone()
    }

    pub async fn current_candidate(&self) -> Option<ScoredCandidate> {
        let state = self.state.lock().await;
        state.pool.get(state.cursor).cloned()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase()
    }

    pub async fn remaining(&self) -> usize {
        self.state.lock().await.remaining()
    }

    /// The whole ranked pool, including candidates already swiped.
    pub async fn candidates(&self) -> Vec<ScoredCandidate> {
        self.state.lock().await.pool.clone()
    }

    pub async fn pool_len(&self) -> usize {
        self.state.lock().await.pool.len()
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history.len()
    }

    pub async fn history(&self) -> Vec<SwipeRecord> {
        self.state.lock().await.history.clone()
    }

    /// Drop the pool and history. Writes already issued are not rolled back.
    pub async fn close(&self) {
        self.state.lock().await.discard();
    }
}

/// Writes for one swipe, run detached from the caller.
struct SwipeTask {
    store: Arc<dyn ProfileStore>,
    reporter: Arc<dyn ErrorReporter>,
    compensate: bool,
    me: UserId,
    them: UserId,
    action: SwipeAction,
    /// History slot of the swipe being written.
    entry: usize,
    start: Instant,
}

impl SwipeTask {
    /// Perform the writes and settle their effect into `state`.
    async fn run(self, mut state: OwnedMutexGuard<SessionState>) -> SwipeOutcome {
        let effect = apply_swipe(
            Arc::clone(&self.store),
            self.compensate,
            self.me.clone(),
            self.them.clone(),
            self.action,
        )
        .await;

        let status = match effect {
            Ok(SwipeEffect::Recorded) => SwipeStatus::Recorded,
            Ok(SwipeEffect::Matched(profile)) => {
                if let Some(record) = state.history.get_mut(self.entry) {
                    record.matched = true;
                }
                state.celebration = Some(profile);
                SwipeStatus::Matched
            }
            Err(err) => {
                warn!(
                    error = %err,
                    elapsed_micros = self.start.elapsed().as_micros(),
                    "swipe_write_failure"
                );
                self.reporter.report(&err);
                SwipeStatus::WriteFailed
            }
        };

        let remaining = state.remaining();
        info!(
            status = ?status,
            remaining,
            elapsed_micros = self.start.elapsed().as_micros(),
            "swipe_applied"
        );
        if let Some(recorder) = metrics_recorder() {
            recorder.record_swipe(self.action, status, self.start.elapsed());
        }

        SwipeOutcome {
            candidate_id: self.them,
            action: self.action,
            status,
            remaining,
        }
    }
}

/// Removals for one undo. Holds the session until they finish so a new
/// swipe cannot interleave with them.
struct UndoTask {
    store: Arc<dyn ProfileStore>,
    reporter: Arc<dyn ErrorReporter>,
    policy: UndoPolicy,
    me: UserId,
    them: UserId,
    action: SwipeAction,
    matched: bool,
}

impl UndoTask {
    /// Returns whether any removal failed.
    async fn run(self, _state: OwnedMutexGuard<SessionState>) -> bool {
        let result = revert_swipe(
            Arc::clone(&self.store),
            self.policy,
            self.me.clone(),
            self.them.clone(),
            self.action,
            self.matched,
        )
        .await;

        let write_failed = match result {
            Ok(()) => false,
            Err(err) => {
                warn!(user_id = %self.me, error = %err, "undo_write_failure");
                self.reporter.report(&err);
                true
            }
        };
        info!(
            user_id = %self.me,
            candidate_id = %self.them,
            action = %self.action,
            write_failed,
            "swipe_undone"
        );
        write_failed
    }
}

fn write_error(action: SwipeAction, candidate_id: &str, source: StoreError) -> MatchError {
    MatchError::Write {
        action,
        candidate_id: candidate_id.to_string(),
        source,
    }
}

async fn apply_swipe(
    store: Arc<dyn ProfileStore>,
    compensate: bool,
    me: UserId,
    them: UserId,
    action: SwipeAction,
) -> Result<SwipeEffect, MatchError> {
    store
        .add_to_set(&me, action.recorded_in(), &them)
        .await
        .map_err(|source| write_error(action, &them, source))?;

    match action {
        SwipeAction::Pass => Ok(SwipeEffect::Recorded),
        SwipeAction::SuperLike => {
            store
                .add_to_set(&them, SetField::SuperLikedBy, &me)
                .await
                .map_err(|source| write_error(action, &them, source))?;
            store
                .set_field(&them, LAST_SUPER_LIKED_AT, FieldValue::ServerTimestamp)
                .await
                .map_err(|source| write_error(action, &them, source))?;
            Ok(SwipeEffect::Recorded)
        }
        SwipeAction::Like => {
            let profile = store
                .get_profile(&them)
                .await
                .map_err(|source| write_error(action, &them, source))?;
            match profile {
                Some(profile) if profile.likes.contains(&me) => {
                    establish_match(store.as_ref(), compensate, &me, &them).await?;
                    Ok(SwipeEffect::Matched(profile))
                }
                _ => Ok(SwipeEffect::Recorded),
            }
        }
    }
}

/// Two-step match write. If the candidate's side fails, the current user's
/// side is withdrawn again when `compensate` is set.
async fn establish_match(
    store: &dyn ProfileStore,
    compensate: bool,
    me: &str,
    them: &str,
) -> Result<(), MatchError> {
    store
        .add_to_set(me, SetField::Matches, them)
        .await
        .map_err(|source| write_error(SwipeAction::Like, them, source))?;

    let Err(source) = store.add_to_set(them, SetField::Matches, me).await else {
        return Ok(());
    };

    let compensated = if compensate {
        match store.remove_from_set(me, SetField::Matches, them).await {
            Ok(()) => true,
            Err(err) => {
                warn!(user_id = %me, candidate_id = %them, error = %err, "match_compensation_failure");
                false
            }
        }
    } else {
        false
    };
    Err(MatchError::PartialMatch {
        candidate_id: them.to_string(),
        compensated,
        source,
    })
}

async fn revert_swipe(
    store: Arc<dyn ProfileStore>,
    policy: UndoPolicy,
    me: UserId,
    them: UserId,
    action: SwipeAction,
    matched: bool,
) -> Result<(), MatchError> {
    let undo_error = |source: StoreError| MatchError::Undo {
        action,
        candidate_id: them.clone(),
        source,
    };

    let mut steps: Vec<(UserId, SetField, UserId)> =
        vec![(me.clone(), action.recorded_in(), them.clone())];
    if policy == UndoPolicy::FullReversal {
        match action {
            SwipeAction::SuperLike => {
                steps.push((them.clone(), SetField::SuperLikedBy, me.clone()));
            }
            SwipeAction::Like if matched => {
                steps.push((me.clone(), SetField::Matches, them.clone()));
                steps.push((them.clone(), SetField::Matches, me.clone()));
            }
            _ => {}
        }
    }

    // Every step is attempted; the first failure is the one reported.
    let mut first_failure = None;
    for (user, field, value) in steps {
        if let Err(source) = store.remove_from_set(&user, field, &value).await {
            if first_failure.is_none() {
                first_failure = Some(source);
            }
        }
    }
    match first_failure {
        Some(source) => Err(undo_error(source)),
        None => Ok(()),
    }
}
