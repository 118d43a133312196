//! Candidate pool construction.
//!
//! A pool is built in one pass: query the store for every profile of an
//! acceptable gender, drop self and anyone already liked or passed, keep only
//! candidates whose own preferences accept the current user, score the
//! survivors and sort them best-first. Ties keep the order the store
//! returned them in.

use std::time::Instant;

use serde::Serialize;
use tracing::{Instrument, Level, info, warn};

use crate::compat::{self, Insight, VarietySource};
use crate::error::MatchError;
use crate::metrics::metrics_recorder;
use crate::profile::{Gender, GenderPreference, MatchingPreferences, UserId, UserProfile};
use crate::store::{ErrorReporter, ProfileStore};

/// A candidate annotated with its score against the current user.
///
/// Serializes as the profile document plus `compatibility` and
/// `compatibilityInsights`; these are never written back to the store.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub compatibility: u8,
    pub compatibility_insights: Vec<Insight>,
}

impl ScoredCandidate {
    pub fn id(&self) -> &str {
        &self.profile.id
    }
}

/// Ranked output of [`build_pool`].
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    candidates: Vec<ScoredCandidate>,
    fetched: usize,
    query_failed: bool,
}

impl CandidatePool {
    pub fn candidates(&self) -> &[ScoredCandidate] {
        &self.candidates
    }

    pub fn into_candidates(self) -> Vec<ScoredCandidate> {
        self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Profiles returned by the store before filtering.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// True when the pool is empty because the store query failed.
    pub fn query_failed(&self) -> bool {
        self.query_failed
    }
}

/// Identity of a pool build: a pool is stale once either part changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolKey {
    pub user_id: UserId,
    pub preferences: Vec<GenderPreference>,
}

impl PoolKey {
    pub fn of(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.id.clone(),
            preferences: profile
                .matching_preferences
                .as_ref()
                .map(|prefs| prefs.gender.clone())
                .unwrap_or_default(),
        }
    }
}

/// Genders to query for: everything under "Open to All", otherwise the
/// listed genders in order, without duplicates.
pub fn effective_gender_filter(prefs: &MatchingPreferences) -> Vec<Gender> {
    if prefs.is_open_to_all() {
        return Gender::ALL.to_vec();
    }
    let mut out = Vec::with_capacity(prefs.gender.len());
    for gender in prefs.gender.iter().filter_map(|p| p.gender()) {
        if !out.contains(&gender) {
            out.push(gender);
        }
    }
    out
}

/// Admission rule applied to every fetched profile.
pub fn admits(current: &UserProfile, candidate: &UserProfile) -> bool {
    candidate.id != current.id
        && !current.has_interacted_with(&candidate.id)
        && candidate.accepts_gender(current.gender)
}

/// Build a ranked pool for `current`.
///
/// Fails only when `current` has no gender preferences. A store failure is
/// reported to `reporter` and produces an empty pool.
pub async fn build_pool(
    current: &UserProfile,
    store: &dyn ProfileStore,
    reporter: &dyn ErrorReporter,
    variety: &mut dyn VarietySource,
) -> Result<CandidatePool, MatchError> {
    let prefs = match current.matching_preferences.as_ref() {
        Some(prefs) if !prefs.gender.is_empty() => prefs,
        _ => return Err(MatchError::MissingPreferences),
    };
    let genders = effective_gender_filter(prefs);

    let span = tracing::span!(Level::INFO, "pool.build", user_id = %current.id);
    async move {
        let start = Instant::now();
        let fetched = match store.query_by_gender(&genders).await {
            Ok(profiles) => profiles,
            Err(err) => {
                let err = MatchError::Query(err);
                warn!(
                    error = %err,
                    elapsed_micros = start.elapsed().as_micros(),
                    "pool_build_failure"
                );
                reporter.report(&err);
                if let Some(recorder) = metrics_recorder() {
                    recorder.record_pool_build(start.elapsed(), 0, 0, false);
                }
                return Ok(CandidatePool {
                    query_failed: true,
                    ..CandidatePool::default()
                });
            }
        };

        let fetched_count = fetched.len();
        let mut candidates: Vec<ScoredCandidate> = fetched
            .into_iter()
            .filter(|candidate| admits(current, candidate))
            .map(|profile| {
                let compat = compat::score(current, &profile, &mut *variety);
                ScoredCandidate {
                    profile,
                    compatibility: compat.score,
                    compatibility_insights: compat.insights,
                }
            })
            .collect();

        // Stable, so equal scores keep fetch order.
        candidates.sort_by(|a, b| b.compatibility.cmp(&a.compatibility));

        info!(
            genders = ?genders,
            fetched = fetched_count,
            admitted = candidates.len(),
            elapsed_micros = start.elapsed().as_micros(),
            "pool_build_success"
        );
        if let Some(recorder) = metrics_recorder() {
            recorder.record_pool_build(start.elapsed(), fetched_count, candidates.len(), true);
        }

        Ok(CandidatePool {
            candidates,
            fetched: fetched_count,
            query_failed: false,
        })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::GenderPreference as P;

    fn person(id: &str, gender: Gender, prefs: &[P]) -> UserProfile {
        UserProfile {
            gender: Some(gender),
            matching_preferences: Some(MatchingPreferences::new(prefs.iter().copied())),
            ..UserProfile::new(id)
        }
    }

    #[test]
    fn open_to_all_expands_to_every_gender() {
        let prefs = MatchingPreferences::new([P::Woman, P::OpenToAll]);
        assert_eq!(effective_gender_filter(&prefs), Gender::ALL.to_vec());
    }

    #[test]
    fn explicit_preferences_are_deduplicated() {
        let prefs = MatchingPreferences::new([P::Woman, P::Man, P::Woman]);
        assert_eq!(
            effective_gender_filter(&prefs),
            vec![Gender::Woman, Gender::Man]
        );
    }

    #[test]
    fn admission_requires_mutual_preference() {
        let me = person("me", Gender::Man, &[P::Woman]);
        let likes_men = person("w1", Gender::Woman, &[P::Man]);
        let likes_women = person("w2", Gender::Woman, &[P::Woman]);
        let open = person("w3", Gender::Woman, &[P::OpenToAll]);

        assert!(admits(&me, &likes_men));
        assert!(!admits(&me, &likes_women));
        assert!(admits(&me, &open));
    }

    #[test]
    fn admission_excludes_self_and_prior_interactions() {
        let mut me = person("me", Gender::Woman, &[P::OpenToAll]);
        me.likes.insert("liked".into());
        me.passes.insert("passed".into());

        assert!(!admits(&me, &me.clone()));
        assert!(!admits(&me, &person("liked", Gender::Man, &[P::OpenToAll])));
        assert!(!admits(&me, &person("passed", Gender::Man, &[P::OpenToAll])));
        assert!(admits(&me, &person("fresh", Gender::Man, &[P::OpenToAll])));
    }

    #[test]
    fn candidates_without_preferences_are_never_admitted() {
        let me = person("me", Gender::Woman, &[P::OpenToAll]);
        let mut other = UserProfile::new("x");
        other.gender = Some(Gender::Man);
        assert!(!admits(&me, &other));
    }

    #[test]
    fn pool_key_tracks_id_and_preferences() {
        let a = person("me", Gender::Woman, &[P::Man]);
        let mut b = a.clone();
        assert_eq!(PoolKey::of(&a), PoolKey::of(&b));
        b.matching_preferences = Some(MatchingPreferences::new([P::OpenToAll]));
        assert_ne!(PoolKey::of(&a), PoolKey::of(&b));
    }
}
