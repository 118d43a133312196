//! Pairwise compatibility scoring.
//!
//! The score blends three lifestyle signals with a bounded random term:
//!
//! | signal       | points                                     |
//! |--------------|--------------------------------------------|
//! | sleep        | `(10 - |Δsleep|) * 2.5`                    |
//! | cleanliness  | `(10 - |Δcleanliness|) * 2.5`              |
//! | shared tags  | `common / min(|a.tags|, 5) * 30`           |
//! | variety      | uniform in `[0, 20)`                       |
//!
//! The sum is rounded and capped at 100. The variety term is drawn from a
//! caller-supplied [`VarietySource`] so rankings can be replayed in tests.
//! Scoring is asymmetric: the tag term is normalised by the first
//! profile's tag count.

use serde::{Deserialize, Serialize};

use crate::profile::UserProfile;

/// Upper bound of the final score.
pub const MAX_SCORE: u8 = 100;

/// Points per unit of lifestyle agreement (10 units → 25 points).
const LEVEL_WEIGHT: f64 = 2.5;
/// Points for a full tag overlap.
const TAG_WEIGHT: f64 = 30.0;
/// Tag counts above this are not penalised further.
const TAG_NORMALISER_CAP: usize = 5;
/// Width of the variety term.
const VARIETY_SPAN: f64 = 20.0;
/// Lifestyle differences at or below this produce an insight.
const INSIGHT_LEVEL_TOLERANCE: u8 = 2;
/// Insights returned per pair.
pub const MAX_INSIGHTS: usize = 3;

/// Source of the variety term, yielding values in `[0, 1)`.
pub trait VarietySource: Send {
    fn next_unit(&mut self) -> f64;
}

impl VarietySource for fastrand::Rng {
    fn next_unit(&mut self) -> f64 {
        self.f64()
    }
}

/// Always yields the same value. Useful for reproducible scores.
#[derive(Debug, Clone, Copy)]
pub struct FixedVariety(pub f64);

impl VarietySource for FixedVariety {
    fn next_unit(&mut self) -> f64 {
        self.0.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

/// Build the default source: seeded when `seed` is set, entropy otherwise.
pub fn variety_source(seed: Option<u64>) -> Box<dyn VarietySource> {
    match seed {
        Some(seed) => Box::new(fastrand::Rng::with_seed(seed)),
        None => Box::new(fastrand::Rng::new()),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Sleep,
    Cleanliness,
    Social,
    Ai,
}

/// A short reason shown next to a compatibility score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub text: String,
    pub icon: String,
}

impl Insight {
    fn new(kind: InsightKind, text: impl Into<String>, icon: &str) -> Self {
        Self {
            kind,
            text: text.into(),
            icon: icon.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Compatibility {
    pub score: u8,
    pub insights: Vec<Insight>,
}

/// The measured part of a comparison, before the variety term.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakdown<'a> {
    pub sleep_diff: u8,
    pub cleanliness_diff: u8,
    pub same_social_vibe: bool,
    pub common_tags: Vec<&'a str>,
    pub points: f64,
}

/// Compare two profiles without drawing any randomness.
pub fn breakdown<'a>(a: &'a UserProfile, b: &UserProfile) -> Breakdown<'a> {
    let sleep_diff = a
        .lifestyle
        .sleep_level()
        .abs_diff(b.lifestyle.sleep_level());
    let cleanliness_diff = a
        .lifestyle
        .cleanliness_level()
        .abs_diff(b.lifestyle.cleanliness_level());

    let tags_a = a.ai_analysis.unique_tags();
    let common_tags: Vec<&str> = tags_a
        .iter()
        .copied()
        .filter(|tag| b.ai_analysis.tags.iter().any(|t| t.as_str() == *tag))
        .collect();

    let mut points = f64::from(10 - sleep_diff) * LEVEL_WEIGHT;
    points += f64::from(10 - cleanliness_diff) * LEVEL_WEIGHT;
    let normaliser = tags_a.len().min(TAG_NORMALISER_CAP);
    if normaliser > 0 {
        points += common_tags.len() as f64 / normaliser as f64 * TAG_WEIGHT;
    }

    Breakdown {
        sleep_diff,
        cleanliness_diff,
        same_social_vibe: a.lifestyle.social_vibe == b.lifestyle.social_vibe,
        common_tags,
        points,
    }
}

/// Score `b` as a roommate for `a`.
pub fn score(a: &UserProfile, b: &UserProfile, variety: &mut dyn VarietySource) -> Compatibility {
    let parts = breakdown(a, b);
    let total = parts.points + variety.next_unit() * VARIETY_SPAN;
    let score = total.round().clamp(0.0, f64::from(MAX_SCORE)) as u8;

    Compatibility {
        score,
        insights: insights(&parts),
    }
}

fn insights(parts: &Breakdown<'_>) -> Vec<Insight> {
    let mut out = Vec::with_capacity(MAX_INSIGHTS);

    if parts.sleep_diff <= INSIGHT_LEVEL_TOLERANCE {
        let text = if parts.sleep_diff == 0 {
            "Same Sleep Schedule"
        } else {
            "Similar Sleep Habits"
        };
        out.push(Insight::new(InsightKind::Sleep, text, "🌙"));
    }
    if parts.cleanliness_diff <= INSIGHT_LEVEL_TOLERANCE {
        let text = if parts.cleanliness_diff == 0 {
            "Same Cleanliness Level"
        } else {
            "Similar Cleanliness Habits"
        };
        out.push(Insight::new(InsightKind::Cleanliness, text, "✨"));
    }
    if parts.same_social_vibe {
        out.push(Insight::new(
            InsightKind::Social,
            "Same Social Preferences",
            "🏠",
        ));
    }
    if let Some(first) = parts.common_tags.first() {
        out.push(Insight::new(InsightKind::Ai, format!("Shared: {first}"), "🤖"));
    }

    out.truncate(MAX_INSIGHTS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{AiAnalysis, Lifestyle, SocialVibe};

    fn profile(sleep: u8, cleanliness: u8, vibe: &str, tags: &[&str]) -> UserProfile {
        UserProfile {
            lifestyle: Lifestyle {
                sleep: Some(sleep),
                cleanliness: Some(cleanliness),
                social_vibe: Some(SocialVibe::from(vibe)),
                work_schedule: None,
            },
            ai_analysis: AiAnalysis {
                description: String::new(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            },
            ..UserProfile::new("p")
        }
    }

    #[test]
    fn identical_profiles_score_ninety_with_midpoint_variety() {
        let a = profile(8, 8, "Introvert", &["quiet", "studious"]);
        let b = profile(8, 8, "Introvert", &["quiet", "studious"]);

        let result = score(&a, &b, &mut FixedVariety(0.5));

        assert_eq!(result.score, 90);
        let kinds: Vec<_> = result.insights.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![InsightKind::Sleep, InsightKind::Cleanliness, InsightKind::Social]
        );
        assert_eq!(result.insights[0].text, "Same Sleep Schedule");
        assert_eq!(result.insights[1].text, "Same Cleanliness Level");
    }

    #[test]
    fn near_levels_use_similar_wording() {
        let a = profile(3, 6, "quiet_sanctuary", &[]);
        let b = profile(5, 8, "social_hub", &["quiet"]);

        let result = score(&a, &b, &mut FixedVariety(0.0));

        assert_eq!(result.insights.len(), 2);
        assert_eq!(result.insights[0].text, "Similar Sleep Habits");
        assert_eq!(result.insights[1].text, "Similar Cleanliness Habits");
        // (10-2)*2.5 twice, no tags on `a`
        assert_eq!(result.score, 40);
    }

    #[test]
    fn ai_insight_surfaces_when_room_remains() {
        let a = profile(1, 1, "quiet_sanctuary", &["Creative", "Organized"]);
        let b = profile(10, 10, "social_hub", &["Organized", "Creative"]);

        let result = score(&a, &b, &mut FixedVariety(0.0));

        assert_eq!(result.insights.len(), 1);
        assert_eq!(result.insights[0].kind, InsightKind::Ai);
        assert_eq!(result.insights[0].text, "Shared: Creative");
        assert_eq!(result.insights[0].icon, "🤖");
    }

    #[test]
    fn empty_tags_contribute_nothing() {
        let a = profile(5, 5, "social_hub", &[]);
        let b = profile(5, 5, "social_hub", &["Fun"]);
        let parts = breakdown(&a, &b);
        assert_eq!(parts.points, 50.0);
        assert!(parts.common_tags.is_empty());
    }

    #[test]
    fn missing_lifestyle_defaults_to_midpoint() {
        let a = UserProfile::new("a");
        let b = profile(9, 1, "social_hub", &[]);
        let parts = breakdown(&a, &b);
        assert_eq!(parts.sleep_diff, 4);
        assert_eq!(parts.cleanliness_diff, 4);
    }

    #[test]
    fn absent_social_vibes_compare_equal() {
        let a = UserProfile::new("a");
        let b = UserProfile::new("b");
        assert!(breakdown(&a, &b).same_social_vibe);
    }

    #[test]
    fn score_never_exceeds_cap() {
        let a = profile(5, 5, "x", &["a", "b", "c", "d", "e", "f", "g"]);
        let b = profile(5, 5, "x", &["a", "b", "c", "d", "e", "f", "g"]);
        let result = score(&a, &b, &mut FixedVariety(0.99));
        assert_eq!(result.score, MAX_SCORE);
    }

    #[test]
    fn scores_stay_in_bounds_across_seeds() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..500 {
            let a = profile(rng.u8(0..=12), rng.u8(0..=12), "x", &["a", "b"]);
            let b = profile(rng.u8(0..=12), rng.u8(0..=12), "y", &["b"]);
            let result = score(&a, &b, &mut rng);
            assert!(result.score <= MAX_SCORE);
            assert!(result.insights.len() <= MAX_INSIGHTS);
        }
    }

    #[test]
    fn seeded_sources_replay() {
        let a = profile(4, 6, "x", &["a"]);
        let b = profile(6, 4, "x", &["a"]);
        let first = score(&a, &b, variety_source(Some(11)).as_mut());
        let second = score(&a, &b, variety_source(Some(11)).as_mut());
        assert_eq!(first, second);
    }
}
