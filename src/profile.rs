//! Profile documents as the backend stores them.
//!
//! Field names follow the backend's camelCase document layout so records
//! round-trip through [`serde_json`] without a mapping layer. Fields the
//! engine does not interpret (photo URLs, onboarding answers, ...) are kept
//! in [`UserProfile::extra`] rather than dropped.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Opaque user identifier assigned by the auth backend.
pub type UserId = String;

/// Lifestyle level assumed when a profile leaves sleep or cleanliness unset.
pub const DEFAULT_LEVEL: u8 = 5;

/// Lowest and highest lifestyle level a profile can carry.
pub const LEVEL_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Gender {
    Man,
    Woman,
    #[serde(rename = "Non-binary")]
    NonBinary,
}

impl Gender {
    /// Every gender a candidate query can ask for.
    pub const ALL: [Gender; 3] = [Gender::Man, Gender::Woman, Gender::NonBinary];

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Man => "Man",
            Gender::Woman => "Woman",
            Gender::NonBinary => "Non-binary",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of `matchingPreferences.gender`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GenderPreference {
    Man,
    Woman,
    #[serde(rename = "Non-binary")]
    NonBinary,
    #[serde(rename = "Open to All")]
    OpenToAll,
}

impl GenderPreference {
    /// The concrete gender this entry names, or `None` for the sentinel.
    pub fn gender(self) -> Option<Gender> {
        match self {
            GenderPreference::Man => Some(Gender::Man),
            GenderPreference::Woman => Some(Gender::Woman),
            GenderPreference::NonBinary => Some(Gender::NonBinary),
            GenderPreference::OpenToAll => None,
        }
    }
}

impl From<Gender> for GenderPreference {
    fn from(value: Gender) -> Self {
        match value {
            Gender::Man => GenderPreference::Man,
            Gender::Woman => GenderPreference::Woman,
            Gender::NonBinary => GenderPreference::NonBinary,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchingPreferences {
    #[serde(default, deserialize_with = "null_as_default")]
    pub gender: Vec<GenderPreference>,
}

impl MatchingPreferences {
    pub fn new(gender: impl IntoIterator<Item = GenderPreference>) -> Self {
        Self {
            gender: gender.into_iter().collect(),
        }
    }

    pub fn is_open_to_all(&self) -> bool {
        self.gender.contains(&GenderPreference::OpenToAll)
    }

    /// True when someone of `gender` is acceptable under these preferences.
    ///
    /// A missing gender is only acceptable to "Open to All".
    pub fn accepts(&self, gender: Option<Gender>) -> bool {
        self.is_open_to_all()
            || gender.is_some_and(|g| self.gender.contains(&GenderPreference::from(g)))
    }
}

/// Household social preference.
///
/// The three onboarding choices are modelled explicitly; anything else a
/// document carries is preserved verbatim and compared by string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SocialVibe {
    QuietSanctuary,
    OccasionalFriends,
    SocialHub,
    Other(String),
}

impl SocialVibe {
    pub fn as_str(&self) -> &str {
        match self {
            SocialVibe::QuietSanctuary => "quiet_sanctuary",
            SocialVibe::OccasionalFriends => "occasional_friends",
            SocialVibe::SocialHub => "social_hub",
            SocialVibe::Other(raw) => raw,
        }
    }

    /// Human-readable label shown on the detailed profile card.
    pub fn label(&self) -> &str {
        match self {
            SocialVibe::QuietSanctuary => "Quiet Sanctuary",
            SocialVibe::OccasionalFriends => "Occasional Friends",
            SocialVibe::SocialHub => "Social Hub",
            SocialVibe::Other(raw) => raw,
        }
    }
}

impl From<String> for SocialVibe {
    fn from(value: String) -> Self {
        match value.as_str() {
            "quiet_sanctuary" => SocialVibe::QuietSanctuary,
            "occasional_friends" => SocialVibe::OccasionalFriends,
            "social_hub" => SocialVibe::SocialHub,
            _ => SocialVibe::Other(value),
        }
    }
}

impl From<&str> for SocialVibe {
    fn from(value: &str) -> Self {
        SocialVibe::from(value.to_string())
    }
}

impl From<SocialVibe> for String {
    fn from(value: SocialVibe) -> Self {
        match value {
            SocialVibe::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lifestyle {
    #[serde(default, deserialize_with = "de_level", skip_serializing_if = "Option::is_none")]
    pub sleep: Option<u8>,
    #[serde(default, deserialize_with = "de_level", skip_serializing_if = "Option::is_none")]
    pub cleanliness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_vibe: Option<SocialVibe>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_schedule: Option<String>,
}

impl Lifestyle {
    /// Sleep level used for scoring: unset or zero falls back to
    /// [`DEFAULT_LEVEL`], everything else is clamped into [`LEVEL_RANGE`].
    pub fn sleep_level(&self) -> u8 {
        effective_level(self.sleep)
    }

    /// Cleanliness level used for scoring, same defaulting as [`Self::sleep_level`].
    pub fn cleanliness_level(&self) -> u8 {
        effective_level(self.cleanliness)
    }
}

fn effective_level(raw: Option<u8>) -> u8 {
    match raw {
        None | Some(0) => DEFAULT_LEVEL,
        Some(level) => level.clamp(*LEVEL_RANGE.start(), *LEVEL_RANGE.end()),
    }
}

/// Display label for a sleep level.
pub fn sleep_label(level: u8) -> &'static str {
    match level {
        0..=3 => "Early Bird",
        4..=7 => "Balanced",
        _ => "Night Owl",
    }
}

/// Display label for a cleanliness level.
pub fn cleanliness_label(level: u8) -> &'static str {
    match level {
        0..=3 => "Very Tidy",
        4..=7 => "Balanced",
        _ => "Laid Back",
    }
}

// Onboarding forms persist inputs as strings, older documents as numbers;
// accept both. Blank or unparseable text reads as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    let number = match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(text)) => text.trim().parse::<f64>().ok(),
    };
    Ok(number.filter(|n| n.is_finite() && *n >= 0.0))
}

// Levels are integral: a fractional slider value is rounded to the nearest
// step before any difference is taken.
fn de_level<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.map(|n| n.round().min(f64::from(u8::MAX)) as u8))
}

fn de_age<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.map(|n| n.round().min(f64::from(u32::MAX)) as u32))
}

/// Reads an explicit `null` as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl AiAnalysis {
    /// Tags in first-seen order with duplicates removed.
    pub fn unique_tags(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.tags
            .iter()
            .map(String::as_str)
            .filter(|tag| seen.insert(*tag))
            .collect()
    }
}

/// The interaction sets stored on every profile document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SetField {
    Likes,
    Passes,
    SuperLikes,
    Matches,
    SuperLikedBy,
}

impl SetField {
    /// Document field name.
    pub fn as_str(self) -> &'static str {
        match self {
            SetField::Likes => "likes",
            SetField::Passes => "passes",
            SetField::SuperLikes => "superLikes",
            SetField::Matches => "matches",
            SetField::SuperLikedBy => "superLikedBy",
        }
    }
}

impl fmt::Display for SetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document field written alongside a super-like.
pub const LAST_SUPER_LIKED_AT: &str = "lastSuperLikedAt";

/// What the current user did with the candidate under the cursor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    Like,
    Pass,
    #[serde(alias = "super_like")]
    SuperLike,
}

impl SwipeAction {
    /// The current user's set this action appends the candidate to.
    pub fn recorded_in(self) -> SetField {
        match self {
            SwipeAction::Like => SetField::Likes,
            SwipeAction::Pass => SetField::Passes,
            SwipeAction::SuperLike => SetField::SuperLikes,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwipeAction::Like => "like",
            SwipeAction::Pass => "pass",
            SwipeAction::SuperLike => "superlike",
        }
    }
}

impl fmt::Display for SwipeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SwipeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" => Ok(SwipeAction::Like),
            "pass" => Ok(SwipeAction::Pass),
            "superlike" | "super_like" | "super-like" => Ok(SwipeAction::SuperLike),
            other => Err(format!("unknown swipe action: {other}")),
        }
    }
}

/// A user profile document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "uid", alias = "id")]
    pub id: UserId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "de_age", skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_preferences: Option<MatchingPreferences>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lifestyle: Lifestyle,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ai_analysis: AiAnalysis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about_me: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ideal_weekend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub important_in_roommate: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub likes: BTreeSet<UserId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub passes: BTreeSet<UserId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub super_likes: BTreeSet<UserId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub matches: BTreeSet<UserId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub super_liked_by: BTreeSet<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_super_liked_at: Option<DateTime<Utc>>,

    /// Document fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn set(&self, field: SetField) -> &BTreeSet<UserId> {
        match field {
            SetField::Likes => &self.likes,
            SetField::Passes => &self.passes,
            SetField::SuperLikes => &self.super_likes,
            SetField::Matches => &self.matches,
            SetField::SuperLikedBy => &self.super_liked_by,
        }
    }

    pub fn set_mut(&mut self, field: SetField) -> &mut BTreeSet<UserId> {
        match field {
            SetField::Likes => &mut self.likes,
            SetField::Passes => &mut self.passes,
            SetField::SuperLikes => &mut self.super_likes,
            SetField::Matches => &mut self.matches,
            SetField::SuperLikedBy => &mut self.super_liked_by,
        }
    }

    /// True once this user has liked or passed on `other`.
    pub fn has_interacted_with(&self, other: &str) -> bool {
        self.likes.contains(other) || self.passes.contains(other)
    }

    /// Mutual-preference check: does this profile accept someone of `gender`?
    pub fn accepts_gender(&self, gender: Option<Gender>) -> bool {
        self.matching_preferences
            .as_ref()
            .is_some_and(|prefs| prefs.accepts(gender))
    }

    pub fn sleep_label(&self) -> &'static str {
        sleep_label(self.lifestyle.sleep_level())
    }

    pub fn cleanliness_label(&self) -> &'static str {
        cleanliness_label(self.lifestyle.cleanliness_level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_backend_document() {
        let doc = json!({
            "uid": "sarah",
            "name": "Sarah Chen",
            "age": 24,
            "gender": "Woman",
            "matchingPreferences": { "gender": ["Man", "Woman"] },
            "lifestyle": { "sleep": 7, "cleanliness": "8", "socialVibe": "occasional_friends" },
            "aiAnalysis": { "description": "creative", "tags": ["Creative", "Organized"] },
            "likes": ["mike"],
            "imageUrl": "https://cdn.example/sarah.png"
        });

        let profile: UserProfile = serde_json::from_value(doc).unwrap();
        assert_eq!(profile.id, "sarah");
        assert_eq!(profile.gender, Some(Gender::Woman));
        assert_eq!(profile.lifestyle.sleep, Some(7));
        assert_eq!(profile.lifestyle.cleanliness, Some(8));
        assert_eq!(
            profile.lifestyle.social_vibe,
            Some(SocialVibe::OccasionalFriends)
        );
        assert!(profile.likes.contains("mike"));
        assert_eq!(
            profile.extra.get("imageUrl"),
            Some(&json!("https://cdn.example/sarah.png"))
        );
    }

    #[test]
    fn tolerates_documents_written_by_onboarding() {
        let doc = json!({
            "uid": "sam",
            "name": null,
            "age": "24",
            "gender": "Man",
            "matchingPreferences": { "gender": null },
            "lifestyle": null,
            "aiAnalysis": null,
            "likes": null,
            "passes": null,
            "superLikes": null,
            "matches": null,
            "superLikedBy": null
        });

        let profile: UserProfile = serde_json::from_value(doc).unwrap();
        assert_eq!(profile.age, Some(24));
        assert_eq!(profile.name, "");
        assert_eq!(profile.lifestyle, Lifestyle::default());
        assert!(profile.ai_analysis.tags.is_empty());
        assert!(profile.likes.is_empty() && profile.super_liked_by.is_empty());
        assert_eq!(profile.matching_preferences, Some(MatchingPreferences::default()));
    }

    #[test]
    fn age_accepts_numbers_strings_and_blanks() {
        let age = |value: Value| {
            serde_json::from_value::<UserProfile>(json!({ "uid": "a", "age": value }))
                .unwrap()
                .age
        };
        assert_eq!(age(json!(31)), Some(31));
        assert_eq!(age(json!(" 27 ")), Some(27));
        assert_eq!(age(json!("")), None);
        assert_eq!(age(json!("twenty")), None);
        assert_eq!(age(Value::Null), None);
    }

    #[test]
    fn fractional_levels_round_to_nearest_step() {
        let lifestyle: Lifestyle =
            serde_json::from_value(json!({ "sleep": 7.5, "cleanliness": "2.4" })).unwrap();
        assert_eq!(lifestyle.sleep, Some(8));
        assert_eq!(lifestyle.cleanliness, Some(2));
    }

    #[test]
    fn unknown_social_vibe_is_preserved() {
        let vibe: SocialVibe = serde_json::from_value(json!("Introvert")).unwrap();
        assert_eq!(vibe, SocialVibe::Other("Introvert".into()));
        assert_eq!(serde_json::to_value(&vibe).unwrap(), json!("Introvert"));
    }

    #[test]
    fn levels_default_and_clamp() {
        let mut lifestyle = Lifestyle::default();
        assert_eq!(lifestyle.sleep_level(), DEFAULT_LEVEL);
        lifestyle.sleep = Some(0);
        assert_eq!(lifestyle.sleep_level(), DEFAULT_LEVEL);
        lifestyle.sleep = Some(42);
        assert_eq!(lifestyle.sleep_level(), 10);
    }

    #[test]
    fn preferences_accept_open_to_all_and_listed_genders() {
        let open = MatchingPreferences::new([GenderPreference::OpenToAll]);
        assert!(open.accepts(Some(Gender::NonBinary)));
        assert!(open.accepts(None));

        let narrow = MatchingPreferences::new([GenderPreference::Woman]);
        assert!(narrow.accepts(Some(Gender::Woman)));
        assert!(!narrow.accepts(Some(Gender::Man)));
        assert!(!narrow.accepts(None));
    }

    #[test]
    fn lifestyle_labels() {
        assert_eq!(sleep_label(2), "Early Bird");
        assert_eq!(sleep_label(7), "Balanced");
        assert_eq!(sleep_label(9), "Night Owl");
        assert_eq!(cleanliness_label(3), "Very Tidy");
        assert_eq!(cleanliness_label(10), "Laid Back");
        assert_eq!(SocialVibe::SocialHub.label(), "Social Hub");
    }

    #[test]
    fn unique_tags_keep_first_seen_order() {
        let ai = AiAnalysis {
            description: String::new(),
            tags: vec!["quiet".into(), "studious".into(), "quiet".into()],
        };
        assert_eq!(ai.unique_tags(), vec!["quiet", "studious"]);
    }

    #[test]
    fn swipe_action_parsing() {
        assert_eq!("Like".parse::<SwipeAction>(), Ok(SwipeAction::Like));
        assert_eq!("super-like".parse::<SwipeAction>(), Ok(SwipeAction::SuperLike));
        assert!("wink".parse::<SwipeAction>().is_err());
        assert_eq!(SwipeAction::SuperLike.recorded_in(), SetField::SuperLikes);
    }
}
