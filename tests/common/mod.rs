//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use roomie_match::{
    AiAnalysis, ErrorReporter, Gender, GenderPreference, Lifestyle, MatchError,
    MatchingPreferences, SocialVibe, UserProfile,
};

pub const DEMO_PROFILES: &[u8] = include_bytes!("../../demos/profiles.json");

/// Build a profile with the fields scoring and filtering look at.
pub fn profile(
    id: &str,
    gender: Gender,
    prefs: &[GenderPreference],
    sleep: u8,
    cleanliness: u8,
    vibe: &str,
    tags: &[&str],
) -> UserProfile {
    UserProfile {
        name: id.to_uppercase(),
        gender: Some(gender),
        matching_preferences: Some(MatchingPreferences::new(prefs.iter().copied())),
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
        ..UserProfile::new(id)
    }
}

/// Collects every reported error.
#[derive(Default)]
pub struct CollectingReporter {
    errors: Mutex<Vec<MatchError>>,
}

impl CollectingReporter {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<MatchError> {
        self.errors.lock().unwrap().clone()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, error: &MatchError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}
