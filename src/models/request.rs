use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Whether the recommendation is for one viewer or a group.
///
/// Only affects prompt framing and complexity weighting, never validation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Solo,
    Group,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Solo => "solo",
            Mode::Group => "group",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runtime_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitles_ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_services: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_friendly: Option<bool>,
}

impl Constraints {
    /// Number of constraint fields that actually constrain something
    pub fn active_count(&self) -> usize {
        [
            self.max_runtime_min.is_some(),
            self.subtitles_ok.is_some(),
            self.streaming_services
                .as_ref()
                .is_some_and(|services| !services.is_empty()),
            self.family_friendly.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

/// One viewer's stated taste
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    #[serde(default)]
    pub likes_genres: Vec<String>,
    #[serde(default)]
    pub dislikes_genres: Vec<String>,
    #[serde(default)]
    pub favorite_actors: Vec<String>,
    #[serde(default)]
    pub favorite_directors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_range: Option<YearRange>,
    #[serde(default)]
    pub mood: Vec<String>,
    /// "Save me from..." items the picks must avoid
    #[serde(default)]
    pub dealbreakers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
}

impl UserProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occasion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<String>,
    #[serde(default)]
    pub want_something_new: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub familiarity: Option<String>,
}

impl Context {
    pub fn active_count(&self) -> usize {
        [
            self.occasion.is_some(),
            self.energy.is_some(),
            self.familiarity.is_some(),
            self.want_something_new,
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

/// Top-level recommendation request
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationRequest {
    #[serde(default)]
    pub mode: Mode,
    pub users: Vec<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecommendationRequest {
    pub fn solo(user: UserProfile) -> Self {
        Self {
            mode: Mode::Solo,
            users: vec![user],
            ..Default::default()
        }
    }

    pub fn group(users: Vec<UserProfile>) -> Self {
        Self {
            mode: Mode::Group,
            users,
            ..Default::default()
        }
    }

    /// Rejects requests the rest of the pipeline cannot serve
    pub fn validate(&self) -> AppResult<()> {
        if self.users.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one user profile is required".to_string(),
            ));
        }
        Ok(())
    }

    /// The first user; their year range and constraints drive candidate sourcing
    pub fn primary_user(&self) -> Option<&UserProfile> {
        self.users.first()
    }

    pub fn liked_genres(&self) -> Vec<String> {
        self.users
            .iter()
            .flat_map(|u| u.likes_genres.iter().cloned())
            .collect()
    }

    pub fn disliked_genres(&self) -> Vec<String> {
        self.users
            .iter()
            .flat_map(|u| u.dislikes_genres.iter().cloned())
            .collect()
    }

    /// Dealbreakers across all users, de-duplicated case-insensitively,
    /// first spelling wins
    pub fn dealbreakers(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.users
            .iter()
            .flat_map(|u| u.dealbreakers.iter())
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
            .filter(|d| seen.insert(d.to_lowercase()))
            .map(str::to_string)
            .collect()
    }

    pub fn member_names(&self) -> Vec<String> {
        self.users.iter().map(|u| u.name.clone()).collect()
    }
}
