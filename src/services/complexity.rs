use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::RecommendationRequest;

/// Complexity classification that decides which model is invoked
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Simple,
    Moderate,
    Complex,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Simple => "simple",
            Tier::Moderate => "moderate",
            Tier::Complex => "complex",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field weights and tier thresholds.
///
/// Product tuning constants; retune here, not in the scorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexityWeights {
    pub per_extra_user: u32,
    pub large_group_size: usize,
    pub large_group_bonus: u32,
    pub per_genre_conflict: u32,
    pub per_constraint: u32,
    /// Trimmed message length that must be exceeded to count
    pub long_message_chars: usize,
    pub long_message: u32,
    pub per_context_field: u32,
    pub moderate_threshold: u32,
    pub complex_threshold: u32,
}

impl Default for ComplexityWeights {
    fn default() -> Self {
        Self {
            per_extra_user: 2,
            large_group_size: 5,
            large_group_bonus: 2,
            per_genre_conflict: 1,
            per_constraint: 1,
            long_message_chars: 20,
            long_message: 1,
            per_context_field: 1,
            moderate_threshold: 3,
            complex_threshold: 6,
        }
    }
}

impl ComplexityWeights {
    pub fn tier_for(&self, score: u32) -> Tier {
        if score >= self.complex_threshold {
            Tier::Complex
        } else if score >= self.moderate_threshold {
            Tier::Moderate
        } else {
            Tier::Simple
        }
    }
}

/// Tier → model identifier routing table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTable {
    pub simple: String,
    pub moderate: String,
    pub complex: String,
}

impl Default for ModelTable {
    fn default() -> Self {
        Self {
            simple: "claude-haiku-4-5-20250514".to_string(),
            moderate: "claude-sonnet-4-5-20250929".to_string(),
            complex: "claude-opus-4-6".to_string(),
        }
    }
}

impl ModelTable {
    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Simple => &self.simple,
            Tier::Moderate => &self.moderate,
            Tier::Complex => &self.complex,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplexityScore {
    pub score: u32,
    pub tier: Tier,
    pub model: String,
    pub reasons: Vec<String>,
}

/// Deterministic request → (score, tier, model) mapping. No I/O.
#[derive(Debug, Clone, Default)]
pub struct ComplexityScorer {
    weights: ComplexityWeights,
    models: ModelTable,
}

impl ComplexityScorer {
    pub fn new(weights: ComplexityWeights, models: ModelTable) -> Self {
        Self { weights, models }
    }

    pub fn models(&self) -> &ModelTable {
        &self.models
    }

    pub fn score(&self, request: &RecommendationRequest) -> ComplexityScore {
        let w = &self.weights;
        let mut score = 0u32;
        let mut reasons = Vec::new();
        let num_users = request.users.len();

        if num_users > 1 {
            let extra = (num_users as u32 - 1) * w.per_extra_user;
            score += extra;
            reasons.push(format!("{} users (+{})", num_users, extra));
        }

        if num_users >= w.large_group_size {
            score += w.large_group_bonus;
            reasons.push(format!(
                "large group {}+ (+{})",
                w.large_group_size, w.large_group_bonus
            ));
        }

        let conflicts = genre_conflicts(request);
        if !conflicts.is_empty() {
            let added = conflicts.len() as u32 * w.per_genre_conflict;
            score += added;
            reasons.push(format!(
                "{} genre conflicts: {} (+{})",
                conflicts.len(),
                conflicts.into_iter().collect::<Vec<_>>().join(", "),
                added
            ));
        }

        let constraint_count = request
            .primary_user()
            .and_then(|user| user.constraints.as_ref())
            .map(|c| c.active_count())
            .unwrap_or(0);
        if constraint_count > 0 {
            let added = constraint_count as u32 * w.per_constraint;
            score += added;
            reasons.push(format!("{} constraints (+{})", constraint_count, added));
        }

        let long_message = request
            .message
            .as_deref()
            .is_some_and(|m| m.trim().chars().count() > w.long_message_chars);
        if long_message {
            score += w.long_message;
            reasons.push(format!("free-text message (+{})", w.long_message));
        }

        let context_count = request
            .context
            .as_ref()
            .map(|c| c.active_count())
            .unwrap_or(0);
        if context_count > 0 {
            let added = context_count as u32 * w.per_context_field;
            score += added;
            reasons.push(format!("{} context fields (+{})", context_count, added));
        }

        let tier = w.tier_for(score);
        ComplexityScore {
            score,
            tier,
            model: self.models.model_for(tier).to_string(),
            reasons,
        }
    }
}

/// Genres liked by one user and disliked by a different user, normalized
fn genre_conflicts(request: &RecommendationRequest) -> BTreeSet<String> {
    let normalize = |g: &String| g.trim().to_lowercase();
    let mut conflicts = BTreeSet::new();

    for (i, liker) in request.users.iter().enumerate() {
        for liked in liker.likes_genres.iter().map(normalize) {
            if liked.is_empty() || conflicts.contains(&liked) {
                continue;
            }
            let disliked_elsewhere = request
                .users
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .any(|(_, other)| other.dislikes_genres.iter().map(normalize).any(|d| d == liked));
            if disliked_elsewhere {
                conflicts.insert(liked);
            }
        }
    }
    conflicts
}
