use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RecommendationRequest, TmdbId};
use crate::services::complexity::{ComplexityScore, Tier};

/// A thumbs-up/down on one presented movie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reaction {
    pub tmdb_id: TmdbId,
    pub positive: bool,
    pub reason: Option<String>,
    pub reacted_at: DateTime<Utc>,
}

/// Token accounting reported by the model provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn accumulate(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_creation_input_tokens += other.cache_creation_input_tokens;
        self.cache_read_input_tokens += other.cache_read_input_tokens;
    }
}

/// Multi-turn state of one recommendation session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub session_id: String,
    /// Sanitized request that opened the session
    pub preferences: RecommendationRequest,
    /// Every candidate offered to the model on the first turn
    pub candidate_ids: Vec<TmdbId>,
    /// Everything shown to the user so far, across all turns
    pub presented_ids: Vec<TmdbId>,
    pub reactions: Vec<Reaction>,
    pub final_selection: Option<TmdbId>,
    pub turn_count: u32,
    /// Routed model identifier (never the " (fallback)" display form)
    pub model_used: String,
    pub token_usage: TokenUsage,
    pub complexity: Option<ComplexityScore>,
    pub from_cache: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(
        session_id: String,
        preferences: RecommendationRequest,
        candidate_ids: Vec<TmdbId>,
        model_used: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            preferences,
            candidate_ids,
            presented_ids: Vec::new(),
            reactions: Vec::new(),
            final_selection: None,
            turn_count: 1,
            model_used,
            token_usage: TokenUsage::default(),
            complexity: None,
            from_cache: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_reaction(&mut self, tmdb_id: TmdbId, positive: bool, reason: Option<String>) {
        self.reactions.push(Reaction {
            tmdb_id,
            positive,
            reason,
            reacted_at: Utc::now(),
        });
        self.touch();
    }

    /// Sets the final selection, returning the one it replaced
    pub fn select(&mut self, tmdb_id: TmdbId) -> Option<TmdbId> {
        self.touch();
        self.final_selection.replace(tmdb_id)
    }

    /// Appends to the presented history; earlier turns are kept
    pub fn extend_presented(&mut self, ids: impl IntoIterator<Item = TmdbId>) {
        self.presented_ids.extend(ids);
        self.touch();
    }

    /// Closes a refine turn
    pub fn advance_turn(&mut self, usage: TokenUsage) {
        self.turn_count += 1;
        self.token_usage.accumulate(usage);
        self.touch();
    }

    pub fn receipt(&self) -> Receipt {
        let mut considered = self.presented_ids.clone();
        considered.sort_unstable();
        considered.dedup();

        let members = self.preferences.member_names();
        let liked = self.reactions.iter().filter(|r| r.positive).count();
        let passed = self.reactions.len() - liked;

        let who = if members.is_empty() {
            "Someone".to_string()
        } else {
            members.join(", ")
        };
        let shareable_text = match self.final_selection {
            Some(_) => format!(
                "{} found tonight's movie in {} turn(s) after weighing {} picks.",
                who,
                self.turn_count,
                considered.len()
            ),
            None => format!(
                "{} weighed {} picks over {} turn(s) and is still deciding.",
                who,
                considered.len(),
                self.turn_count
            ),
        };

        Receipt {
            session_id: self.session_id.clone(),
            mode: self.preferences.mode.as_str().to_string(),
            members,
            movies_considered: considered.len(),
            movies_liked: liked,
            movies_passed: passed,
            final_pick_tmdb_id: self.final_selection,
            complexity_tier: self.complexity.as_ref().map(|c| c.tier),
            turn_count: self.turn_count,
            shareable_text,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Shareable summary of a finished (or ongoing) session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub session_id: String,
    pub mode: String,
    pub members: Vec<String>,
    pub movies_considered: usize,
    pub movies_liked: usize,
    pub movies_passed: usize,
    pub final_pick_tmdb_id: Option<TmdbId>,
    pub complexity_tier: Option<Tier>,
    pub turn_count: u32,
    pub shareable_text: String,
}
