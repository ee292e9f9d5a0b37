use std::fmt::Write as _;

use crate::{
    error::AppResult,
    models::{CandidatePool, Mode, RecommendationRequest, SessionState, TmdbId},
};

/// Stable system prompt, sent with a cache-control hint
pub const SYSTEM_PROMPT: &str = include_str!("../../prompts/system.md");

/// Number of additional picks the model is asked for
pub const ADDITIONAL_PICKS: usize = 5;

const RULES: &str = "IMPORTANT RULES:
- You MUST ONLY recommend movies from the numbered list above.
- Reference movies by their TMDB ID.
- Do NOT recommend any movie not in this list.";

const RESPONSE_FORMAT: &str = r#"Respond in this exact JSON format:
{
  "best_pick": {
    "tmdb_id": <int>,
    "rationale": "<2-3 bullet reasons>",
    "match_score": <1-10>
  },
  "additional_picks": [
    {
      "tmdb_id": <int>,
      "rationale": "<one-line reason>",
      "match_score": <1-10>
    }
  ],
  "narrow_question": "<one question to help narrow down further>",
  "overlap_summary": "<only for group mode: describe what the group shares>"
}"#;

/// First-turn prompt: closed-world candidate list, request, rules and the
/// response shape.
pub fn build_prompt(pool: &CandidatePool, request: &RecommendationRequest) -> AppResult<String> {
    let preferences = serde_json::to_string_pretty(request)?;

    let mut prompt = format!(
        "Here are {} verified movies to consider:\n\n{}\n\n{}\n\nUser request:\n{}",
        pool.len(),
        candidate_listing(pool),
        audience_line(request),
        preferences
    );
    push_dealbreakers(&mut prompt, &request.dealbreakers())?;
    push_closing(&mut prompt);

    Ok(prompt)
}

/// Feedback gathered for a refine turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefineContext<'a> {
    pub feedback: &'a str,
    pub keep_ids: &'a [TmdbId],
    pub reject_ids: &'a [TmdbId],
}

/// Refine-turn prompt: condensed session context instead of conversation
/// history, over the reduced candidate list.
pub fn build_refine_prompt(
    pool: &CandidatePool,
    session: &SessionState,
    refine: &RefineContext<'_>,
) -> AppResult<String> {
    let preferences = serde_json::to_string(&session.preferences)?;
    let liked: Vec<TmdbId> = session
        .reactions
        .iter()
        .filter(|r| r.positive)
        .map(|r| r.tmdb_id)
        .collect();
    let passed: Vec<TmdbId> = session
        .reactions
        .iter()
        .filter(|r| !r.positive)
        .map(|r| r.tmdb_id)
        .collect();

    let mut prompt = format!(
        "Here are {} verified movies still in play:\n\n{}\n\nPrevious session context:\n\
         - User preferences: {}\n\
         - Movies already suggested: {:?}\n\
         - Reactions so far: liked {:?}, passed {:?}\n\
         - User kept (liked): {:?}\n\
         - User rejected: {:?}\n\
         - Current feedback: {}\n\n\
         Provide refined recommendations from the list above. Prefer movies not already suggested unless the user kept them.",
        pool.len(),
        candidate_listing(pool),
        preferences,
        session.presented_ids,
        liked,
        passed,
        refine.keep_ids,
        refine.reject_ids,
        refine.feedback
    );
    push_dealbreakers(&mut prompt, &session.preferences.dealbreakers())?;
    push_closing(&mut prompt);

    Ok(prompt)
}

fn candidate_listing(pool: &CandidatePool) -> String {
    pool.iter()
        .enumerate()
        .map(|(i, candidate)| format!("  {}. {}", i + 1, candidate.to_prompt_line()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn audience_line(request: &RecommendationRequest) -> String {
    match request.mode {
        Mode::Solo => "Audience: one viewer.".to_string(),
        Mode::Group => format!(
            "Audience: a group of {} ({}). Pick movies the whole group can enjoy and fill in overlap_summary.",
            request.users.len(),
            request.member_names().join(", ")
        ),
    }
}

fn push_dealbreakers(prompt: &mut String, dealbreakers: &[String]) -> AppResult<()> {
    if dealbreakers.is_empty() {
        return Ok(());
    }
    let items = dealbreakers
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    // Writing to a String cannot fail
    let _ = write!(
        prompt,
        "\n\nDEALBREAKERS (Save me from...): [{}]\nAVOID any movie that matches these dealbreakers.",
        items
    );
    Ok(())
}

fn push_closing(prompt: &mut String) {
    let _ = write!(
        prompt,
        "\n\n{}\n\n{}\n\nReturn {} additional picks. Be concise. No spoilers.",
        RULES, RESPONSE_FORMAT, ADDITIONAL_PICKS
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovieCandidate, UserProfile};

    fn candidate(tmdb_id: TmdbId, title: &str) -> MovieCandidate {
        MovieCandidate {
            tmdb_id,
            title: title.to_string(),
            overview: "Plot".to_string(),
            release_date: Some("2010-07-16".to_string()),
            genres: vec!["Science Fiction".to_string()],
            genre_ids: vec![878],
            vote_average: 8.4,
            vote_count: 30000,
            popularity: 80.0,
            runtime: Some(148),
            poster_path: None,
            backdrop_path: None,
            original_language: "en".to_string(),
            director_names: vec!["Christopher Nolan".to_string()],
            cast_names: vec!["Leonardo DiCaprio".to_string()],
        }
    }

    fn pool() -> CandidatePool {
        CandidatePool::new(vec![candidate(27205, "Inception"), candidate(157336, "Interstellar")])
            .unwrap()
    }

    #[test]
    fn test_system_prompt_loaded() {
        assert!(SYSTEM_PROMPT.contains("ONLY"));
    }

    #[test]
    fn test_prompt_lists_candidates_in_order() {
        let request = RecommendationRequest::solo(UserProfile::named("Alex"));
        let prompt = build_prompt(&pool(), &request).unwrap();

        assert!(prompt.starts_with("Here are 2 verified movies to consider:"));
        let first = prompt.find("1. [TMDB ID: 27205] Inception (2010)").unwrap();
        let second = prompt.find("2. [TMDB ID: 157336] Interstellar").unwrap();
        assert!(first < second);
        assert!(prompt.contains("You MUST ONLY recommend movies from the numbered list above."));
        assert!(prompt.contains("\"best_pick\""));
        assert!(prompt.contains("Return 5 additional picks."));
    }

    #[test]
    fn test_prompt_omits_nulls() {
        let request = RecommendationRequest::solo(UserProfile::named("Alex"));
        let prompt = build_prompt(&pool(), &request).unwrap();
        assert!(!prompt.contains("null"));
        assert!(prompt.contains("\"name\": \"Alex\""));
    }

    #[test]
    fn test_dealbreaker_block_merged() {
        let request = RecommendationRequest::group(vec![
            UserProfile {
                dealbreakers: vec!["Gore".to_string(), "sad endings".to_string()],
                ..UserProfile::named("A")
            },
            UserProfile {
                dealbreakers: vec!["gore ".to_string(), "subtitles".to_string()],
                ..UserProfile::named("B")
            },
        ]);
        let prompt = build_prompt(&pool(), &request).unwrap();
        assert!(prompt.contains(
            r#"DEALBREAKERS (Save me from...): ["Gore", "sad endings", "subtitles"]"#
        ));
        assert!(prompt.contains("AVOID any movie that matches these dealbreakers."));
    }

    #[test]
    fn test_no_dealbreaker_block_without_dealbreakers() {
        let request = RecommendationRequest::solo(UserProfile::named("Alex"));
        let prompt = build_prompt(&pool(), &request).unwrap();
        assert!(!prompt.contains("DEALBREAKERS"));
    }

    #[test]
    fn test_group_framing() {
        let request = RecommendationRequest::group(vec![
            UserProfile::named("Alex"),
            UserProfile::named("Sam"),
        ]);
        let prompt = build_prompt(&pool(), &request).unwrap();
        assert!(prompt.contains("Audience: a group of 2 (Alex, Sam)."));
    }

    #[test]
    fn test_refine_prompt_condensed_context() {
        let mut session = SessionState::new(
            "s".to_string(),
            RecommendationRequest::solo(UserProfile::named("Alex")),
            vec![27205, 157336, 1],
            "claude-haiku-4-5-20250514".to_string(),
        );
        session.extend_presented([27205, 1]);
        session.record_reaction(1, false, None);

        let refine = RefineContext {
            feedback: "something lighter",
            keep_ids: &[27205],
            reject_ids: &[1],
        };
        let prompt = build_refine_prompt(&pool(), &session, &refine).unwrap();

        assert!(prompt.contains("- Movies already suggested: [27205, 1]"));
        assert!(prompt.contains("- User kept (liked): [27205]"));
        assert!(prompt.contains("- User rejected: [1]"));
        assert!(prompt.contains("passed [1]"));
        assert!(prompt.contains("- Current feedback: something lighter"));
        assert!(prompt.contains("[TMDB ID: 157336]"));
        assert!(prompt.contains("Respond in this exact JSON format:"));
    }
}
