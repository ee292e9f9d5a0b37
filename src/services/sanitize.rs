use std::sync::LazyLock;

use regex::Regex;

use crate::models::{RecommendationRequest, UserProfile};

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const MAX_NAME_CHARS: usize = 50;
pub const MAX_DEALBREAKER_CHARS: usize = 100;
pub const MAX_DEALBREAKERS: usize = 20;
pub const MAX_GENRE_CHARS: usize = 50;
pub const MAX_GENRES: usize = 30;
/// Actors, directors, moods and context strings
pub const MAX_TAG_CHARS: usize = 100;

/// Replaces every matched injection span
pub const REDACTION: &str = "[filtered]";

/// A compiled prompt-injection signature
struct InjectionPattern {
    name: &'static str,
    regex: &'static LazyLock<Option<Regex>>,
}

macro_rules! injection_pattern {
    ($name:ident, $regex_str:expr) => {
        static $name: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new($regex_str).ok());
    };
}

injection_pattern!(RE_ROLE_TAG, r"(?i)<\s*/?\s*(system|assistant|human)\s*>");
injection_pattern!(RE_INSTRUCTION_TAG, r"(?i)<\s*/?\s*(instructions?|rules?|prompt)\s*>");
injection_pattern!(
    RE_IGNORE_PREVIOUS,
    r"(?i)(?:ignore|disregard|forget|override)\s+(?:all\s+)?(?:previous|above|prior)\s+(?:instructions?|rules?|prompts?)"
);
injection_pattern!(RE_ROLE_REASSIGN, r"(?i)you\s+are\s+now\s+(?:a|an|my)\s+");
injection_pattern!(
    RE_NEW_SYSTEM_PROMPT,
    r"(?i)new\s+(?:system\s+)?(?:prompt|instructions?|rules?):"
);

static PATTERNS: [InjectionPattern; 5] = [
    InjectionPattern {
        name: "role_tag",
        regex: &RE_ROLE_TAG,
    },
    InjectionPattern {
        name: "instruction_tag",
        regex: &RE_INSTRUCTION_TAG,
    },
    InjectionPattern {
        name: "ignore_previous",
        regex: &RE_IGNORE_PREVIOUS,
    },
    InjectionPattern {
        name: "role_reassignment",
        regex: &RE_ROLE_REASSIGN,
    },
    InjectionPattern {
        name: "new_system_prompt",
        regex: &RE_NEW_SYSTEM_PROMPT,
    },
];

/// Sanitized value plus the signatures that were neutralised in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized<T> {
    pub value: T,
    pub redactions: Vec<&'static str>,
}

impl<T> Sanitized<T> {
    pub fn is_clean(&self) -> bool {
        self.redactions.is_empty()
    }
}

/// Neutralises injection signatures in free text.
///
/// Truncates to [`MAX_MESSAGE_CHARS`] first. Text with no signature under the
/// cap is returned unchanged; whitespace is never touched.
pub fn sanitize_user_message(text: &str) -> Sanitized<String> {
    redact(truncate_chars(text, MAX_MESSAGE_CHARS))
}

pub fn sanitize_name(name: &str) -> Sanitized<String> {
    let mut cleaned = redact(truncate_chars(name, MAX_NAME_CHARS).trim());
    cleaned.value = cleaned.value.trim().to_string();
    cleaned
}

/// Keeps at most [`MAX_DEALBREAKERS`] items, each bounded and trimmed;
/// items that end up empty are dropped.
pub fn sanitize_dealbreakers(items: &[String]) -> Sanitized<Vec<String>> {
    sanitize_list(items, MAX_DEALBREAKERS, MAX_DEALBREAKER_CHARS)
}

/// Keeps ASCII letters, digits, whitespace and hyphens; entries that end up
/// empty are dropped.
pub fn sanitize_genres(genres: &[String]) -> Vec<String> {
    genres
        .iter()
        .take(MAX_GENRES)
        .map(|g| {
            truncate_chars(g, MAX_GENRE_CHARS)
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-')
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|g| !g.is_empty())
        .collect()
}

/// Runs every free-text field of a request through the sanitizers.
///
/// Injection events are logged here; the request is never rejected.
pub fn sanitize_request(request: &RecommendationRequest) -> Sanitized<RecommendationRequest> {
    let mut redactions = Vec::new();

    let mut sanitized = request.clone();
    sanitized.message = request
        .message
        .as_deref()
        .map(|m| absorb(sanitize_user_message(m), &mut redactions));

    if let Some(context) = sanitized.context.as_mut() {
        for field in [
            &mut context.occasion,
            &mut context.energy,
            &mut context.familiarity,
        ] {
            if let Some(value) = field.take() {
                let cleaned = redact(truncate_chars(&value, MAX_TAG_CHARS));
                *field = Some(absorb(cleaned, &mut redactions));
            }
        }
    }

    sanitized.users = request
        .users
        .iter()
        .map(|user| UserProfile {
            name: absorb(sanitize_name(&user.name), &mut redactions),
            likes_genres: sanitize_genres(&user.likes_genres),
            dislikes_genres: sanitize_genres(&user.dislikes_genres),
            favorite_actors: absorb(
                sanitize_list(&user.favorite_actors, MAX_GENRES, MAX_TAG_CHARS),
                &mut redactions,
            ),
            favorite_directors: absorb(
                sanitize_list(&user.favorite_directors, MAX_GENRES, MAX_TAG_CHARS),
                &mut redactions,
            ),
            year_range: user.year_range.clone(),
            mood: absorb(
                sanitize_list(&user.mood, MAX_GENRES, MAX_TAG_CHARS),
                &mut redactions,
            ),
            dealbreakers: absorb(sanitize_dealbreakers(&user.dealbreakers), &mut redactions),
            constraints: user.constraints.clone(),
        })
        .collect();

    Sanitized {
        value: sanitized,
        redactions,
    }
}

fn absorb<T>(cleaned: Sanitized<T>, redactions: &mut Vec<&'static str>) -> T {
    redactions.extend(cleaned.redactions);
    cleaned.value
}

fn sanitize_list(items: &[String], max_items: usize, max_chars: usize) -> Sanitized<Vec<String>> {
    let mut redactions = Vec::new();
    let value = items
        .iter()
        .take(max_items)
        .map(|item| {
            let cleaned = redact(truncate_chars(item, max_chars));
            redactions.extend(cleaned.redactions);
            cleaned.value.trim().to_string()
        })
        .filter(|item| !item.is_empty())
        .collect();

    Sanitized { value, redactions }
}

fn redact(text: &str) -> Sanitized<String> {
    let mut cleaned = text.to_string();
    let mut redactions = Vec::new();

    for pattern in &PATTERNS {
        let Some(regex) = pattern.regex.as_ref() else {
            continue;
        };
        if regex.is_match(&cleaned) {
            let preview: String = cleaned.chars().take(80).collect();
            tracing::warn!(
                pattern = pattern.name,
                input_preview = %preview,
                "Prompt injection neutralised"
            );
            cleaned = regex.replace_all(&cleaned, REDACTION).into_owned();
            redactions.push(pattern.name);
        }
    }

    Sanitized {
        value: cleaned,
        redactions,
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
