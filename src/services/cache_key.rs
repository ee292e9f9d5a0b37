use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::{Context, RecommendationRequest, UserProfile};

/// Prefix of every pattern-cache key
pub const PATTERN_NAMESPACE: &str = "rec:pattern:";

/// Pattern-cache entries live for 6 hours
pub const PATTERN_CACHE_TTL_SECONDS: u64 = 21_600;

/// Hex characters of the digest kept in the key
const DIGEST_CHARS: usize = 16;

// Field order is alphabetical so the JSON encoding is canonical.
#[derive(Serialize)]
struct CanonicalRequest {
    context: Option<CanonicalContext>,
    mode: &'static str,
    users: Vec<CanonicalUser>,
}

#[derive(Serialize)]
struct CanonicalUser {
    actors: Vec<String>,
    directors: Vec<String>,
    dislikes: Vec<String>,
    likes: Vec<String>,
    mood: Vec<String>,
    year_range: Option<(Option<i32>, Option<i32>)>,
}

#[derive(Serialize)]
struct CanonicalContext {
    energy: String,
    new: bool,
    occasion: String,
}

/// Stable fingerprint of a request's semantic content.
///
/// User order is preserved; each user's lists are trimmed, lowercased and
/// sorted. Names, dealbreakers, constraints, context familiarity and the
/// free-text message do not participate.
pub fn normalize_cache_key(request: &RecommendationRequest) -> String {
    let canonical = CanonicalRequest {
        context: request.context.as_ref().map(canonical_context),
        mode: request.mode.as_str(),
        users: request.users.iter().map(canonical_user).collect(),
    };

    // Strings, integers and booleans only; encoding cannot fail.
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());

    format!("{}{}", PATTERN_NAMESPACE, &digest[..DIGEST_CHARS])
}

fn canonical_user(user: &UserProfile) -> CanonicalUser {
    CanonicalUser {
        actors: normalized_list(&user.favorite_actors),
        directors: normalized_list(&user.favorite_directors),
        dislikes: normalized_list(&user.dislikes_genres),
        likes: normalized_list(&user.likes_genres),
        mood: normalized_list(&user.mood),
        year_range: user.year_range.as_ref().map(|range| (range.min, range.max)),
    }
}

fn canonical_context(context: &Context) -> CanonicalContext {
    let lower = |value: &Option<String>| {
        value
            .as_deref()
            .map(|v| v.trim().to_lowercase())
            .unwrap_or_default()
    };
    CanonicalContext {
        energy: lower(&context.energy),
        new: context.want_something_new,
        occasion: lower(&context.occasion),
    }
}

fn normalized_list(items: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = items.iter().map(|s| s.trim().to_lowercase()).collect();
    normalized.sort();
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Mode, YearRange};

    fn request(likes: &[&str]) -> RecommendationRequest {
        RecommendationRequest::solo(UserProfile {
            name: "Alex".to_string(),
            likes_genres: likes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn test_key_shape() {
        let key = normalize_cache_key(&request(&["Drama"]));
        assert!(key.starts_with(PATTERN_NAMESPACE));
        assert_eq!(key.len(), PATTERN_NAMESPACE.len() + 16);
        assert!(key[PATTERN_NAMESPACE.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_order_case_and_whitespace_insensitive() {
        let a = normalize_cache_key(&request(&["Drama", "Comedy"]));
        let b = normalize_cache_key(&request(&[" comedy", "DRAMA "]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_name_and_message_do_not_matter() {
        let a = request(&["Drama"]);
        let mut b = a.clone();
        b.users[0].name = "Sam".to_string();
        b.message = Some("anything".to_string());
        assert_eq!(normalize_cache_key(&a), normalize_cache_key(&b));
    }

    #[test]
    fn test_mode_changes_key() {
        let a = request(&["Drama"]);
        let mut b = a.clone();
        b.mode = Mode::Group;
        assert_ne!(normalize_cache_key(&a), normalize_cache_key(&b));
    }

    #[test]
    fn test_genres_change_key() {
        assert_ne!(
            normalize_cache_key(&request(&["Drama"])),
            normalize_cache_key(&request(&["Horror"]))
        );
    }

    #[test]
    fn test_year_range_changes_key() {
        let a = request(&["Drama"]);
        let mut b = a.clone();
        b.users[0].year_range = Some(YearRange {
            min: Some(1990),
            max: None,
        });
        assert_ne!(normalize_cache_key(&a), normalize_cache_key(&b));
    }

    #[test]
    fn test_context_changes_key() {
        let a = request(&["Drama"]);
        let mut b = a.clone();
        b.context = Some(Context {
            occasion: Some("Date Night".to_string()),
            ..Default::default()
        });
        let mut c = a.clone();
        c.context = Some(Context {
            occasion: Some("date night".to_string()),
            ..Default::default()
        });
        assert_ne!(normalize_cache_key(&a), normalize_cache_key(&b));
        assert_eq!(normalize_cache_key(&b), normalize_cache_key(&c));
    }

    #[test]
    fn test_familiarity_does_not_change_key() {
        let mut a = request(&["Drama"]);
        a.context = Some(Context {
            energy: Some("low".to_string()),
            ..Default::default()
        });
        let mut b = a.clone();
        if let Some(context) = b.context.as_mut() {
            context.familiarity = Some("rewatch favorites".to_string());
        }
        assert_eq!(normalize_cache_key(&a), normalize_cache_key(&b));
    }

    #[test]
    fn test_user_order_matters() {
        let alex = UserProfile {
            likes_genres: vec!["Drama".to_string()],
            ..UserProfile::named("Alex")
        };
        let sam = UserProfile {
            likes_genres: vec!["Horror".to_string()],
            ..UserProfile::named("Sam")
        };
        let a = RecommendationRequest::group(vec![alex.clone(), sam.clone()]);
        let b = RecommendationRequest::group(vec![sam, alex]);
        assert_ne!(normalize_cache_key(&a), normalize_cache_key(&b));
    }
}
