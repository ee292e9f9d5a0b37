use serde::{Deserialize, Serialize};

/// TMDB movie identifier, the primary key of every candidate
pub type TmdbId = u64;

/// Characters of plot overview included in a prompt line
const PROMPT_OVERVIEW_CHARS: usize = 200;

/// A fully enriched, provider-agnostic movie eligible for recommendation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieCandidate {
    pub tmdb_id: TmdbId,
    pub title: String,
    pub overview: String,
    pub release_date: Option<String>,
    pub genres: Vec<String>,
    pub genre_ids: Vec<u32>,
    pub vote_average: f64,
    pub vote_count: u64,
    pub popularity: f64,
    pub runtime: Option<u32>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub original_language: String,
    pub director_names: Vec<String>,
    pub cast_names: Vec<String>,
}

impl MovieCandidate {
    /// Release year, taken from the first four characters of the release date
    pub fn year(&self) -> Option<&str> {
        self.release_date.as_deref().and_then(|date| date.get(..4))
    }

    /// One numbered-list line of the closed-world candidate listing
    pub fn to_prompt_line(&self) -> String {
        let directors = if self.director_names.is_empty() {
            "Unknown".to_string()
        } else {
            self.director_names.join(", ")
        };
        let runtime = self
            .runtime
            .map(|minutes| format!("{} min", minutes))
            .unwrap_or_else(|| "Unknown".to_string());
        let cast: Vec<&str> = self.cast_names.iter().take(5).map(String::as_str).collect();
        let plot: String = self.overview.chars().take(PROMPT_OVERVIEW_CHARS).collect();

        format!(
            "[TMDB ID: {}] {} ({}) | Genres: {} | Rating: {}/10 | Runtime: {} | Director: {} | Cast: {} | Plot: {}",
            self.tmdb_id,
            self.title,
            self.year().unwrap_or("Unknown"),
            self.genres.join(", "),
            self.vote_average,
            runtime,
            directors,
            cast.join(", "),
            plot
        )
    }
}

/// The closed set of candidates a model response is validated against.
///
/// Never empty: a pool can only be built from at least one candidate, which
/// lets the validator always produce a best pick.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePool {
    candidates: Vec<MovieCandidate>,
}

impl CandidatePool {
    /// Builds a pool, dropping repeated IDs (first occurrence wins).
    /// Returns `None` when no candidates remain.
    pub fn new(candidates: Vec<MovieCandidate>) -> Option<Self> {
        let mut seen = std::collections::HashSet::new();
        let candidates: Vec<MovieCandidate> = candidates
            .into_iter()
            .filter(|c| seen.insert(c.tmdb_id))
            .collect();

        if candidates.is_empty() {
            None
        } else {
            Some(Self { candidates })
        }
    }

    pub fn first(&self) -> &MovieCandidate {
        &self.candidates[0]
    }

    pub fn get(&self, tmdb_id: TmdbId) -> Option<&MovieCandidate> {
        self.candidates.iter().find(|c| c.tmdb_id == tmdb_id)
    }

    pub fn contains(&self, tmdb_id: TmdbId) -> bool {
        self.get(tmdb_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovieCandidate> {
        self.candidates.iter()
    }

    pub fn ids(&self) -> Vec<TmdbId> {
        self.candidates.iter().map(|c| c.tmdb_id).collect()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn as_slice(&self) -> &[MovieCandidate] {
        &self.candidates
    }
}

/// A candidate as presented to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieSummary {
    pub tmdb_id: TmdbId,
    pub title: String,
    pub year: Option<String>,
    pub genres: Vec<String>,
    pub vote_average: f64,
    pub runtime: Option<u32>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub overview: String,
    pub directors: Vec<String>,
    pub cast: Vec<String>,
    pub match_score: Option<f64>,
    pub rationale: String,
}

impl MovieSummary {
    pub fn from_candidate(
        candidate: &MovieCandidate,
        image_base_url: &str,
        match_score: Option<f64>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            tmdb_id: candidate.tmdb_id,
            title: candidate.title.clone(),
            year: candidate.year().map(str::to_string),
            genres: candidate.genres.clone(),
            vote_average: candidate.vote_average,
            runtime: candidate.runtime,
            poster_url: candidate
                .poster_path
                .as_ref()
                .map(|path| format!("{}/w500{}", image_base_url, path)),
            backdrop_url: candidate
                .backdrop_path
                .as_ref()
                .map(|path| format!("{}/w1280{}", image_base_url, path)),
            overview: candidate.overview.clone(),
            directors: candidate.director_names.clone(),
            cast: candidate.cast_names.iter().take(5).cloned().collect(),
            match_score,
            rationale: rationale.into(),
        }
    }
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// Movie stub as returned by /discover/movie and /trending/movie/{window}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TmdbMovie {
    pub id: TmdbId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default)]
    pub vote_average: f64,
}

/// Paged list envelope used by discover/trending/search
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPage {
    #[serde(default)]
    pub results: Vec<TmdbMovie>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TmdbGenre {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TmdbCastMember {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TmdbCrewMember {
    pub name: String,
    #[serde(default)]
    pub job: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
    #[serde(default)]
    pub crew: Vec<TmdbCrewMember>,
}

/// GET /movie/{id}?append_to_response=credits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TmdbMovieDetails {
    pub id: TmdbId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub credits: TmdbCredits,
}

impl From<TmdbMovieDetails> for MovieCandidate {
    fn from(details: TmdbMovieDetails) -> Self {
        let director_names = details
            .credits
            .crew
            .iter()
            .filter(|member| member.job.as_deref() == Some("Director"))
            .map(|member| member.name.clone())
            .collect();
        let cast_names = details
            .credits
            .cast
            .iter()
            .take(10)
            .map(|member| member.name.clone())
            .collect();

        MovieCandidate {
            tmdb_id: details.id,
            title: details.title,
            overview: details.overview.unwrap_or_default(),
            // TMDB reports unknown dates as ""
            release_date: details.release_date.filter(|date| !date.is_empty()),
            genre_ids: details.genres.iter().map(|g| g.id).collect(),
            genres: details.genres.into_iter().map(|g| g.name).collect(),
            vote_average: details.vote_average,
            vote_count: details.vote_count,
            popularity: details.popularity,
            runtime: details.runtime.filter(|minutes| *minutes > 0),
            poster_path: details.poster_path,
            backdrop_path: details.backdrop_path,
            original_language: details
                .original_language
                .unwrap_or_else(|| "en".to_string()),
            director_names,
            cast_names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(tmdb_id: TmdbId, title: &str) -> MovieCandidate {
        MovieCandidate {
            tmdb_id,
            title: title.to_string(),
            overview: "x".repeat(300),
            release_date: Some("1999-10-15".to_string()),
            genres: vec!["Drama".to_string()],
            genre_ids: vec![18],
            vote_average: 8.4,
            vote_count: 25000,
            popularity: 60.0,
            runtime: Some(139),
            poster_path: Some("/poster.jpg".to_string()),
            backdrop_path: None,
            original_language: "en".to_string(),
            director_names: vec!["David Fincher".to_string()],
            cast_names: (1..=8).map(|i| format!("Actor {}", i)).collect(),
        }
    }

    #[test]
    fn test_prompt_line_contents() {
        let line = candidate(550, "Fight Club").to_prompt_line();
        assert!(line.starts_with("[TMDB ID: 550] Fight Club (1999)"));
        assert!(line.contains("Rating: 8.4/10"));
        assert!(line.contains("Runtime: 139 min"));
        assert!(line.contains("Director: David Fincher"));
        assert!(line.contains("Actor 5"));
        assert!(!line.contains("Actor 6"));
        assert!(line.ends_with(&"x".repeat(200)));
    }

    #[test]
    fn test_prompt_line_unknowns() {
        let mut movie = candidate(1, "Mystery");
        movie.release_date = None;
        movie.runtime = None;
        movie.director_names.clear();
        let line = movie.to_prompt_line();
        assert!(line.contains("(Unknown)"));
        assert!(line.contains("Runtime: Unknown"));
        assert!(line.contains("Director: Unknown"));
    }

    #[test]
    fn test_pool_rejects_empty_and_dedups() {
        assert!(CandidatePool::new(vec![]).is_none());

        let pool =
            CandidatePool::new(vec![candidate(1, "A"), candidate(2, "B"), candidate(1, "C")])
                .unwrap();
        assert_eq!(pool.ids(), vec![1, 2]);
        assert_eq!(pool.get(1).unwrap().title, "A");
        assert!(!pool.contains(3));
    }

    #[test]
    fn test_summary_image_urls_and_cast_cap() {
        let summary = MovieSummary::from_candidate(
            &candidate(550, "Fight Club"),
            "https://image.tmdb.org/t/p",
            Some(9.0),
            "Great",
        );
        assert_eq!(
            summary.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/poster.jpg")
        );
        assert_eq!(summary.backdrop_url, None);
        assert_eq!(summary.year.as_deref(), Some("1999"));
        assert_eq!(summary.cast.len(), 5);
    }

    #[test]
    fn test_details_to_candidate() {
        let json = r#"{
            "id": 550,
            "title": "Fight Club",
            "overview": "An insomniac office worker...",
            "release_date": "",
            "genres": [{"id": 18, "name": "Drama"}],
            "vote_average": 8.4,
            "vote_count": 26000,
            "runtime": 0,
            "credits": {
                "cast": [{"name": "Edward Norton"}, {"name": "Brad Pitt"}],
                "crew": [{"name": "David Fincher", "job": "Director"}, {"name": "Jim Uhls", "job": "Screenplay"}]
            }
        }"#;

        let details: TmdbMovieDetails = serde_json::from_str(json).unwrap();
        let movie = MovieCandidate::from(details);
        assert_eq!(movie.tmdb_id, 550);
        assert_eq!(movie.release_date, None);
        assert_eq!(movie.runtime, None);
        assert_eq!(movie.genre_ids, vec![18]);
        assert_eq!(movie.director_names, vec!["David Fincher"]);
        assert_eq!(movie.cast_names, vec!["Edward Norton", "Brad Pitt"]);
        assert_eq!(movie.original_language, "en");
    }
}
