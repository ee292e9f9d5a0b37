/// TMDB movie genre table (id, display name)
pub const GENRES: [(u32, &str); 19] = [
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Science Fiction"),
    (10770, "TV Movie"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
];

pub fn genre_id(name: &str) -> Option<u32> {
    let name = name.trim();
    GENRES
        .iter()
        .find(|(_, known)| known.eq_ignore_ascii_case(name))
        .map(|(id, _)| *id)
}

/// Resolves names to ids, silently dropping unknown names and repeats
pub fn resolve_genre_ids<S: AsRef<str>>(names: &[S]) -> Vec<u32> {
    let mut ids = Vec::new();
    for id in names.iter().filter_map(|name| genre_id(name.as_ref())) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
