pub mod anthropic;
pub mod movie;
pub mod request;
pub mod response;
pub mod session;

pub use movie::{
    CandidatePool, MovieCandidate, MovieSummary, TmdbCastMember, TmdbCredits, TmdbCrewMember,
    TmdbGenre, TmdbId, TmdbMovie, TmdbMovieDetails, TmdbPage,
};
pub use request::{Constraints, Context, Mode, RecommendationRequest, UserProfile, YearRange};
pub use response::{CachedRecommendation, ModelPick, ModelRecommendation, RecommendationResponse};
pub use session::{Receipt, Reaction, SessionState, TokenUsage};
