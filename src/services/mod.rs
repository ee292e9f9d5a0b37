pub mod cache_key;
pub mod catalog;
pub mod complexity;
pub mod generation;
pub mod llm;
pub mod prompt;
pub mod recommender;
pub mod sanitize;
pub mod session;
pub mod validator;

pub use catalog::{CatalogClient, CatalogProvider, TmdbProvider};
pub use complexity::{ComplexityScorer, Tier};
pub use generation::Generator;
pub use llm::{AnthropicClient, LanguageModel, RetryPolicy};
pub use recommender::{Recommendation, Recommender, Stage};
pub use session::{RefineRequest, SessionManager};
pub use validator::ResponseValidator;
