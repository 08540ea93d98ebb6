pub mod blind_date;
pub mod quiz;
pub mod recommendations;
pub mod scoring;
pub mod stores;

pub use blind_date::BlindDateSelector;
pub use quiz::QuizMatcher;
pub use recommendations::{RecommendationService, RecommendationSettings};
