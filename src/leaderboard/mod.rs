pub mod error;
pub mod manager;
pub mod ranking;
pub mod render;
pub mod score_record;

pub use manager::{LeaderboardManager, ManagerOptions, MutationPolicy, ScoreInput};
pub use render::{PresentationSink, TextSink};
