pub mod paths;
pub mod service;
pub mod settings;

pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::{
    AnswerSettings, EmbeddingSettings, FallbackMode, RagSettings, ServerSettings, Settings,
};
