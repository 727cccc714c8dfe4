pub mod analysis;
pub mod domain;
pub mod history;
pub mod memory_store;
pub mod parser;
pub mod ports;
pub mod prompt;

pub use analysis::{AnalysisError, AnalysisService};
pub use domain::{
    AnalysisData, AnalysisRequest, AnalysisResult, AnalysisType, HealthProfile, HealthScore,
    HistoryItem, Severity, Warning,
};
pub use history::{HistoryCache, HistoryExport};
pub use memory_store::MemoryStore;
pub use parser::{parse_model_response, ParsedResponse};
pub use ports::{KeyValueStore, PortError, PortResult, VisionModelService};
pub use prompt::build_analysis_prompt;
