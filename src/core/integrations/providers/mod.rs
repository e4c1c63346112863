pub mod citation_tracking;
pub mod keyword_data;
pub mod serp_analysis;

pub use citation_tracking::{CitationTrackingClient, CitationTrackingHttp, KeywordCitations};
pub use keyword_data::{DomainMetrics, KeywordDataClient, KeywordDataHttp, KeywordOverlap};
pub use serp_analysis::{SerpAnalysis, SerpAnalysisClient, SerpAnalysisHttp};
