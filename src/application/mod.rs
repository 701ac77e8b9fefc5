pub mod aggregation;
pub mod analytics_service;
pub mod cache_service;

pub use analytics_service::{AnalyticsError, AnalyticsService};
pub use cache_service::CacheService;
