pub mod marketplace_client;
pub mod redis;

pub use marketplace_client::MarketplaceClient;
pub use redis::RedisRepository;
