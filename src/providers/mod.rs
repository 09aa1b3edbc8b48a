//! Price provider implementations

pub mod coingecko;
pub mod failover;
pub mod stooq;

pub use coingecko::CoinGeckoProvider;
pub use failover::FailoverProvider;
pub use stooq::StooqProvider;
