pub mod chain;
pub mod coingecko;
pub mod coinpaprika;
pub mod cryptocompare;
pub mod util;

pub use chain::ProviderChain;
pub use util::HttpSettings;
