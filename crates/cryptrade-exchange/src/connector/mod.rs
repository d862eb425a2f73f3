//! 거래소별 커넥터.

mod binance;
mod coinbase;
mod kraken;

pub use binance::{BinanceConfig, BinanceExchange};
pub use coinbase::{CoinbaseConfig, CoinbaseExchange};
pub use kraken::{KrakenConfig, KrakenExchange};
