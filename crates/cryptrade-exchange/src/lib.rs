//! 거래소 연결.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `ExchangeApi` trait: 통합 거래소 인터페이스
//! - Binance / Coinbase / Kraken REST 커넥터
//! - 시뮬레이션 거래소 (테스트 및 모의투자용)
//! - 거래소 이름 → 커넥터 팩토리

pub mod connector;
pub mod error;
pub mod factory;
pub mod simulated;
pub mod traits;

pub use connector::{
    BinanceConfig, BinanceExchange, CoinbaseConfig, CoinbaseExchange, KrakenConfig, KrakenExchange,
};
pub use error::*;
pub use factory::create_exchange;
pub use simulated::{SimulatedConfig, SimulatedExchange};
pub use traits::*;
