//! 거래소 이름 → 커넥터 팩토리.

use std::sync::Arc;

use cryptrade_core::{CredentialStore, CryptradeError, CryptradeResult};

use crate::connector::{BinanceExchange, CoinbaseExchange, KrakenExchange};
use crate::traits::ExchangeApi;

/// 이름으로 거래소 커넥터를 생성합니다.
///
/// # Errors
/// - 알 수 없는 거래소 이름이면 `CryptradeError::Parameter`
/// - 자격증명이 없거나 불완전하면 `CryptradeError::Parameter` 또는
///   `CryptradeError::Authentication`
pub fn create_exchange(
    name: &str,
    credentials: &CredentialStore,
) -> CryptradeResult<Arc<dyn ExchangeApi>> {
    match name {
        "binance" => {
            let client = BinanceExchange::from_credentials(credentials.get("binance")?)?;
            Ok(Arc::new(client))
        }
        "coinbase" => {
            let client = CoinbaseExchange::from_credentials(credentials.get("coinbase")?)?;
            Ok(Arc::new(client))
        }
        "kraken" => {
            let client = KrakenExchange::from_credentials(credentials.get("kraken")?)?;
            Ok(Arc::new(client))
        }
        _ => Err(CryptradeError::Parameter(
            "exchange-name unknown or unsupported".to_string(),
        )),
    }
}
