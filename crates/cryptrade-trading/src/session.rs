//! 거래 세션.
//!
//! 하나의 거래소 연결 위에서 상품/시세/계좌를 소유합니다. 시세와 계좌는
//! 교체가 아니라 제자리 갱신되며, 일시적 조회 실패 시 이전 스냅샷이
//! 유지됩니다. 호출자가 신선도를 판단할 수 있도록 갱신 결과를 명시적인
//! `Freshness`로 돌려줍니다.

use std::fmt;
use std::sync::Arc;

use cryptrade_core::{Account, CryptradeResult, Currency, Product, Ticker};
use cryptrade_exchange::ExchangeApi;
use tracing::debug;

/// 갱신 결과: 새 스냅샷 또는 이전 값 유지.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// 새 스냅샷이 적용됨
    Fresh,
    /// 조회가 실패해 이전 스냅샷이 유지됨
    Stale(String),
}

impl Freshness {
    /// 새 스냅샷이 적용되었는지 확인합니다.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// 거래소 하나에 대한 거래 세션.
pub struct TradeSession {
    exchange: Arc<dyn ExchangeApi>,
    product: Product,
    ticker: Ticker,
    account: Account,
}

impl fmt::Debug for TradeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradeSession")
            .field("exchange", &self.exchange.name())
            .field("product", &self.product)
            .field("ticker", &self.ticker)
            .field("account", &self.account)
            .finish()
    }
}

impl TradeSession {
    /// 세션을 엽니다. 거래소 메타데이터에서 상품을 조회합니다.
    ///
    /// # Errors
    /// 거래쌍이 지원되지 않거나 메타데이터 조회가 실패하면
    /// `CryptradeError::Product`를 반환합니다. 시작 시점에 치명적입니다.
    pub async fn open(
        exchange: Arc<dyn ExchangeApi>,
        trading_currency: &Currency,
        buying_currency: &Currency,
    ) -> CryptradeResult<Self> {
        let product = exchange
            .fetch_product(trading_currency, buying_currency)
            .await?;
        let ticker = Ticker::new(&product);

        Ok(Self {
            exchange,
            product,
            ticker,
            account: Account::new(),
        })
    }

    /// 거래소 핸들.
    pub fn exchange(&self) -> &Arc<dyn ExchangeApi> {
        &self.exchange
    }

    /// 거래 상품.
    pub fn product(&self) -> &Product {
        &self.product
    }

    /// 현재 시세 스냅샷.
    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// 현재 계좌 스냅샷.
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// 시세를 갱신합니다. 실패 시 이전 스냅샷이 유지됩니다.
    pub async fn refresh_ticker(&mut self) -> Freshness {
        match self.exchange.fetch_ticker(&self.product).await {
            Ok(snapshot) => {
                self.ticker.apply(snapshot);
                Freshness::Fresh
            }
            Err(e) => {
                debug!("ticker refresh failed, keeping previous snapshot: {}", e);
                Freshness::Stale(e.to_string())
            }
        }
    }

    /// 계좌 잔고를 갱신합니다. 실패 시 이전 스냅샷이 유지됩니다.
    pub async fn refresh_account(&mut self) -> Freshness {
        match self.exchange.fetch_balances().await {
            Ok(balances) => {
                self.account.replace(balances);
                Freshness::Fresh
            }
            Err(e) => {
                debug!("account refresh failed, keeping previous snapshot: {}", e);
                Freshness::Stale(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptrade_exchange::{SimulatedConfig, SimulatedExchange};
    use rust_decimal_macros::dec;

    async fn open_session(exchange: Arc<dyn ExchangeApi>) -> TradeSession {
        TradeSession::open(exchange, &Currency::new("BTC"), &Currency::new("EUR"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_refresh_ticker() {
        let exchange = Arc::new(SimulatedExchange::new(
            SimulatedConfig::default().with_ticker(dec!(100), dec!(102), dec!(101)),
        ));
        let mut session = open_session(exchange).await;

        assert!(session.refresh_ticker().await.is_fresh());
        assert_eq!(session.ticker().bid(), dec!(100));
        assert_eq!(session.ticker().ask(), dec!(102));
    }

    #[tokio::test]
    async fn test_same_currency_is_fatal() {
        let exchange: Arc<dyn ExchangeApi> =
            Arc::new(SimulatedExchange::new(SimulatedConfig::default()));
        let result =
            TradeSession::open(exchange, &Currency::new("BTC"), &Currency::new("BTC")).await;

        assert!(result.is_err());
        assert!(result.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_refresh_account() {
        let exchange = Arc::new(SimulatedExchange::new(
            SimulatedConfig::default().with_balance("EUR", dec!(250)),
        ));
        let mut session = open_session(exchange).await;

        assert!(session.refresh_account().await.is_fresh());
        assert_eq!(session.account().available(&Currency::new("EUR")), dec!(250));
    }
}
