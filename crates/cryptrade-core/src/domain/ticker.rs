//! 시세 스냅샷.

use crate::domain::Product;
use crate::types::Price;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 커넥터가 반환하는 원시 시세 값.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TickerSnapshot {
    /// 최우선 매수 호가
    pub bid: Price,
    /// 최우선 매도 호가
    pub ask: Price,
    /// 최근 체결가
    pub last: Price,
}

/// 제자리에서 갱신되는 시세.
///
/// 이 엔티티는 이력을 보관하지 않습니다. 이력이 필요하면
/// `TickerWindow` 같은 외부 협력자가 담당합니다.
#[derive(Debug, Clone)]
pub struct Ticker {
    pair_id: String,
    bid: Price,
    ask: Price,
    last: Price,
    timestamp: Option<DateTime<Utc>>,
}

impl Ticker {
    /// 상품에 대한 빈 시세를 생성합니다.
    pub fn new(product: &Product) -> Self {
        Self {
            pair_id: product.pair_id().to_string(),
            bid: Decimal::ZERO,
            ask: Decimal::ZERO,
            last: Decimal::ZERO,
            timestamp: None,
        }
    }

    /// 새 스냅샷을 적용하고 타임스탬프를 갱신합니다.
    pub fn apply(&mut self, snapshot: TickerSnapshot) {
        self.bid = snapshot.bid;
        self.ask = snapshot.ask;
        self.last = snapshot.last;
        self.timestamp = Some(Utc::now());
    }

    /// 최우선 매수 호가.
    pub fn bid(&self) -> Price {
        self.bid
    }

    /// 최우선 매도 호가.
    pub fn ask(&self) -> Price {
        self.ask
    }

    /// 최근 체결가.
    pub fn last(&self) -> Price {
        self.last
    }

    /// 호가 스프레드 (ask - bid).
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// 마지막 갱신 시각. 한 번도 갱신되지 않았으면 `None`.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// 유효한 스냅샷을 한 번 이상 받았는지 확인합니다.
    pub fn is_initialized(&self) -> bool {
        self.timestamp.is_some()
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ticker: {}", self.pair_id)?;
        writeln!(f, "Price : {:.4}", self.last)?;
        writeln!(f, "Bid   : {:.4}", self.bid)?;
        writeln!(f, "Ask   : {:.4}", self.ask)?;
        write!(f, "Spread: {:.4}", self.spread())
    }
}
