//! 설정 및 자격증명 관리.

use crate::error::{CryptradeError, CryptradeResult};
use crate::types::Currency;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// 거래 파라미터.
///
/// CLI 또는 설정 파일에서 채워지는 평범한 구조체입니다. `delta`는
/// 퍼센트가 아니라 (0, 1) 범위의 비율입니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradeParameters {
    /// 거래소 이름 (예: "binance", "coinbase", "kraken")
    pub exchange: String,
    /// 거래 통화
    pub trading_currency: Currency,
    /// 구매 통화
    pub buying_currency: Currency,
    /// 시장가 대비 주문 가격 오프셋 비율
    pub delta: Decimal,
    /// 기본 주문 수량
    pub basic_amount: Decimal,
    /// 기본 유닛 수 (유닛 조정의 하한)
    pub basic_units: u32,
    /// 이 가격 아래로는 매도하지 않음
    #[serde(default)]
    pub low_price: Decimal,
    /// 이 가격 위로는 매수하지 않음
    #[serde(default = "default_high_price")]
    pub high_price: Decimal,
    /// 한쪽 주문만 생성돼도 거래를 계속할지 여부
    #[serde(default)]
    pub allow_empty_order: bool,
    /// 주문 상태 조회 간격 (초)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// 단일 주문 모드에서 취소 전 최대 대기 시간 (초)
    #[serde(default = "default_single_order_wait")]
    pub single_order_wait_secs: u64,
}

fn default_high_price() -> Decimal {
    dec!(1000000)
}
fn default_poll_interval() -> u64 {
    15
}
fn default_single_order_wait() -> u64 {
    7200
}

impl TradeParameters {
    /// 파일과 환경 변수에서 파라미터를 로드하고 검증합니다.
    ///
    /// 환경 변수는 `CRYPTRADE__` 접두사로 파일 값을 덮어씁니다
    /// (예: `CRYPTRADE__BASIC_UNITS=2`).
    pub fn load<P: AsRef<Path>>(path: P) -> CryptradeResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CRYPTRADE")
                    .separator("__")
                    .try_parsing(true),
            );

        let parameters: Self = builder.build()?.try_deserialize()?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// 파라미터 값 검증.
    ///
    /// # Errors
    /// 규칙을 위반하면 `CryptradeError::Parameter`를 반환합니다.
    pub fn validate(&self) -> CryptradeResult<()> {
        if self.low_price < Decimal::ZERO {
            return Err(CryptradeError::Parameter(
                "low_price, minimum price cannot be negative".to_string(),
            ));
        }
        if self.high_price <= self.low_price {
            return Err(CryptradeError::Parameter(
                "high_price, should be higher than low_price".to_string(),
            ));
        }
        if self.delta <= Decimal::ZERO || self.delta >= Decimal::ONE {
            return Err(CryptradeError::Parameter(
                "delta, trade-delta should be between 0 & 100%".to_string(),
            ));
        }
        if self.basic_amount <= Decimal::ZERO {
            return Err(CryptradeError::Parameter(
                "amount, basic order amount should be higher than 0".to_string(),
            ));
        }
        if self.basic_units < 1 {
            return Err(CryptradeError::Parameter(
                "units, should be higher than 0".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(CryptradeError::Parameter(
                "interval, poll interval should be higher than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 주문 상태 조회 간격.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// 단일 주문 모드의 최대 대기 시간.
    pub fn single_order_wait(&self) -> Duration {
        Duration::from_secs(self.single_order_wait_secs)
    }
}

/// 한 거래소의 API 자격증명.
#[derive(Clone, Serialize, Deserialize)]
pub struct ExchangeCredentials {
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: String,
    /// API 패스프레이즈 (Coinbase 전용)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_pass: Option<String>,
}

impl fmt::Debug for ExchangeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeCredentials")
            .field("api_key", &mask(&self.api_key))
            .field("api_secret", &"***REDACTED***")
            .field("api_pass", &self.api_pass.as_ref().map(|_| "***REDACTED***"))
            .finish()
    }
}

/// 로그에 안전하게 남기기 위한 키 마스킹.
fn mask(key: &str) -> String {
    if key.len() > 8 {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "***REDACTED***".to_string()
    }
}

/// 거래소 이름으로 키가 지정된 자격증명 모음.
///
/// JSON 형식:
/// ```json
/// { "kraken": { "api_key": "...", "api_secret": "..." } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialStore(HashMap<String, ExchangeCredentials>);

impl CredentialStore {
    /// JSON 파일에서 자격증명을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CryptradeResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CryptradeError::Parameter(format!(
                "cannot read credential file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&contents)
    }

    /// JSON 문자열에서 자격증명을 파싱합니다.
    pub fn from_json(json: &str) -> CryptradeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// 거래소의 자격증명을 반환합니다.
    ///
    /// # Errors
    /// 해당 거래소 항목이 없으면 `CryptradeError::Parameter`를 반환합니다.
    pub fn get(&self, exchange: &str) -> CryptradeResult<&ExchangeCredentials> {
        self.0.get(exchange).ok_or_else(|| {
            CryptradeError::Parameter(format!("missing credentials for exchange {exchange}"))
        })
    }
}
