//! Binance 거래소 커넥터.
//!
//! Binance Spot용 REST API 구현. 서명이 필요한 요청은 쿼리 문자열을
//! HMAC-SHA256으로 서명합니다.

use crate::traits::{ExchangeApi, ExchangeResult};
use crate::ExchangeError;
use async_trait::async_trait;
use cryptrade_core::{
    Amount, Currency, ExchangeCredentials, OrderAck, OrderStatus, OrderUpdate, Price, Product,
    ProductLimits, Side, TickerSnapshot,
};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

type HmacSha256 = Hmac<Sha256>;

const MAINNET_URL: &str = "https://api.binance.com";

// ============================================================================
// 설정
// ============================================================================

/// Binance 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`, `api_secret`)를 마스킹합니다.
#[derive(Clone)]
pub struct BinanceConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: String,
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 수신 윈도우 (밀리초)
    pub recv_window: u64,
}

impl fmt::Debug for BinanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinanceConfig")
            .field("api_key", &"***REDACTED***")
            .field("api_secret", &"***REDACTED***")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("recv_window", &self.recv_window)
            .finish()
    }
}

impl BinanceConfig {
    /// 새 설정 생성.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: MAINNET_URL.to_string(),
            timeout_secs: 30,
            recv_window: 5000,
        }
    }

    /// 기본 URL을 변경합니다 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    bid_price: String,
    ask_price: String,
    last_price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceSymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct BinanceSymbolInfo {
    symbol: String,
    filters: Vec<BinanceFilter>,
}

/// 심볼 필터. 알려지지 않은 filterType은 무시합니다.
#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum BinanceFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    Price { min_price: String, tick_size: String },
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize { min_qty: String, step_size: String },
    #[serde(rename = "MIN_NOTIONAL", rename_all = "camelCase")]
    MinNotional { min_notional: String },
    #[serde(rename = "NOTIONAL", rename_all = "camelCase")]
    Notional { min_notional: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceBalance {
    asset: String,
    free: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccountInfo {
    balances: Vec<BinanceBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrderResponse {
    order_id: i64,
    status: String,
    executed_qty: String,
    #[serde(default)]
    cummulative_quote_qty: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BinanceApiError {
    code: i32,
    msg: String,
}

// ============================================================================
// Binance 클라이언트
// ============================================================================

/// Binance 거래소 클라이언트.
pub struct BinanceExchange {
    config: BinanceConfig,
    client: Client,
}

impl BinanceExchange {
    /// 새 Binance 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::Network`를 반환합니다.
    pub fn new(config: BinanceConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::Network(format!("failed to build http client: {e}")))?;

        Ok(Self { config, client })
    }

    /// 자격증명에서 클라이언트를 생성합니다.
    pub fn from_credentials(credentials: &ExchangeCredentials) -> ExchangeResult<Self> {
        Self::new(BinanceConfig::new(
            credentials.api_key.clone(),
            credentials.api_secret.clone(),
        ))
    }

    /// 현재 타임스탬프(밀리초) 반환.
    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_millis() as u64
    }

    /// HMAC-SHA256으로 쿼리 문자열 서명.
    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// 파라미터에서 쿼리 문자열 생성.
    fn build_query(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// 공개 API 요청 (인증 불필요).
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let query = Self::build_query(params);
        let full_url = if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        };

        debug!("GET {}", endpoint);

        let response = self
            .client
            .get(&full_url)
            .send()
            .await
            .map_err(ExchangeError::from)?;

        self.handle_response(response).await
    }

    /// 서명된 요청 (인증 필요).
    async fn signed_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.base_url, endpoint);

        let mut all_params = params.to_vec();
        all_params.push(("timestamp", Self::timestamp_ms().to_string()));
        all_params.push(("recvWindow", self.config.recv_window.to_string()));

        let query = Self::build_query(&all_params);
        let signature = self.sign(&query);
        let full_url = format!("{}?{}&signature={}", url, query, signature);

        debug!("{} (signed) {}", method, endpoint);

        let response = self
            .client
            .request(method, &full_url)
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await
            .map_err(ExchangeError::from)?;

        self.handle_response(response).await
    }

    /// API 응답 처리.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                error!("failed to parse response: {} - body: {}", e, body);
                ExchangeError::Parse(e.to_string())
            })
        } else if let Ok(api_error) = serde_json::from_str::<BinanceApiError>(&body) {
            Err(Self::map_error_code(api_error.code, &api_error.msg))
        } else {
            Err(ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message: body,
            })
        }
    }

    /// Binance 에러 코드를 ExchangeError로 매핑.
    fn map_error_code(code: i32, msg: &str) -> ExchangeError {
        match code {
            -1002 => ExchangeError::Unauthorized(msg.to_string()),
            -1003 => ExchangeError::RateLimited,
            -1013 => ExchangeError::InvalidOrder(msg.to_string()),
            -1121 => ExchangeError::PairNotFound(msg.to_string()),
            -2010 => ExchangeError::InsufficientBalance(msg.to_string()),
            -2011 | -2013 => ExchangeError::OrderNotFound(msg.to_string()),
            _ => ExchangeError::ApiError {
                code,
                message: msg.to_string(),
            },
        }
    }

    /// 문자열에서 Decimal 파싱.
    fn parse_decimal(s: &str) -> Decimal {
        s.parse().unwrap_or(Decimal::ZERO)
    }

    /// Binance 주문 상태 문자열을 내부 상태로 변환.
    fn map_status(status: &str) -> OrderStatus {
        match status {
            "NEW" | "PARTIALLY_FILLED" | "PENDING_CANCEL" => OrderStatus::Open,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" => OrderStatus::Canceled,
            "REJECTED" => OrderStatus::Rejected,
            "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Expired,
            _ => OrderStatus::Open,
        }
    }

    fn to_update(resp: &BinanceOrderResponse) -> OrderUpdate {
        OrderUpdate {
            status: Self::map_status(&resp.status),
            filled_size: Self::parse_decimal(&resp.executed_qty),
            executed_value: resp
                .cummulative_quote_qty
                .as_deref()
                .map(Self::parse_decimal),
        }
    }
}

#[async_trait]
impl ExchangeApi for BinanceExchange {
    fn name(&self) -> &str {
        "binance"
    }

    fn maker_fee(&self) -> Decimal {
        dec!(0.001)
    }

    fn taker_fee(&self) -> Decimal {
        dec!(0.002)
    }

    async fn fetch_product(
        &self,
        trading_currency: &Currency,
        buying_currency: &Currency,
    ) -> ExchangeResult<Product> {
        let pair_id = format!("{}{}", trading_currency, buying_currency);

        let info: BinanceExchangeInfo = self
            .public_get("/api/v3/exchangeInfo", &[("symbol", pair_id.clone())])
            .await?;

        let symbol = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == pair_id)
            .ok_or_else(|| ExchangeError::PairNotFound(pair_id.clone()))?;

        let mut limits = ProductLimits::default();
        for filter in symbol.filters {
            match filter {
                BinanceFilter::Price {
                    min_price,
                    tick_size,
                } => {
                    limits.min_price = Self::parse_decimal(&min_price);
                    limits.price_step = Self::parse_decimal(&tick_size);
                }
                BinanceFilter::LotSize { min_qty, step_size } => {
                    limits.min_amount = Self::parse_decimal(&min_qty);
                    limits.amount_step = Self::parse_decimal(&step_size);
                }
                BinanceFilter::MinNotional { min_notional }
                | BinanceFilter::Notional { min_notional } => {
                    limits.min_value = Self::parse_decimal(&min_notional);
                }
                BinanceFilter::Other => {}
            }
        }

        Product::new(
            trading_currency.clone(),
            buying_currency.clone(),
            pair_id,
            limits,
        )
        .map_err(|e| ExchangeError::PairNotFound(e.to_string()))
    }

    async fn fetch_ticker(&self, product: &Product) -> ExchangeResult<TickerSnapshot> {
        let resp: BinanceTicker = self
            .public_get(
                "/api/v3/ticker/24hr",
                &[("symbol", product.pair_id().to_string())],
            )
            .await?;

        Ok(TickerSnapshot {
            bid: Self::parse_decimal(&resp.bid_price),
            ask: Self::parse_decimal(&resp.ask_price),
            last: Self::parse_decimal(&resp.last_price),
        })
    }

    async fn fetch_balances(&self) -> ExchangeResult<HashMap<Currency, Amount>> {
        let resp: BinanceAccountInfo = self
            .signed_request(reqwest::Method::GET, "/api/v3/account", &[])
            .await?;

        Ok(resp
            .balances
            .into_iter()
            .filter_map(|b| {
                let free = Self::parse_decimal(&b.free);
                (free > Decimal::ZERO).then(|| (Currency::new(b.asset), free))
            })
            .collect())
    }

    async fn place_limit_order(
        &self,
        product: &Product,
        side: Side,
        price: Price,
        amount: Amount,
    ) -> ExchangeResult<OrderAck> {
        let params = vec![
            ("symbol", product.pair_id().to_string()),
            (
                "side",
                match side {
                    Side::Buy => "BUY".to_string(),
                    Side::Sell => "SELL".to_string(),
                },
            ),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", amount.to_string()),
            ("price", price.to_string()),
        ];

        info!(
            "placing {} limit order for {} {} @ {}",
            side,
            amount,
            product.pair_id(),
            price
        );

        let resp: BinanceOrderResponse = self
            .signed_request(reqwest::Method::POST, "/api/v3/order", &params)
            .await?;

        info!("order placed successfully: {}", resp.order_id);

        let update = Self::to_update(&resp);
        Ok(OrderAck {
            order_id: resp.order_id.to_string(),
            status: update.status,
            filled_size: update.filled_size,
            executed_value: update.executed_value,
        })
    }

    async fn fetch_order(&self, product: &Product, order_id: &str) -> ExchangeResult<OrderUpdate> {
        let params = vec![
            ("symbol", product.pair_id().to_string()),
            ("orderId", order_id.to_string()),
        ];

        let resp: BinanceOrderResponse = self
            .signed_request(reqwest::Method::GET, "/api/v3/order", &params)
            .await?;

        Ok(Self::to_update(&resp))
    }

    async fn cancel_order(&self, product: &Product, order_id: &str) -> ExchangeResult<()> {
        let params = vec![
            ("symbol", product.pair_id().to_string()),
            ("orderId", order_id.to_string()),
        ];

        let _: BinanceOrderResponse = self
            .signed_request(reqwest::Method::DELETE, "/api/v3/order", &params)
            .await?;

        info!("order {} cancelled", order_id);
        Ok(())
    }
}
