//! Coinbase 거래소 커넥터.
//!
//! Coinbase Exchange REST API 구현. 모든 요청은 CB-ACCESS-* 헤더로
//! 인증합니다: 서명은 `timestamp + method + path + body`를 base64로
//! 디코딩한 시크릿으로 HMAC-SHA256 한 뒤 base64 인코딩한 값입니다.
//! API 패스프레이즈(`api_pass`)가 필요한 유일한 거래소입니다.

use crate::traits::{ExchangeApi, ExchangeResult};
use crate::ExchangeError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use cryptrade_core::{
    Amount, Currency, ExchangeCredentials, OrderAck, OrderStatus, OrderUpdate, Price, Product,
    ProductLimits, Side, TickerSnapshot,
};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

type HmacSha256 = Hmac<Sha256>;

const API_URL: &str = "https://api.exchange.coinbase.com";

// ============================================================================
// 설정
// ============================================================================

/// Coinbase 클라이언트 설정.
#[derive(Clone)]
pub struct CoinbaseConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿 (base64)
    pub api_secret: String,
    /// API 패스프레이즈
    pub api_pass: String,
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl fmt::Debug for CoinbaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoinbaseConfig")
            .field("api_key", &"***REDACTED***")
            .field("api_secret", &"***REDACTED***")
            .field("api_pass", &"***REDACTED***")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl CoinbaseConfig {
    /// 새 설정 생성.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        api_pass: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            api_pass: api_pass.into(),
            base_url: API_URL.to_string(),
            timeout_secs: 30,
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
struct CoinbaseProduct {
    id: String,
    base_increment: String,
    quote_increment: String,
    #[serde(default)]
    base_min_size: Option<String>,
    #[serde(default)]
    min_market_funds: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoinbaseTicker {
    price: String,
    bid: String,
    ask: String,
}

#[derive(Debug, Deserialize)]
struct CoinbaseAccount {
    currency: String,
    available: String,
}

#[derive(Debug, Deserialize)]
struct CoinbaseOrder {
    id: String,
    status: String,
    filled_size: String,
    executed_value: String,
    settled: bool,
    #[serde(default)]
    done_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoinbaseApiError {
    message: String,
}

// ============================================================================
// Coinbase 클라이언트
// ============================================================================

/// Coinbase 거래소 클라이언트.
#[derive(Debug)]
pub struct CoinbaseExchange {
    config: CoinbaseConfig,
    client: Client,
    /// base64 디코딩된 서명 키
    signing_key: Vec<u8>,
}

impl CoinbaseExchange {
    /// 새 Coinbase 클라이언트 생성.
    ///
    /// # Errors
    /// 시크릿이 유효한 base64가 아니면 `ExchangeError::Unauthorized`를
    /// 반환합니다. 인증 실패는 시작 시점에 치명적입니다.
    pub fn new(config: CoinbaseConfig) -> ExchangeResult<Self> {
        let signing_key = BASE64.decode(&config.api_secret).map_err(|_| {
            ExchangeError::Unauthorized("invalid Coinbase API secret (not base64)".to_string())
        })?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent("cryptrade")
            .build()
            .map_err(|e| ExchangeError::Network(format!("failed to build http client: {e}")))?;

        Ok(Self {
            config,
            client,
            signing_key,
        })
    }

    /// 자격증명에서 클라이언트를 생성합니다.
    ///
    /// # Errors
    /// `api_pass`가 없으면 `ExchangeError::Unauthorized`를 반환합니다.
    pub fn from_credentials(credentials: &ExchangeCredentials) -> ExchangeResult<Self> {
        let api_pass = credentials.api_pass.as_ref().ok_or_else(|| {
            ExchangeError::Unauthorized("missing api_pass for Coinbase".to_string())
        })?;

        Self::new(CoinbaseConfig::new(
            credentials.api_key.clone(),
            credentials.api_secret.clone(),
            api_pass.clone(),
        ))
    }

    /// 현재 타임스탬프(초) 반환.
    fn timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_secs()
    }

    /// CB-ACCESS-SIGN 헤더 값 계산.
    fn sign(&self, timestamp: u64, method: &Method, path: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .expect("hmac accepts any key length");
        mac.update(format!("{timestamp}{method}{path}{body}").as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// 인증된 요청 전송.
    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.base_url, path);
        let body_text = body.map(|b| b.to_string()).unwrap_or_default();
        let timestamp = Self::timestamp();
        let signature = self.sign(timestamp, &method, path, &body_text);

        debug!("{} {}", method, path);

        let mut request = self
            .client
            .request(method, &url)
            .header("CB-ACCESS-KEY", &self.config.api_key)
            .header("CB-ACCESS-SIGN", signature)
            .header("CB-ACCESS-TIMESTAMP", timestamp.to_string())
            .header("CB-ACCESS-PASSPHRASE", &self.config.api_pass);

        if !body_text.is_empty() {
            request = request
                .header("Content-Type", "application/json")
                .body(body_text);
        }

        let response = request.send().await.map_err(ExchangeError::from)?;
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
            return serde_json::from_str(&body).map_err(|e| {
                error!("failed to parse response: {} - body: {}", e, body);
                ExchangeError::Parse(e.to_string())
            });
        }

        let message = serde_json::from_str::<CoinbaseApiError>(&body)
            .map(|e| e.message)
            .unwrap_or(body);

        Err(match status.as_u16() {
            401 | 403 => ExchangeError::Unauthorized(message),
            404 => ExchangeError::OrderNotFound(message),
            429 => ExchangeError::RateLimited,
            _ => ExchangeError::ApiError {
                code: status.as_u16() as i32,
                message,
            },
        })
    }

    /// 문자열에서 Decimal 파싱.
    fn parse_decimal(s: &str) -> Decimal {
        s.parse().unwrap_or(Decimal::ZERO)
    }

    /// Coinbase 주문 상태를 내부 상태로 변환.
    ///
    /// `done` 상태는 `done_reason`에 따라 체결 또는 취소로 나뉩니다.
    fn map_status(status: &str, done_reason: Option<&str>, settled: bool) -> OrderStatus {
        match status {
            "open" | "pending" | "active" => {
                if settled {
                    // 조회와 정산 사이의 경합, 체결로 간주
                    OrderStatus::Filled
                } else {
                    OrderStatus::Open
                }
            }
            "done" => match done_reason {
                Some("canceled") => OrderStatus::Canceled,
                _ => OrderStatus::Filled,
            },
            "rejected" => OrderStatus::Rejected,
            _ => OrderStatus::Open,
        }
    }

    fn to_update(order: &CoinbaseOrder) -> OrderUpdate {
        OrderUpdate {
            status: Self::map_status(&order.status, order.done_reason.as_deref(), order.settled),
            filled_size: Self::parse_decimal(&order.filled_size),
            executed_value: Some(Self::parse_decimal(&order.executed_value)),
        }
    }
}

#[async_trait]
impl ExchangeApi for CoinbaseExchange {
    fn name(&self) -> &str {
        "coinbase"
    }

    fn maker_fee(&self) -> Decimal {
        dec!(0.005)
    }

    fn taker_fee(&self) -> Decimal {
        dec!(0.005)
    }

    async fn fetch_product(
        &self,
        trading_currency: &Currency,
        buying_currency: &Currency,
    ) -> ExchangeResult<Product> {
        let pair_id = format!("{}-{}", trading_currency, buying_currency);

        let resp: CoinbaseProduct = self
            .request(Method::GET, &format!("/products/{pair_id}"), None)
            .await
            .map_err(|e| match e {
                ExchangeError::OrderNotFound(_) => ExchangeError::PairNotFound(pair_id.clone()),
                other => other,
            })?;

        let price_step = Self::parse_decimal(&resp.quote_increment);
        let amount_step = Self::parse_decimal(&resp.base_increment);
        let min_amount = resp
            .base_min_size
            .as_deref()
            .map(Self::parse_decimal)
            .unwrap_or(amount_step);
        let min_value = resp
            .min_market_funds
            .as_deref()
            .map(Self::parse_decimal)
            .unwrap_or(Decimal::ZERO);

        let limits = ProductLimits {
            min_amount,
            min_price: price_step,
            min_value,
            price_step,
            amount_step,
        };

        Product::new(trading_currency.clone(), buying_currency.clone(), resp.id, limits)
            .map_err(|e| ExchangeError::PairNotFound(e.to_string()))
    }

    async fn fetch_ticker(&self, product: &Product) -> ExchangeResult<TickerSnapshot> {
        let resp: CoinbaseTicker = self
            .request(
                Method::GET,
                &format!("/products/{}/ticker", product.pair_id()),
                None,
            )
            .await?;

        Ok(TickerSnapshot {
            bid: Self::parse_decimal(&resp.bid),
            ask: Self::parse_decimal(&resp.ask),
            last: Self::parse_decimal(&resp.price),
        })
    }

    async fn fetch_balances(&self) -> ExchangeResult<HashMap<Currency, Amount>> {
        let resp: Vec<CoinbaseAccount> = self.request(Method::GET, "/accounts", None).await?;

        Ok(resp
            .into_iter()
            .filter_map(|a| {
                let available = Self::parse_decimal(&a.available);
                (available > Decimal::ZERO).then(|| (Currency::new(a.currency), available))
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
        let body = serde_json::json!({
            "product_id": product.pair_id(),
            "type": "limit",
            "side": side.to_string(),
            "price": price.to_string(),
            "size": amount.to_string(),
            "time_in_force": "GTC",
        });

        info!(
            "placing {} limit order for {} {} @ {}",
            side,
            amount,
            product.pair_id(),
            price
        );

        let resp: CoinbaseOrder = self.request(Method::POST, "/orders", Some(body)).await?;

        info!("order placed successfully: {}", resp.id);

        let update = Self::to_update(&resp);
        Ok(OrderAck {
            order_id: resp.id,
            status: update.status,
            filled_size: update.filled_size,
            executed_value: update.executed_value,
        })
    }

    async fn fetch_order(&self, _product: &Product, order_id: &str) -> ExchangeResult<OrderUpdate> {
        let resp: CoinbaseOrder = self
            .request(Method::GET, &format!("/orders/{order_id}"), None)
            .await?;

        Ok(Self::to_update(&resp))
    }

    async fn cancel_order(&self, _product: &Product, order_id: &str) -> ExchangeResult<()> {
        let _: serde_json::Value = self
            .request(Method::DELETE, &format!("/orders/{order_id}"), None)
            .await?;

        info!("order {} cancelled", order_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptrade_core::CryptradeError;

    fn test_config() -> CoinbaseConfig {
        // "secret"의 base64
        CoinbaseConfig::new("key", "c2VjcmV0", "pass")
    }

    #[test]
    fn test_secret_must_be_base64() {
        let config = CoinbaseConfig::new("key", "not base64 !!", "pass");
        let result = CoinbaseExchange::new(config);
        assert!(matches!(result, Err(ExchangeError::Unauthorized(_))));
    }

    #[test]
    fn test_missing_api_pass_is_fatal() {
        let credentials = ExchangeCredentials {
            api_key: "key".to_string(),
            api_secret: "c2VjcmV0".to_string(),
            api_pass: None,
        };

        let err = CoinbaseExchange::from_credentials(&credentials).unwrap_err();
        assert!(err.is_auth_error());

        let core_err: CryptradeError = err.into();
        assert!(core_err.is_fatal());
    }

    #[test]
    fn test_sign_is_deterministic() {
        let exchange = CoinbaseExchange::new(test_config()).unwrap();
        let a = exchange.sign(1499827319, &Method::GET, "/accounts", "");
        let b = exchange.sign(1499827319, &Method::GET, "/accounts", "");
        assert_eq!(a, b);

        // 경로가 다르면 서명도 달라야 한다
        let c = exchange.sign(1499827319, &Method::GET, "/orders", "");
        assert_ne!(a, c);
    }

    #[test]
    fn test_map_status() {
        assert_eq!(
            CoinbaseExchange::map_status("open", None, false),
            OrderStatus::Open
        );
        assert_eq!(
            CoinbaseExchange::map_status("done", Some("filled"), true),
            OrderStatus::Filled
        );
        assert_eq!(
            CoinbaseExchange::map_status("done", Some("canceled"), true),
            OrderStatus::Canceled
        );
        assert_eq!(
            CoinbaseExchange::map_status("rejected", None, true),
            OrderStatus::Rejected
        );
    }

    #[tokio::test]
    async fn test_fetch_order_reports_executed_value() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/orders/abc-1")
            .with_status(200)
            .with_body(
                r#"{"id":"abc-1","status":"done","done_reason":"filled",
                    "filled_size":"0.02","executed_value":"2.00","settled":true}"#,
            )
            .create_async()
            .await;

        let exchange =
            CoinbaseExchange::new(test_config().with_base_url(server.url())).unwrap();
        let product = Product::new(
            Currency::new("BTC"),
            Currency::new("EUR"),
            "BTC-EUR",
            ProductLimits::default(),
        )
        .unwrap();

        let update = exchange.fetch_order(&product, "abc-1").await.unwrap();
        assert_eq!(update.status, OrderStatus::Filled);
        assert_eq!(update.filled_size, dec!(0.02));
        assert_eq!(update.executed_value, Some(dec!(2.00)));
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/orders/missing")
            .with_status(404)
            .with_body(r#"{"message":"NotFound"}"#)
            .create_async()
            .await;

        let exchange =
            CoinbaseExchange::new(test_config().with_base_url(server.url())).unwrap();
        let product = Product::new(
            Currency::new("BTC"),
            Currency::new("EUR"),
            "BTC-EUR",
            ProductLimits::default(),
        )
        .unwrap();

        let result = exchange.fetch_order(&product, "missing").await;
        assert!(matches!(result, Err(ExchangeError::OrderNotFound(_))));
    }
}
