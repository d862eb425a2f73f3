//! Kraken 거래소 커넥터.
//!
//! Kraken REST API 구현. 비공개 엔드포인트는 `API-Sign` 헤더로
//! 인증합니다: `HMAC-SHA512(base64디코딩한 시크릿,
//! path + SHA256(nonce + postdata))`를 base64 인코딩한 값입니다.
//!
//! Kraken은 자체 통화 표기(XXBT, ZEUR 등)와 자체 거래쌍 이름을
//! 사용하므로, 일반 식별자 → 거래소 식별자 변환은 아래의 정적
//! 데이터 테이블이 담당합니다.

use crate::traits::{ExchangeApi, ExchangeResult};
use crate::ExchangeError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use cryptrade_core::{
    Amount, Currency, ExchangeCredentials, OrderAck, OrderStatus, OrderUpdate, Price, Product,
    ProductLimits, Side, TickerSnapshot,
};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info};

type HmacSha512 = Hmac<Sha512>;

const API_URL: &str = "https://api.kraken.com";

// ============================================================================
// 식별자 매핑 테이블
// ============================================================================

/// 일반 통화 코드 → Kraken 통화 코드.
const CURRENCY_MAP: &[(&str, &str)] = &[
    ("BTC", "XXBT"),
    ("ETH", "XETH"),
    ("ETC", "XETC"),
    ("LTC", "XLTC"),
    ("EUR", "ZEUR"),
    ("USD", "ZUSD"),
    ("XRP", "XXRP"),
    ("KRW", "ZKRW"),
    ("JPY", "ZJPY"),
    ("GBP", "ZGBP"),
    ("CAD", "ZCAD"),
    ("ZEC", "XZEC"),
    ("XTZ", "XXTZ"),
    ("XMR", "XXMR"),
    ("XLM", "XXLM"),
    ("XDG", "XXDG"),
    ("REP", "XREP"),
    ("MLN", "XMLN"),
];

/// 연결된 일반 쌍 이름 → Kraken 거래쌍 이름.
///
/// 테이블에 없는 쌍은 일반 이름 그대로 조회합니다 (Kraken은 다수의
/// 신규 쌍을 일반 표기로도 받습니다).
const PAIR_MAP: &[(&str, &str)] = &[
    ("ADABTC", "ADAXBT"),
    ("ALGOBTC", "ALGOXBT"),
    ("BATBTC", "BATXBT"),
    ("BCHBTC", "BCHXBT"),
    ("DASHBTC", "DASHXBT"),
    ("EOSBTC", "EOSXBT"),
    ("GNOBTC", "GNOXBT"),
    ("LINKBTC", "LINKXBT"),
    ("LSKBTC", "LSKXBT"),
    ("NANOBTC", "NANOXBT"),
    ("OMGBTC", "OMGXBT"),
    ("PAXGBTC", "PAXGXBT"),
    ("QTUMBTC", "QTUMXBT"),
    ("SCBTC", "SCXBT"),
    ("TRXBTC", "TRXXBT"),
    ("USDTUSD", "USDTZUSD"),
    ("WAVESBTC", "WAVESXBT"),
    ("BTCDAI", "XBTDAI"),
    ("BTCUSDC", "XBTUSDC"),
    ("BTCUSDT", "XBTUSDT"),
    ("ETCETH", "XETCXETH"),
    ("ETCBTC", "XETCXXBT"),
    ("ETCEUR", "XETCZEUR"),
    ("ETCUSD", "XETCZUSD"),
    ("ETHBTC", "XETHXXBT"),
    ("ETHCAD", "XETHZCAD"),
    ("ETHEUR", "XETHZEUR"),
    ("ETHGBP", "XETHZGBP"),
    ("ETHJPY", "XETHZJPY"),
    ("ETHUSD", "XETHZUSD"),
    ("LTCBTC", "XLTCXXBT"),
    ("LTCEUR", "XLTCZEUR"),
    ("LTCUSD", "XLTCZUSD"),
    ("MLNETH", "XMLNXETH"),
    ("MLNBTC", "XMLNXXBT"),
    ("MLNEUR", "XMLNZEUR"),
    ("MLNUSD", "XMLNZUSD"),
    ("REPETH", "XREPXETH"),
    ("REPBTC", "XREPXXBT"),
    ("REPEUR", "XREPZEUR"),
    ("REPUSD", "XREPZUSD"),
    ("XTZBTC", "XTZXBT"),
    ("BTCCAD", "XXBTZCAD"),
    ("BTCEUR", "XXBTZEUR"),
    ("BTCGBP", "XXBTZGBP"),
    ("BTCJPY", "XXBTZJPY"),
    ("BTCUSD", "XXBTZUSD"),
    ("XDGBTC", "XXDGXXBT"),
    ("XLMBTC", "XXLMXXBT"),
    ("XLMEUR", "XXLMZEUR"),
    ("XLMUSD", "XXLMZUSD"),
    ("XMRBTC", "XXMRXXBT"),
    ("XMREUR", "XXMRZEUR"),
    ("XMRUSD", "XXMRZUSD"),
    ("XRPBTC", "XXRPXXBT"),
    ("XRPCAD", "XXRPZCAD"),
    ("XRPEUR", "XXRPZEUR"),
    ("XRPJPY", "XXRPZJPY"),
    ("XRPUSD", "XXRPZUSD"),
    ("ZECBTC", "XZECXXBT"),
    ("ZECEUR", "XZECZEUR"),
    ("ZECUSD", "XZECZUSD"),
    ("EURUSD", "ZEURZUSD"),
    ("GBPUSD", "ZGBPZUSD"),
    ("USDCAD", "ZUSDZCAD"),
    ("USDJPY", "ZUSDZJPY"),
];

/// 일반 통화 코드를 Kraken 표기로 변환합니다.
fn exchange_currency(code: &str) -> &str {
    CURRENCY_MAP
        .iter()
        .find(|(generic, _)| *generic == code)
        .map(|(_, native)| *native)
        .unwrap_or(code)
}

/// Kraken 통화 표기를 일반 코드로 역변환합니다.
fn generic_currency(native: &str) -> &str {
    CURRENCY_MAP
        .iter()
        .find(|(_, n)| *n == native)
        .map(|(generic, _)| *generic)
        .unwrap_or(native)
}

/// 일반 거래쌍 이름을 Kraken 거래쌍 이름으로 변환합니다.
fn exchange_pair(pair: &str) -> &str {
    PAIR_MAP
        .iter()
        .find(|(generic, _)| *generic == pair)
        .map(|(_, native)| *native)
        .unwrap_or(pair)
}

// ============================================================================
// 설정
// ============================================================================

/// Kraken 클라이언트 설정.
#[derive(Clone)]
pub struct KrakenConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿 (base64)
    pub api_secret: String,
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl fmt::Debug for KrakenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KrakenConfig")
            .field("api_key", &"***REDACTED***")
            .field("api_secret", &"***REDACTED***")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl KrakenConfig {
    /// 새 설정 생성.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
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

/// 모든 Kraken 응답의 공통 봉투.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct KrakenEnvelope<T> {
    error: Vec<String>,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KrakenAssetPair {
    lot_decimals: u32,
    pair_decimals: u32,
    #[serde(default)]
    ordermin: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KrakenTickerInfo {
    /// 매도 호가 [price, whole lot volume, lot volume]
    a: Vec<String>,
    /// 매수 호가
    b: Vec<String>,
    /// 최근 체결 [price, lot volume]
    c: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KrakenAddOrderResult {
    txid: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct KrakenOrderInfo {
    status: String,
    vol_exec: String,
    #[serde(default)]
    cost: Option<String>,
}

// ============================================================================
// Kraken 클라이언트
// ============================================================================

/// Kraken 거래소 클라이언트.
pub struct KrakenExchange {
    config: KrakenConfig,
    client: Client,
    /// base64 디코딩된 서명 키
    signing_key: Vec<u8>,
}

impl KrakenExchange {
    /// 새 Kraken 클라이언트 생성.
    ///
    /// # Errors
    /// 시크릿이 유효한 base64가 아니면 `ExchangeError::Unauthorized`를
    /// 반환합니다.
    pub fn new(config: KrakenConfig) -> ExchangeResult<Self> {
        let signing_key = BASE64.decode(&config.api_secret).map_err(|_| {
            ExchangeError::Unauthorized("invalid Kraken API secret (not base64)".to_string())
        })?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::Network(format!("failed to build http client: {e}")))?;

        Ok(Self {
            config,
            client,
            signing_key,
        })
    }

    /// 자격증명에서 클라이언트를 생성합니다.
    pub fn from_credentials(credentials: &ExchangeCredentials) -> ExchangeResult<Self> {
        Self::new(KrakenConfig::new(
            credentials.api_key.clone(),
            credentials.api_secret.clone(),
        ))
    }

    /// 논스(밀리초 타임스탬프) 생성.
    fn nonce() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_millis() as u64
    }

    /// API-Sign 헤더 값 계산.
    fn sign(&self, path: &str, nonce: u64, postdata: &str) -> String {
        let mut sha = Sha256::new();
        sha.update(format!("{nonce}{postdata}").as_bytes());
        let digest = sha.finalize();

        let mut mac = HmacSha512::new_from_slice(&self.signing_key)
            .expect("hmac accepts any key length");
        mac.update(path.as_bytes());
        mac.update(&digest);
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// 공개 API 요청.
    async fn public_get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let url = if query.is_empty() {
            format!("{}{}", self.config.base_url, path)
        } else {
            format!("{}{}?{}", self.config.base_url, path, query)
        };

        debug!("GET {}", path);

        let response = self.client.get(&url).send().await.map_err(ExchangeError::from)?;
        Self::unwrap_envelope(response).await
    }

    /// 서명된 비공개 API 요청.
    async fn private_post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let nonce = Self::nonce();
        let mut postdata = format!("nonce={nonce}");
        for (k, v) in params {
            postdata.push_str(&format!("&{}={}", k, v));
        }

        let signature = self.sign(path, nonce, &postdata);
        let url = format!("{}{}", self.config.base_url, path);

        debug!("POST (signed) {}", path);

        let response = self
            .client
            .post(&url)
            .header("API-Key", &self.config.api_key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(postdata)
            .send()
            .await
            .map_err(ExchangeError::from)?;

        Self::unwrap_envelope(response).await
    }

    /// `{error: [], result: {}}` 봉투를 풀어 결과만 반환합니다.
    async fn unwrap_envelope<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> ExchangeResult<T> {
        let body = response
            .text()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;

        let envelope: KrakenEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
            error!("failed to parse response: {} - body: {}", e, body);
            ExchangeError::Parse(e.to_string())
        })?;

        if let Some(message) = envelope.error.first() {
            return Err(Self::map_error(message));
        }

        envelope
            .result
            .ok_or_else(|| ExchangeError::Parse("missing result in response".to_string()))
    }

    /// Kraken 에러 문자열을 ExchangeError로 매핑.
    fn map_error(message: &str) -> ExchangeError {
        if message.starts_with("EAPI:Invalid key")
            || message.starts_with("EAPI:Invalid signature")
            || message.starts_with("EGeneral:Permission denied")
        {
            ExchangeError::Unauthorized(message.to_string())
        } else if message.starts_with("EAPI:Rate limit") || message.starts_with("EOrder:Rate limit")
        {
            ExchangeError::RateLimited
        } else if message.starts_with("EOrder:Unknown order") {
            ExchangeError::OrderNotFound(message.to_string())
        } else if message.starts_with("EOrder:Insufficient funds") {
            ExchangeError::InsufficientBalance(message.to_string())
        } else if message.starts_with("EQuery:Unknown asset pair")
            || message.starts_with("EGeneral:Unknown asset pair")
        {
            ExchangeError::PairNotFound(message.to_string())
        } else if message.starts_with("EOrder:") {
            ExchangeError::OrderRejected(message.to_string())
        } else {
            ExchangeError::Unknown(message.to_string())
        }
    }

    /// 문자열에서 Decimal 파싱.
    fn parse_decimal(s: &str) -> Decimal {
        s.parse().unwrap_or(Decimal::ZERO)
    }

    /// Kraken 주문 상태 문자열을 내부 상태로 변환.
    fn map_status(status: &str) -> OrderStatus {
        match status {
            "pending" | "open" => OrderStatus::Open,
            "closed" => OrderStatus::Filled,
            "canceled" => OrderStatus::Canceled,
            "expired" => OrderStatus::Expired,
            _ => OrderStatus::Open,
        }
    }
}

#[async_trait]
impl ExchangeApi for KrakenExchange {
    fn name(&self) -> &str {
        "kraken"
    }

    fn maker_fee(&self) -> Decimal {
        dec!(0.0016)
    }

    fn taker_fee(&self) -> Decimal {
        dec!(0.0026)
    }

    async fn fetch_product(
        &self,
        trading_currency: &Currency,
        buying_currency: &Currency,
    ) -> ExchangeResult<Product> {
        let generic_pair = format!("{}{}", trading_currency, buying_currency);
        let requested = exchange_pair(&generic_pair).to_string();

        let result: HashMap<String, KrakenAssetPair> = self
            .public_get("/0/public/AssetPairs", &[("pair", requested)])
            .await?;

        // 응답 키가 Kraken의 정식 거래쌍 이름이다
        let (pair_id, info) = result
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::PairNotFound(generic_pair.clone()))?;

        let price_step = Decimal::new(1, info.pair_decimals);
        let amount_step = Decimal::new(1, info.lot_decimals);
        let min_amount = info
            .ordermin
            .as_deref()
            .map(Self::parse_decimal)
            .unwrap_or(amount_step);

        let limits = ProductLimits {
            min_amount,
            min_price: price_step,
            min_value: min_amount * price_step,
            price_step,
            amount_step,
        };

        Product::new(
            trading_currency.clone(),
            buying_currency.clone(),
            pair_id,
            limits,
        )
        .map_err(|e| ExchangeError::PairNotFound(e.to_string()))
    }

    async fn fetch_ticker(&self, product: &Product) -> ExchangeResult<TickerSnapshot> {
        let result: HashMap<String, KrakenTickerInfo> = self
            .public_get(
                "/0/public/Ticker",
                &[("pair", product.pair_id().to_string())],
            )
            .await?;

        let info = result
            .into_values()
            .next()
            .ok_or_else(|| ExchangeError::PairNotFound(product.pair_id().to_string()))?;

        let first = |v: &[String]| v.first().map(|s| Self::parse_decimal(s)).unwrap_or_default();

        Ok(TickerSnapshot {
            bid: first(&info.b),
            ask: first(&info.a),
            last: first(&info.c),
        })
    }

    async fn fetch_balances(&self) -> ExchangeResult<HashMap<Currency, Amount>> {
        let result: HashMap<String, String> = self.private_post("/0/private/Balance", &[]).await?;

        Ok(result
            .into_iter()
            .filter_map(|(native, balance)| {
                let amount = Self::parse_decimal(&balance);
                (amount > Decimal::ZERO)
                    .then(|| (Currency::new(generic_currency(&native.to_uppercase())), amount))
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
            ("pair", product.pair_id().to_string()),
            ("type", side.to_string()),
            ("ordertype", "limit".to_string()),
            ("price", price.to_string()),
            ("volume", amount.to_string()),
        ];

        info!(
            "placing {} limit order for {} {} @ {}",
            side,
            amount,
            product.pair_id(),
            price
        );

        let result: KrakenAddOrderResult = self.private_post("/0/private/AddOrder", &params).await?;

        let order_id = result
            .txid
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::Parse("missing txid in AddOrder result".to_string()))?;

        info!("order placed successfully: {}", order_id);

        Ok(OrderAck {
            order_id,
            status: OrderStatus::Open,
            filled_size: Decimal::ZERO,
            executed_value: None,
        })
    }

    async fn fetch_order(&self, _product: &Product, order_id: &str) -> ExchangeResult<OrderUpdate> {
        let result: HashMap<String, KrakenOrderInfo> = self
            .private_post("/0/private/QueryOrders", &[("txid", order_id.to_string())])
            .await?;

        let info = result
            .get(order_id)
            .ok_or_else(|| ExchangeError::OrderNotFound(order_id.to_string()))?;

        Ok(OrderUpdate {
            status: Self::map_status(&info.status),
            filled_size: Self::parse_decimal(&info.vol_exec),
            executed_value: info.cost.as_deref().map(Self::parse_decimal),
        })
    }

    async fn cancel_order(&self, _product: &Product, order_id: &str) -> ExchangeResult<()> {
        let _: serde_json::Value = self
            .private_post("/0/private/CancelOrder", &[("txid", order_id.to_string())])
            .await?;

        info!("order {} cancelled", order_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_mapping() {
        assert_eq!(exchange_currency("BTC"), "XXBT");
        assert_eq!(exchange_currency("EUR"), "ZEUR");
        // 테이블에 없는 코드는 그대로
        assert_eq!(exchange_currency("ADA"), "ADA");

        assert_eq!(generic_currency("XXBT"), "BTC");
        assert_eq!(generic_currency("ZUSD"), "USD");
        assert_eq!(generic_currency("ADA"), "ADA");
    }

    #[test]
    fn test_pair_mapping() {
        assert_eq!(exchange_pair("BTCEUR"), "XXBTZEUR");
        assert_eq!(exchange_pair("ETHUSD"), "XETHZUSD");
        assert_eq!(exchange_pair("ADAEUR"), "ADAEUR");
    }

    #[test]
    fn test_map_status() {
        assert_eq!(KrakenExchange::map_status("open"), OrderStatus::Open);
        assert_eq!(KrakenExchange::map_status("pending"), OrderStatus::Open);
        assert_eq!(KrakenExchange::map_status("closed"), OrderStatus::Filled);
        assert_eq!(KrakenExchange::map_status("canceled"), OrderStatus::Canceled);
        assert_eq!(KrakenExchange::map_status("expired"), OrderStatus::Expired);
    }

    #[test]
    fn test_map_error() {
        assert!(matches!(
            KrakenExchange::map_error("EAPI:Invalid key"),
            ExchangeError::Unauthorized(_)
        ));
        assert!(matches!(
            KrakenExchange::map_error("EOrder:Unknown order"),
            ExchangeError::OrderNotFound(_)
        ));
        assert!(matches!(
            KrakenExchange::map_error("EOrder:Insufficient funds"),
            ExchangeError::InsufficientBalance(_)
        ));
        assert!(matches!(
            KrakenExchange::map_error("EQuery:Unknown asset pair"),
            ExchangeError::PairNotFound(_)
        ));
        assert!(matches!(
            KrakenExchange::map_error("EOrder:Invalid price"),
            ExchangeError::OrderRejected(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_product_from_decimals() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/AssetPairs")
            .match_query(mockito::Matcher::UrlEncoded("pair".into(), "XXBTZEUR".into()))
            .with_status(200)
            .with_body(
                r#"{"error":[],"result":{"XXBTZEUR":{
                    "lot_decimals":8,"pair_decimals":1,"ordermin":"0.0001"}}}"#,
            )
            .create_async()
            .await;

        // "secret"의 base64
        let exchange = KrakenExchange::new(
            KrakenConfig::new("key", "c2VjcmV0").with_base_url(server.url()),
        )
        .unwrap();

        let product = exchange
            .fetch_product(&Currency::new("BTC"), &Currency::new("EUR"))
            .await
            .unwrap();

        assert_eq!(product.pair_id(), "XXBTZEUR");
        assert_eq!(product.limits().price_step, Decimal::new(1, 1));
        assert_eq!(product.limits().amount_step, Decimal::new(1, 8));
        assert_eq!(product.limits().min_amount, dec!(0.0001));
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/0/public/AssetPairs")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error":["EQuery:Unknown asset pair"]}"#)
            .create_async()
            .await;

        let exchange = KrakenExchange::new(
            KrakenConfig::new("key", "c2VjcmV0").with_base_url(server.url()),
        )
        .unwrap();

        let result = exchange
            .fetch_product(&Currency::new("BTC"), &Currency::new("EUR"))
            .await;
        assert!(matches!(result, Err(ExchangeError::PairNotFound(_))));
    }
}
