//! cryptrade CLI.
//!
//! 선택한 거래소에서 지정 통화쌍으로 자동 거래합니다. 시장가보다
//! 지정 퍼센트만큼 아래/위에 매수·매도 주문 쌍을 만들고, 주문이
//! 체결되면 새 쌍을 만듭니다. 체결된 방향의 거래 유닛은 하나
//! 늘어나고 반대 방향은 하나 줄어듭니다.
//!
//! # 사용 예시
//!
//! ```bash
//! # Kraken에서 BTC/EUR, 시장가 ±1.5%, 기본 수량 0.001 BTC
//! cryptrade kraken btc
//!
//! # Binance에서 ETH/BTC, ±0.8%, 한쪽 주문 실패 허용
//! cryptrade binance eth -c btc -d 0.8 -e
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cryptrade_core::{
    init_logging, CredentialStore, Currency, LogConfig, LogFormat, TradeParameters,
};
use cryptrade_exchange::{create_exchange, ExchangeApi};
use cryptrade_trading::{LogNotifier, TradeSession, Trader};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

#[derive(Parser)]
#[command(name = "cryptrade")]
#[command(about = "Trade automatically on crypto exchanges in multiple currencies")]
#[command(version)]
struct Cli {
    /// 거래소 (binance, coinbase, kraken)
    exchange: String,

    /// 거래할 통화 (btc, eth, xrp, ltc, ...)
    currency: String,

    /// 구매에 사용할 (암호)통화
    #[arg(short = 'c', long, default_value = "eur")]
    buying_currency: String,

    /// 주문 전 시장가 대비 가격 변동 퍼센트 (0.0 < delta < 100.0)
    #[arg(short, long, default_value = "1.5")]
    delta: Decimal,

    /// 거래를 시작할 기본 수량 (btc>=0.001, eth>=0.01, xrp>=1)
    #[arg(short = 'a', long = "amount", default_value = "0.001")]
    basic_amount: Decimal,

    /// 거래를 시작할 기본 유닛 수 (> 0)
    #[arg(short = 'u', long = "units", default_value_t = 1)]
    basic_units: u32,

    /// 잔고 부족으로 한쪽 주문을 만들 수 없어도 거래 계속
    #[arg(short = 'e', long = "empty")]
    allow_empty_order: bool,

    /// 이 가격보다 높게 매수하지 않음
    #[arg(long, default_value = "1000000")]
    high_price: Decimal,

    /// 이 가격보다 낮게 매도하지 않음
    #[arg(long, default_value = "0")]
    low_price: Decimal,

    /// 주문 상태 조회 간격 (초)
    #[arg(long = "interval", default_value_t = 15)]
    poll_interval_secs: u64,

    /// 단일 주문 모드에서 취소 전 최대 대기 시간 (초)
    #[arg(long = "single-order-wait", default_value_t = 7200)]
    single_order_wait_secs: u64,

    /// 거래소별 API 자격증명 JSON 파일
    #[arg(long, default_value = "cryptrade.json")]
    credentials: PathBuf,

    /// 거래 파라미터를 CLI 인자 대신 TOML 파일에서 로드
    #[arg(long)]
    config: Option<PathBuf>,

    /// 로그 레벨 (off, error, warn, info, debug)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// 로그 형식 (pretty, json, compact)
    #[arg(long, default_value = "pretty")]
    log_format: String,
}

impl Cli {
    /// CLI 인자를 검증된 거래 파라미터로 변환합니다.
    fn to_parameters(&self) -> anyhow::Result<TradeParameters> {
        let parameters = TradeParameters {
            exchange: self.exchange.to_lowercase(),
            trading_currency: Currency::new(&self.currency),
            buying_currency: Currency::new(&self.buying_currency),
            // 퍼센트 입력을 비율로 변환
            delta: self.delta / dec!(100),
            basic_amount: self.basic_amount,
            basic_units: self.basic_units,
            low_price: self.low_price,
            high_price: self.high_price,
            allow_empty_order: self.allow_empty_order,
            poll_interval_secs: self.poll_interval_secs,
            single_order_wait_secs: self.single_order_wait_secs,
        };

        parameters.validate()?;
        Ok(parameters)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.parse().map_err(anyhow::Error::msg)?;
    let log_config = LogConfig::new(&cli.log_level).with_format(log_format);
    init_logging(&log_config).map_err(|e| anyhow::anyhow!("{e}"))?;

    let parameters = match &cli.config {
        Some(path) => TradeParameters::load(path)
            .with_context(|| format!("failed to load parameters from {}", path.display()))?,
        None => cli.to_parameters()?,
    };

    let credentials = CredentialStore::load(&cli.credentials)?;
    let exchange = create_exchange(&parameters.exchange, &credentials)?;

    let session = TradeSession::open(
        exchange,
        &parameters.trading_currency,
        &parameters.buying_currency,
    )
    .await?;

    info!(
        "trading {} on {}",
        session.product(),
        session.exchange().name()
    );

    let mut trader = Trader::new(session, parameters, Arc::new(LogNotifier));
    let report = trader.run().await;

    println!("{report}");
    Ok(())
}
