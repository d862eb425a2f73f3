//! 시뮬레이션 거래소 위에서 거래 루프 시나리오를 검증하는 통합 테스트.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cryptrade_core::{Currency, ProductLimits, TradeParameters};
use cryptrade_exchange::{SimulatedConfig, SimulatedExchange};
use cryptrade_trading::{Notifier, TradeSession, Trader};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// 알림을 기록만 하는 테스트용 수신자.
#[derive(Default)]
struct RecordingNotifier {
    alerts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn titles(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, title: &str, _message: &str) {
        self.alerts.lock().unwrap().push(title.to_string());
    }
}

fn parameters() -> TradeParameters {
    TradeParameters {
        exchange: "simulated".to_string(),
        trading_currency: Currency::new("BTC"),
        buying_currency: Currency::new("EUR"),
        delta: dec!(0.01),
        basic_amount: dec!(0.01),
        basic_units: 1,
        low_price: Decimal::ZERO,
        high_price: dec!(1000000),
        allow_empty_order: false,
        poll_interval_secs: 15,
        single_order_wait_secs: 7200,
    }
}

async fn open_session(exchange: Arc<SimulatedExchange>) -> TradeSession {
    let mut session = TradeSession::open(
        exchange,
        &Currency::new("BTC"),
        &Currency::new("EUR"),
    )
    .await
    .unwrap();

    assert!(session.refresh_ticker().await.is_fresh());
    assert!(session.refresh_account().await.is_fresh());
    session
}

#[tokio::test]
async fn offset_prices_follow_bid_and_ask() {
    // bid=100, ask=102, delta=1% -> buy 99.00, sell 103.02
    let exchange = Arc::new(SimulatedExchange::new(
        SimulatedConfig::default().with_ticker(dec!(100), dec!(102), dec!(101)),
    ));
    let session = open_session(exchange).await;
    let trader = Trader::new(session, parameters(), Arc::new(RecordingNotifier::default()));

    assert_eq!(trader.buy_price(), dec!(99.00));
    assert_eq!(trader.sell_price(), dec!(103.02));
}

#[tokio::test]
async fn price_bounds_cap_the_offsets() {
    let exchange = Arc::new(SimulatedExchange::new(
        SimulatedConfig::default().with_ticker(dec!(100), dec!(102), dec!(101)),
    ));
    let session = open_session(exchange).await;

    let mut bounded = parameters();
    bounded.high_price = dec!(95);
    bounded.low_price = dec!(110);
    let trader = Trader::new(session, bounded, Arc::new(RecordingNotifier::default()));

    assert_eq!(trader.buy_price(), dec!(95));
    assert_eq!(trader.sell_price(), dec!(110));
}

#[tokio::test]
async fn buy_amount_is_capped_by_units_and_balance() {
    let exchange = Arc::new(SimulatedExchange::new(
        SimulatedConfig::default()
            .with_ticker(dec!(100), dec!(102), dec!(101))
            .with_balance("EUR", dec!(50)),
    ));
    let session = open_session(exchange).await;
    let trader = Trader::new(session, parameters(), Arc::new(RecordingNotifier::default()));

    // 유닛 한도가 더 작다: min(0.01, 50/99)
    assert_eq!(trader.buy_amount(dec!(99)), dec!(0.01));

    // 잔고가 더 작으면 잔고 쪽이 상한이 된다
    let exchange = Arc::new(SimulatedExchange::new(
        SimulatedConfig::default()
            .with_ticker(dec!(100), dec!(102), dec!(101))
            .with_balance("EUR", dec!(0.5)),
    ));
    let session = open_session(exchange).await;
    let trader = Trader::new(session, parameters(), Arc::new(RecordingNotifier::default()));

    assert_eq!(trader.buy_amount(dec!(99)), dec!(0.5) / dec!(99));
}

#[tokio::test(start_paused = true)]
async fn stops_on_first_cycle_when_no_order_can_be_created() {
    // 양쪽 모두 잔고 없음 -> 첫 사이클에 종료, 체결 누계 0
    let exchange = Arc::new(SimulatedExchange::new(SimulatedConfig::default()));
    let notifier = Arc::new(RecordingNotifier::default());
    let session = open_session(exchange.clone()).await;
    let mut trader = Trader::new(session, parameters(), notifier.clone());

    let report = trader.run().await;

    assert_eq!(report.buying.number(), 0);
    assert_eq!(report.selling.number(), 0);
    assert_eq!(report.net_result, Decimal::ZERO);
    assert_eq!(exchange.order_count().await, 0);
    assert_eq!(notifier.titles(), vec!["TRADING ABORTED! Trading result: "]);
}

#[tokio::test(start_paused = true)]
async fn single_order_without_empty_flag_stops_immediately() {
    // 매수만 생성 가능하고 allow_empty_order=false -> 조회 루프 없이 종료
    let exchange = Arc::new(SimulatedExchange::new(
        SimulatedConfig::default()
            .with_ticker(dec!(100), dec!(102), dec!(101))
            .with_balance("EUR", dec!(1000)),
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let session = open_session(exchange.clone()).await;
    let mut trader = Trader::new(session, parameters(), notifier.clone());

    let report = trader.run().await;

    // 주문 한 건이 제출되었다가 사이클 종료 시 취소된다
    assert_eq!(exchange.order_count().await, 1);
    assert_eq!(report.buying.number(), 0);
    assert_eq!(report.selling.number(), 0);
    // 체결 알림 없이 종료 알림만
    assert_eq!(notifier.titles(), vec!["TRADING ABORTED! Trading result: "]);
}

#[tokio::test(start_paused = true)]
async fn sell_fill_accumulates_and_rebalances() {
    // 매도만 생성 가능, 첫 조회에서 전량 체결
    let exchange = Arc::new(SimulatedExchange::new(
        SimulatedConfig::default()
            .with_ticker(dec!(99), dec!(100), dec!(100))
            .with_balance("BTC", dec!(0.02))
            .with_fill_after_polls(1),
    ));
    let notifier = Arc::new(RecordingNotifier::default());

    let mut p = parameters();
    p.basic_amount = dec!(0.02);
    p.allow_empty_order = true;

    let session = open_session(exchange.clone()).await;
    let mut trader = Trader::new(session, p, notifier.clone());

    let keep_trading = trader.run_cycle().await;
    assert!(keep_trading);

    // 매도 가격 100 × 1.01 = 101.00, 체결 가치 0.02 × 101 = 2.02
    assert_eq!(trader.selling().number(), 1);
    assert_eq!(trader.selling().amount(), dec!(0.02));
    assert_eq!(trader.selling().value(), dec!(2.02));
    // 수수료 = 체결 가치 × 0.005
    assert_eq!(trader.selling().total_fee(), dec!(2.02) * dec!(0.005));

    // 체결된 매도 쪽 +1, 매수 쪽은 하한(basic_units=1)에서 유지
    assert_eq!(trader.sell_units(), 2);
    assert_eq!(trader.buy_units(), 1);

    assert!(notifier.titles().contains(&"SELL-ORDER FINISHED".to_string()));

    // 잔고 이동: BTC 소진, EUR 수취
    assert_eq!(exchange.balance("BTC").await, Decimal::ZERO);
    assert_eq!(exchange.balance("EUR").await, dec!(2.02));
}

#[tokio::test(start_paused = true)]
async fn single_order_wait_bounds_the_exposure() {
    // 매도만 생성되고 체결은 영영 오지 않는다 -> 대기 한도 후 취소
    let exchange = Arc::new(SimulatedExchange::new(
        SimulatedConfig::default()
            .with_ticker(dec!(99), dec!(100), dec!(100))
            .with_balance("BTC", dec!(0.02)),
    ));
    let notifier = Arc::new(RecordingNotifier::default());

    let mut p = parameters();
    p.basic_amount = dec!(0.02);
    p.allow_empty_order = true;
    p.single_order_wait_secs = 30;

    let session = open_session(exchange.clone()).await;
    let mut trader = Trader::new(session, p, notifier.clone());

    let keep_trading = trader.run_cycle().await;

    // 한도 초과로 사이클이 끝났을 뿐 거래 자체는 계속된다
    assert!(keep_trading);
    assert_eq!(trader.selling().number(), 0);
    assert_eq!((trader.buy_units(), trader.sell_units()), (1, 1));
    // 체결 알림은 없다
    assert!(notifier.titles().is_empty());
    // 잔고는 그대로
    assert_eq!(exchange.balance("BTC").await, dec!(0.02));
}

#[tokio::test(start_paused = true)]
async fn trades_until_funds_are_exhausted() {
    // 사이클 1: 매도 체결. 사이클 2: 남은 자금으로는 최소 주문 가치를
    // 채울 수 없어 양쪽 모두 생성 실패 -> 종료.
    let limits = ProductLimits {
        min_amount: dec!(0.001),
        min_price: dec!(0.01),
        min_value: dec!(2.0),
        price_step: dec!(0.01),
        amount_step: dec!(0.0001),
    };
    let exchange = Arc::new(SimulatedExchange::new(
        SimulatedConfig::default()
            .with_limits(limits)
            .with_ticker(dec!(99), dec!(100), dec!(100))
            .with_balance("BTC", dec!(0.02))
            .with_fill_after_polls(1),
    ));
    let notifier = Arc::new(RecordingNotifier::default());

    let mut p = parameters();
    p.basic_amount = dec!(0.02);
    p.allow_empty_order = true;

    let session = open_session(exchange.clone()).await;
    let mut trader = Trader::new(session, p, notifier.clone());

    let report = trader.run().await;

    assert_eq!(report.selling.number(), 1);
    assert_eq!(report.selling.value(), dec!(2.02));
    assert_eq!(report.buying.number(), 0);
    // 순 결과 = 매도 가치 − 매도 수수료
    assert_eq!(report.net_result, dec!(2.02) - dec!(2.02) * dec!(0.005));

    let titles = notifier.titles();
    assert!(titles.contains(&"SELL-ORDER FINISHED".to_string()));
    assert_eq!(titles.last().unwrap(), "TRADING ABORTED! Trading result: ");
}
