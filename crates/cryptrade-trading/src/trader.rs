//! 쌍주문 거래 루프.
//!
//! 사이클마다 시장가 아래 매수 주문과 위 매도 주문을 한 쌍 제출하고,
//! 한쪽이 최종 상태에 이를 때까지 고정 간격으로 조회한 뒤, 체결을
//! 기록하고 유닛을 재조정하고 남은 주문을 취소한 후 반복합니다.
//!
//! 유닛 재조정: 체결된 쪽의 유닛 수는 1 증가하고(재고가 풀렸으므로
//! 다음에 조금 더 크게), 반대쪽은 1 감소하되 `basic_units` 아래로는
//! 내려가지 않습니다. 한쪽에 연속 체결이 나면 그쪽이 커지고 반대쪽이
//! 줄어들어 전략이 균형 쪽으로 되돌아가는 자기 보정 편향이 생깁니다.

use std::sync::Arc;
use std::time::Duration;

use cryptrade_core::{
    Amount, Price, Side, TradeParameters, TransactionAccumulator,
};
use cryptrade_exchange::ExchangeApi;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::live_order::LiveOrder;
use crate::notify::Notifier;
use crate::session::{Freshness, TradeSession};

/// 세션 종료 시의 최종 결과.
#[derive(Debug, Clone)]
pub struct TradeReport {
    /// 매수 누계
    pub buying: TransactionAccumulator,
    /// 매도 누계
    pub selling: TransactionAccumulator,
    /// 순 결과: 매도 가치 − 매도 수수료 − 매수 가치 − 매수 수수료
    pub net_result: Decimal,
}

impl std::fmt::Display for TradeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.buying)?;
        writeln!(f, "{}", self.selling)?;
        write!(f, "Trading result: {:.2}", self.net_result)
    }
}

/// 쌍주문 거래 루프.
pub struct Trader {
    session: TradeSession,
    parameters: TradeParameters,
    notifier: Arc<dyn Notifier>,
    buying: TransactionAccumulator,
    selling: TransactionAccumulator,
    buy_units: u32,
    sell_units: u32,
}

impl Trader {
    /// 새 거래 루프를 생성합니다. 누계의 수수료율은 거래소의 메이커
    /// 수수료입니다 (지정가 주문만 사용하므로).
    pub fn new(
        session: TradeSession,
        parameters: TradeParameters,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let fee = session.exchange().maker_fee();
        let basic_units = parameters.basic_units;

        Self {
            session,
            parameters,
            notifier,
            buying: TransactionAccumulator::new("buy", Some(fee)),
            selling: TransactionAccumulator::new("sell", Some(fee)),
            buy_units: basic_units,
            sell_units: basic_units,
        }
    }

    /// 거래 세션.
    pub fn session(&self) -> &TradeSession {
        &self.session
    }

    /// 현재 매수 유닛 수.
    pub fn buy_units(&self) -> u32 {
        self.buy_units
    }

    /// 현재 매도 유닛 수.
    pub fn sell_units(&self) -> u32 {
        self.sell_units
    }

    /// 매수 누계.
    pub fn buying(&self) -> &TransactionAccumulator {
        &self.buying
    }

    /// 매도 누계.
    pub fn selling(&self) -> &TransactionAccumulator {
        &self.selling
    }

    /// 목표 매수 가격: `min(high_price, bid × (1 − delta))`.
    pub fn buy_price(&self) -> Price {
        let offset = self.session.ticker().bid() * (Decimal::ONE - self.parameters.delta);
        offset.min(self.parameters.high_price)
    }

    /// 목표 매도 가격: `max(low_price, ask × (1 + delta))`.
    pub fn sell_price(&self) -> Price {
        let offset = self.session.ticker().ask() * (Decimal::ONE + self.parameters.delta);
        offset.max(self.parameters.low_price)
    }

    /// 목표 매수 수량: 유닛 한도와 구매 통화 잔고 중 작은 쪽.
    pub fn buy_amount(&self, buy_price: Price) -> Amount {
        if buy_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let units = Decimal::from(self.buy_units) * self.parameters.basic_amount;
        let affordable = self
            .session
            .account()
            .available(self.session.product().buying_currency())
            / buy_price;
        units.min(affordable)
    }

    /// 목표 매도 수량: 유닛 한도와 거래 통화 잔고 중 작은 쪽.
    pub fn sell_amount(&self) -> Amount {
        let units = Decimal::from(self.sell_units) * self.parameters.basic_amount;
        let held = self
            .session
            .account()
            .available(self.session.product().trading_currency());
        units.min(held)
    }

    /// 거래 루프를 종료 조건까지 실행하고 최종 결과를 반환합니다.
    ///
    /// 루프는 매수/매도 어느 쪽 주문도 생성할 수 없을 때 (예: 양쪽 모두
    /// 잔고 부족) 끝납니다.
    pub async fn run(&mut self) -> TradeReport {
        let mut trading = true;
        while trading {
            trading = self.run_cycle().await;
        }

        let report = self.report();
        self.notifier.alert(
            "TRADING ABORTED! Trading result: ",
            &format!("{:.2}", report.net_result),
        );
        report
    }

    /// 한 사이클을 실행합니다. 거래를 계속해야 하면 `true`를 반환합니다.
    pub async fn run_cycle(&mut self) -> bool {
        // 1. 시세/계좌 갱신 (실패 시 이전 값 사용)
        if let Freshness::Stale(reason) = self.session.refresh_ticker().await {
            debug!("using stale ticker: {}", reason);
        }
        debug!("{}", self.session.ticker());

        if let Freshness::Stale(reason) = self.session.refresh_account().await {
            debug!("using stale account: {}", reason);
        }
        debug!("{}", self.session.account());

        let exchange = self.session.exchange().clone();
        let product = self.session.product().clone();

        // 2-4. 가격/수량 계산 후 매수, 매도 순으로 제출
        let buy_price = self.buy_price();
        let buy_amount = self.buy_amount(buy_price);
        let mut buy_order = LiveOrder::submit(
            exchange.clone(),
            &product,
            Side::Buy,
            buy_price,
            buy_amount,
        )
        .await;

        let sell_price = self.sell_price();
        let sell_amount = self.sell_amount();
        let mut sell_order =
            LiveOrder::submit(exchange, &product, Side::Sell, sell_price, sell_amount).await;

        // 5. 지속 정책: 양쪽 모두 실패면 중단, 한쪽만 실패면 설정에 따라
        //    단일 주문 모드로 계속
        let mut trading = true;
        let mut single_order = false;
        if !buy_order.created() && !sell_order.created() {
            trading = false;
        } else if !buy_order.created() || !sell_order.created() {
            trading = self.parameters.allow_empty_order;
            single_order = true;
        }

        // 6. 조회 루프: 한쪽이 최종 상태에 이르거나 단일 주문 대기 한도를
        //    넘길 때까지
        let mut check_orders = true;
        let mut total_wait = Duration::ZERO;
        while trading && check_orders {
            tokio::time::sleep(self.parameters.poll_interval()).await;
            total_wait += self.parameters.poll_interval();

            if single_order && total_wait > self.parameters.single_order_wait() {
                check_orders = false;
            }

            if sell_order.created() {
                if sell_order.poll().await {
                    check_orders = false;
                    self.record(Side::Sell, sell_order.order().filled_size, sell_order.order().executed_value);
                    self.notifier
                        .alert("SELL-ORDER FINISHED", &sell_order.order().to_string());
                } else if sell_order.order().error() {
                    debug!("{}", sell_order.order().message);
                }
            }

            if buy_order.created() {
                if buy_order.poll().await {
                    check_orders = false;
                    self.record(Side::Buy, buy_order.order().filled_size, buy_order.order().executed_value);
                    self.notifier
                        .alert("BUY-ORDER FINISHED", &buy_order.order().to_string());
                } else if buy_order.order().error() {
                    debug!("{}", buy_order.order().message);
                }
            }
        }

        // 7. 아직 열려 있는 주문 취소 (멱등, 최선 노력)
        buy_order.cancel().await;
        sell_order.cancel().await;

        debug!("{}\n{}", self.buying, self.selling);

        trading
    }

    /// 최종 결과를 계산합니다.
    pub fn report(&self) -> TradeReport {
        let net_result = self.selling.value() - self.selling.total_fee()
            - self.buying.value()
            - self.buying.total_fee();

        TradeReport {
            buying: self.buying.clone(),
            selling: self.selling.clone(),
            net_result,
        }
    }

    /// 체결을 기록하고 유닛을 재조정합니다. 체결 수량이 없으면 기록도
    /// 재조정도 하지 않습니다.
    fn record(&mut self, side: Side, filled_size: Amount, executed_value: Decimal) {
        if filled_size <= Decimal::ZERO {
            return;
        }

        match side {
            Side::Buy => self.buying.add(filled_size, executed_value, None),
            Side::Sell => self.selling.add(filled_size, executed_value, None),
        }
        self.rebalance(side);

        info!(
            "{} order filled: {} @ value {}",
            side, filled_size, executed_value
        );
    }

    /// 체결된 쪽은 유닛 1 증가, 반대쪽은 `basic_units`를 하한으로 1 감소.
    fn rebalance(&mut self, filled: Side) {
        match filled {
            Side::Sell => {
                self.sell_units += 1;
                if self.buy_units > self.parameters.basic_units {
                    self.buy_units -= 1;
                }
            }
            Side::Buy => {
                self.buy_units += 1;
                if self.sell_units > self.parameters.basic_units {
                    self.sell_units -= 1;
                }
            }
        }
    }
}
