//! 시뮬레이션 거래소.
//!
//! 네트워크 없이 `ExchangeApi`를 구현하는 인메모리 거래소입니다.
//! 거래 루프 테스트와 모의투자에 사용합니다. 체결은 설정된 정책
//! (N번째 상태 조회 후 전량 체결)이나 `fill_order` 호출로 일어나며,
//! 체결 시 잔고가 실제 거래소처럼 이동합니다.

use async_trait::async_trait;
use cryptrade_core::{
    Amount, Currency, OrderAck, OrderStatus, OrderUpdate, Price, Product, ProductLimits, Side,
    TickerSnapshot,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::traits::{ExchangeApi, ExchangeResult};
use crate::ExchangeError;

/// 시뮬레이션 거래소 설정.
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// 통화별 초기 잔고
    pub initial_balances: HashMap<Currency, Amount>,
    /// 모든 상품에 적용되는 주문 제약 조건
    pub limits: ProductLimits,
    /// 시작 시세
    pub ticker: TickerSnapshot,
    /// 메이커 수수료율
    pub maker_fee: Decimal,
    /// 테이커 수수료율
    pub taker_fee: Decimal,
    /// N번째 상태 조회에서 열린 주문을 전량 체결. `None`이면 수동 체결만
    pub fill_after_polls: Option<u32>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            initial_balances: HashMap::new(),
            limits: ProductLimits {
                min_amount: dec!(0.001),
                min_price: dec!(0.01),
                min_value: Decimal::ZERO,
                price_step: dec!(0.01),
                amount_step: dec!(0.0001),
            },
            ticker: TickerSnapshot {
                bid: dec!(100),
                ask: dec!(102),
                last: dec!(101),
            },
            maker_fee: dec!(0.005),
            taker_fee: dec!(0.005),
            fill_after_polls: None,
        }
    }
}

impl SimulatedConfig {
    /// 통화의 초기 잔고를 설정합니다.
    pub fn with_balance(mut self, currency: &str, amount: Amount) -> Self {
        self.initial_balances.insert(Currency::new(currency), amount);
        self
    }

    /// 시작 시세를 설정합니다.
    pub fn with_ticker(mut self, bid: Price, ask: Price, last: Price) -> Self {
        self.ticker = TickerSnapshot { bid, ask, last };
        self
    }

    /// 주문 제약 조건을 설정합니다.
    pub fn with_limits(mut self, limits: ProductLimits) -> Self {
        self.limits = limits;
        self
    }

    /// N번째 상태 조회에서 자동 체결하도록 설정합니다.
    pub fn with_fill_after_polls(mut self, polls: u32) -> Self {
        self.fill_after_polls = Some(polls);
        self
    }
}

/// 추적 중인 주문 상태.
#[derive(Debug, Clone)]
struct SimOrder {
    side: Side,
    price: Price,
    amount: Amount,
    trading_currency: Currency,
    buying_currency: Currency,
    status: OrderStatus,
    filled_size: Amount,
    executed_value: Decimal,
    polls: u32,
}

impl SimOrder {
    fn to_update(&self) -> OrderUpdate {
        OrderUpdate {
            status: self.status,
            filled_size: self.filled_size,
            executed_value: Some(self.executed_value),
        }
    }
}

/// 내부 상태.
#[derive(Debug, Default)]
struct SimState {
    balances: HashMap<Currency, Amount>,
    orders: HashMap<String, SimOrder>,
    ticker: Option<TickerSnapshot>,
    next_id: u64,
}

/// 시뮬레이션 거래소.
pub struct SimulatedExchange {
    config: SimulatedConfig,
    state: RwLock<SimState>,
}

impl SimulatedExchange {
    /// 새 시뮬레이션 거래소를 생성합니다.
    pub fn new(config: SimulatedConfig) -> Self {
        let state = SimState {
            balances: config.initial_balances.clone(),
            ticker: Some(config.ticker),
            ..Default::default()
        };

        Self {
            config,
            state: RwLock::new(state),
        }
    }

    /// 시세를 변경합니다.
    pub async fn set_ticker(&self, snapshot: TickerSnapshot) {
        self.state.write().await.ticker = Some(snapshot);
    }

    /// 열린 주문을 전량 체결시킵니다 (스크립트 체결).
    pub async fn fill_order(&self, order_id: &str) -> ExchangeResult<()> {
        let mut state = self.state.write().await;
        Self::fill(&mut state, order_id)
    }

    /// 통화의 현재 잔고를 반환합니다.
    pub async fn balance(&self, currency: &str) -> Amount {
        self.state
            .read()
            .await
            .balances
            .get(&Currency::new(currency))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// 추적 중인 주문 수를 반환합니다.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    fn fill(state: &mut SimState, order_id: &str) -> ExchangeResult<()> {
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| ExchangeError::OrderNotFound(order_id.to_string()))?;

        if order.status.is_terminal() {
            return Ok(());
        }

        order.filled_size = order.amount;
        order.executed_value = order.amount * order.price;
        order.status = OrderStatus::Filled;

        let (trading, buying) = (order.trading_currency.clone(), order.buying_currency.clone());
        let (amount, value, side) = (order.filled_size, order.executed_value, order.side);

        let entry = |balances: &mut HashMap<Currency, Amount>, c: Currency, delta: Decimal| {
            let balance = balances.entry(c).or_insert(Decimal::ZERO);
            *balance += delta;
        };

        match side {
            Side::Sell => {
                entry(&mut state.balances, trading, -amount);
                entry(&mut state.balances, buying, value);
            }
            Side::Buy => {
                entry(&mut state.balances, buying, -value);
                entry(&mut state.balances, trading, amount);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ExchangeApi for SimulatedExchange {
    fn name(&self) -> &str {
        "simulated"
    }

    fn maker_fee(&self) -> Decimal {
        self.config.maker_fee
    }

    fn taker_fee(&self) -> Decimal {
        self.config.taker_fee
    }

    async fn fetch_product(
        &self,
        trading_currency: &Currency,
        buying_currency: &Currency,
    ) -> ExchangeResult<Product> {
        Product::new(
            trading_currency.clone(),
            buying_currency.clone(),
            format!("{}{}", trading_currency, buying_currency),
            self.config.limits.clone(),
        )
        .map_err(|e| ExchangeError::PairNotFound(e.to_string()))
    }

    async fn fetch_ticker(&self, _product: &Product) -> ExchangeResult<TickerSnapshot> {
        self.state
            .read()
            .await
            .ticker
            .ok_or_else(|| ExchangeError::Network("no ticker available".to_string()))
    }

    async fn fetch_balances(&self) -> ExchangeResult<HashMap<Currency, Amount>> {
        let state = self.state.read().await;
        Ok(state
            .balances
            .iter()
            .filter(|(_, amount)| **amount > Decimal::ZERO)
            .map(|(c, amount)| (c.clone(), *amount))
            .collect())
    }

    async fn place_limit_order(
        &self,
        product: &Product,
        side: Side,
        price: Price,
        amount: Amount,
    ) -> ExchangeResult<OrderAck> {
        let mut state = self.state.write().await;

        // 실제 거래소처럼 주문 접수 시점에 잔고를 검사한다
        let required = match side {
            Side::Buy => (product.buying_currency().clone(), amount * price),
            Side::Sell => (product.trading_currency().clone(), amount),
        };
        let available = state
            .balances
            .get(&required.0)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if available < required.1 {
            return Err(ExchangeError::InsufficientBalance(format!(
                "need {} {}, have {}",
                required.1, required.0, available
            )));
        }

        state.next_id += 1;
        let order_id = format!("sim-{}", state.next_id);

        state.orders.insert(
            order_id.clone(),
            SimOrder {
                side,
                price,
                amount,
                trading_currency: product.trading_currency().clone(),
                buying_currency: product.buying_currency().clone(),
                status: OrderStatus::Open,
                filled_size: Decimal::ZERO,
                executed_value: Decimal::ZERO,
                polls: 0,
            },
        );

        Ok(OrderAck {
            order_id,
            status: OrderStatus::Open,
            filled_size: Decimal::ZERO,
            executed_value: None,
        })
    }

    async fn fetch_order(&self, _product: &Product, order_id: &str) -> ExchangeResult<OrderUpdate> {
        let mut state = self.state.write().await;

        let polls = {
            let order = state
                .orders
                .get_mut(order_id)
                .ok_or_else(|| ExchangeError::OrderNotFound(order_id.to_string()))?;
            order.polls += 1;
            order.polls
        };

        if let Some(threshold) = self.config.fill_after_polls {
            if polls >= threshold {
                Self::fill(&mut state, order_id)?;
            }
        }

        Ok(state.orders[order_id].to_update())
    }

    async fn cancel_order(&self, _product: &Product, order_id: &str) -> ExchangeResult<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| ExchangeError::OrderNotFound(order_id.to_string()))?;

        if !order.status.is_terminal() {
            order.status = OrderStatus::Canceled;
        }
        Ok(())
    }
}
