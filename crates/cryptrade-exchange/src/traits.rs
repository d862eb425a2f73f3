//! 거래소 trait 정의.

use async_trait::async_trait;
use cryptrade_core::{Amount, Currency, OrderAck, OrderUpdate, Price, Product, Side, TickerSnapshot};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 통합 거래소 인터페이스.
///
/// 거래소별 요청/응답 형태는 각 커넥터 안에 격리되며, 이 trait은
/// 공통 도메인 타입(`Product`/`TickerSnapshot`/`OrderAck` 등)만
/// 주고받습니다. 일반 통화 코드 → 거래소 고유 식별자 변환은 각
/// 커넥터가 소유한 정적 매핑 테이블이 담당합니다.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// 거래소 이름.
    fn name(&self) -> &str;

    /// 지정가(메이커) 주문 수수료율.
    fn maker_fee(&self) -> Decimal;

    /// 시장가(테이커) 주문 수수료율.
    fn taker_fee(&self) -> Decimal;

    /// 거래소 메타데이터로부터 상품과 주문 제약 조건을 조회합니다.
    async fn fetch_product(
        &self,
        trading_currency: &Currency,
        buying_currency: &Currency,
    ) -> ExchangeResult<Product>;

    /// 상품의 현재 시세를 조회합니다.
    async fn fetch_ticker(&self, product: &Product) -> ExchangeResult<TickerSnapshot>;

    /// 통화별 사용 가능 잔고를 조회합니다.
    async fn fetch_balances(&self) -> ExchangeResult<HashMap<Currency, Amount>>;

    /// 지정가 주문을 제출합니다.
    ///
    /// 가격/수량은 호출자가 이미 상품 정밀도로 정규화한 값이어야 합니다.
    async fn place_limit_order(
        &self,
        product: &Product,
        side: Side,
        price: Price,
        amount: Amount,
    ) -> ExchangeResult<OrderAck>;

    /// 주문 상태를 조회합니다.
    ///
    /// 거래소가 주문을 찾지 못하면 `ExchangeError::OrderNotFound`를
    /// 반환해야 합니다. 호출자는 이를 최종 상태로 취급합니다.
    async fn fetch_order(&self, product: &Product, order_id: &str) -> ExchangeResult<OrderUpdate>;

    /// 주문 취소를 요청합니다. 최선 노력(best-effort)으로 동작합니다.
    async fn cancel_order(&self, product: &Product, order_id: &str) -> ExchangeResult<()>;
}
