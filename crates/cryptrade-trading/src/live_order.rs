//! 주문 생명주기 드라이버.
//!
//! 제출/조회/취소 과정에서 발생하는 거래소 실패는 예외로 던지지 않고
//! `Order`의 `created`/`error`/`message` 필드에 기록됩니다. 호출자는
//! 매 호출마다 에러 처리를 하는 대신 주문 상태만 검사합니다.

use std::sync::Arc;

use cryptrade_core::{Amount, Order, Price, Product, Side};
use cryptrade_exchange::{ExchangeApi, ExchangeError};
use tracing::{debug, warn};

/// 거래소에 제출된 (또는 제출에 실패한) 주문.
pub struct LiveOrder {
    exchange: Arc<dyn ExchangeApi>,
    product: Product,
    order: Order,
}

impl LiveOrder {
    /// 주문을 정규화해 제출합니다.
    ///
    /// 가격/수량은 상품 정밀도로 내림된 뒤 `Product::valid`로 검증됩니다.
    /// 검증 실패나 거래소 거부는 주문에 기록될 뿐 에러를 반환하지
    /// 않습니다. 실패한 주문은 호가창에 올라가지 않았으므로 즉시 최종
    /// 상태입니다.
    pub async fn submit(
        exchange: Arc<dyn ExchangeApi>,
        product: &Product,
        side: Side,
        price: Price,
        amount: Amount,
    ) -> Self {
        let price = product.format_price(price);
        let amount = product.format_amount(amount);
        let mut order = Order::new(side, price, amount);

        if !product.valid(amount, price) {
            order.reject("invalid amount/price for order");
        } else {
            match exchange.place_limit_order(product, side, price, amount).await {
                Ok(ack) => order.accept(ack),
                Err(e) => order.reject(format!("invalid order: {e}")),
            }
        }

        debug!("{}", order);

        Self {
            exchange,
            product: product.clone(),
            order,
        }
    }

    /// 추적 중인 주문.
    pub fn order(&self) -> &Order {
        &self.order
    }

    /// 제출이 성공했는지 확인합니다.
    pub fn created(&self) -> bool {
        self.order.created
    }

    /// 최종 상태에 도달했는지 확인합니다.
    pub fn settled(&self) -> bool {
        self.order.settled
    }

    /// 거래소에서 주문 상태를 조회해 반영하고, 최종 상태 여부를
    /// 반환합니다.
    ///
    /// 거래소가 주문을 찾지 못하면 체결 완료 또는 소멸로 간주해
    /// 최종 상태 처리합니다. 그 외 조회 실패는 기록만 하고 다음
    /// 조회에서 재시도됩니다.
    pub async fn poll(&mut self) -> bool {
        if !self.order.created || self.order.settled {
            return self.order.settled;
        }

        let order_id = self
            .order
            .order_id
            .clone()
            .expect("created order has an exchange id");

        match self.exchange.fetch_order(&self.product, &order_id).await {
            Ok(update) => self.order.apply(update),
            Err(ExchangeError::OrderNotFound(_)) => self.order.settle_not_found(),
            Err(e) => {
                self.order.note_error(format!("order update exception: {e}"));
                debug!("{}", self.order.message);
            }
        }

        self.order.settled
    }

    /// 주문을 취소합니다. 멱등이며 최선 노력으로 동작합니다.
    ///
    /// 이미 최종 상태면 아무 일도 하지 않습니다. 거래소 취소 실패는
    /// 기록만 하고 재시도하지 않습니다 (거래소가 이미 독자적으로
    /// 주문을 정산했을 수 있습니다).
    pub async fn cancel(&mut self) {
        let order_id = self.order.order_id.clone();

        if !self.order.mark_canceled() {
            return;
        }

        if let Some(order_id) = order_id {
            if let Err(e) = self.exchange.cancel_order(&self.product, &order_id).await {
                self.order.message = "cancellation failed".to_string();
                warn!("failed to cancel order {}: {}", order_id, e);
            }
        }
    }
}
