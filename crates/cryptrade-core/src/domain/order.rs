//! 주문 타입 및 생명주기.
//!
//! 이 모듈은 주문 관련 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderStatus` - 주문 상태
//! - `OrderAck` / `OrderUpdate` - 커넥터가 반환하는 응답 형태
//! - `Order` - 주문 엔티티 (상태 머신)
//!
//! 불변식: `settled == true`가 되면 상태/체결 수량/체결 가치는 더 이상
//! 변하지 않습니다.

use crate::types::{Amount, Price};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// 주문 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// 생성됨 (아직 제출되지 않음)
    Pending,
    /// 거래소 호가창에 등록됨 (부분 체결 포함)
    Open,
    /// 전량 체결됨
    Filled,
    /// 취소됨
    Canceled,
    /// 거래소에서 거부됨
    Rejected,
    /// 유효 기간 만료
    Expired,
    /// 제출/조회 실패
    Error,
}

impl OrderStatus {
    /// 최종 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::Error
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Open => write!(f, "open"),
            OrderStatus::Filled => write!(f, "filled"),
            OrderStatus::Canceled => write!(f, "canceled"),
            OrderStatus::Rejected => write!(f, "rejected"),
            OrderStatus::Expired => write!(f, "expired"),
            OrderStatus::Error => write!(f, "error"),
        }
    }
}

/// 주문 제출 성공 시 거래소가 반환하는 응답.
#[derive(Debug, Clone)]
pub struct OrderAck {
    /// 거래소가 부여한 주문 ID
    pub order_id: String,
    /// 제출 직후 상태
    pub status: OrderStatus,
    /// 제출 시점에 이미 체결된 수량
    pub filled_size: Amount,
    /// 체결 가치. 거래소가 보고하지 않으면 `None`
    pub executed_value: Option<Decimal>,
}

/// 주문 상태 조회 응답.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    /// 현재 상태
    pub status: OrderStatus,
    /// 체결된 수량
    pub filled_size: Amount,
    /// 체결 가치. 거래소가 보고하지 않으면 `None`
    pub executed_value: Option<Decimal>,
}

/// 한 사이클 동안 추적되는 주문 엔티티.
#[derive(Debug, Clone)]
pub struct Order {
    /// 내부 주문 ID
    pub id: Uuid,
    /// 주문 방향
    pub side: Side,
    /// 지정가 (상품 정밀도로 정규화된 값)
    pub price: Price,
    /// 주문 수량 (상품 정밀도로 정규화된 값)
    pub amount: Amount,
    /// 거래소 주문 ID
    pub order_id: Option<String>,
    /// 현재 상태
    pub status: OrderStatus,
    /// 체결된 수량
    pub filled_size: Amount,
    /// 체결 가치
    pub executed_value: Decimal,
    /// 최종 상태 도달 여부
    pub settled: bool,
    /// 제출 성공 여부
    pub created: bool,
    /// 사람이 읽을 수 있는 상태 메시지
    pub message: String,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 마지막 갱신 시각
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 제출 전 주문을 생성합니다.
    pub fn new(side: Side, price: Price, amount: Amount) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            side,
            price,
            amount,
            order_id: None,
            status: OrderStatus::Pending,
            filled_size: Decimal::ZERO,
            executed_value: Decimal::ZERO,
            settled: false,
            created: false,
            message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 제출 성공을 기록합니다.
    pub fn accept(&mut self, ack: OrderAck) {
        self.created = true;
        self.order_id = Some(ack.order_id);
        self.status = if ack.status == OrderStatus::Pending {
            OrderStatus::Open
        } else {
            ack.status
        };
        self.record_progress(ack.filled_size, ack.executed_value);
        self.settled = self.status.is_terminal();
        self.message = "order creation successful".to_string();
        self.updated_at = Utc::now();
    }

    /// 제출 실패를 기록합니다. 주문은 거래소 호가창에 올라가지 않았으므로
    /// 즉시 최종 상태가 됩니다.
    pub fn reject(&mut self, message: impl Into<String>) {
        self.created = false;
        self.order_id = None;
        self.status = OrderStatus::Error;
        self.filled_size = Decimal::ZERO;
        self.executed_value = Decimal::ZERO;
        self.settled = true;
        self.message = message.into();
        self.updated_at = Utc::now();
    }

    /// 상태 조회 결과를 반영합니다. 이미 최종 상태면 무시됩니다.
    pub fn apply(&mut self, update: OrderUpdate) {
        if self.settled {
            return;
        }

        self.status = update.status;
        self.record_progress(update.filled_size, update.executed_value);

        if self.status.is_terminal() {
            self.settled = true;
        }
        self.updated_at = Utc::now();
    }

    /// 조회 실패를 기록합니다. 최종 상태는 바꾸지 않습니다.
    pub fn note_error(&mut self, message: impl Into<String>) {
        if self.settled {
            return;
        }
        self.status = OrderStatus::Error;
        self.message = message.into();
        self.updated_at = Utc::now();
    }

    /// 거래소가 주문을 찾지 못한 경우를 기록합니다.
    ///
    /// 체결 완료 또는 소멸로 간주하고 보수적으로 최종 상태 처리합니다.
    /// 그렇지 않으면 조회 루프가 끝나지 않습니다.
    pub fn settle_not_found(&mut self) {
        if self.settled {
            return;
        }
        self.status = OrderStatus::Error;
        self.message = "order not found on exchange".to_string();
        self.settled = true;
        self.updated_at = Utc::now();
    }

    /// 취소를 기록합니다. 이미 최종 상태면 아무 일도 하지 않습니다.
    ///
    /// 상태가 바뀌었을 때만 `true`를 반환하므로, 호출자는 그 경우에만
    /// 거래소에 취소 요청을 보냅니다.
    pub fn mark_canceled(&mut self) -> bool {
        if self.settled {
            return false;
        }
        self.status = OrderStatus::Canceled;
        self.message = "order canceled by user".to_string();
        self.settled = true;
        self.updated_at = Utc::now();
        true
    }

    /// 제출/조회 실패 상태인지 확인합니다.
    pub fn error(&self) -> bool {
        self.status == OrderStatus::Error
    }

    /// 체결 수량이 있는지 확인합니다.
    pub fn has_fill(&self) -> bool {
        self.filled_size > Decimal::ZERO
    }

    /// 체결 수량/가치를 단조 증가로만 갱신합니다.
    ///
    /// 보고되지 않은 체결 가치는 지정가 기준 `filled_size × price`로
    /// 근사합니다.
    fn record_progress(&mut self, filled_size: Amount, executed_value: Option<Decimal>) {
        if filled_size > self.filled_size {
            self.filled_size = filled_size;
        }
        let value = executed_value.unwrap_or(self.filled_size * self.price);
        if value > self.executed_value {
            self.executed_value = value;
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Order:")?;
        writeln!(f, "Order ID      : {}", self.order_id.as_deref().unwrap_or("-"))?;
        writeln!(f, "Type          : {}", self.side)?;
        writeln!(f, "Price         : {}", self.price)?;
        writeln!(f, "Amount        : {:.4}", self.amount)?;
        writeln!(f, "Status        : {}", self.status)?;
        writeln!(f, "Filled Size   : {:.4}", self.filled_size)?;
        writeln!(f, "Executed Value: {:.4}", self.executed_value)?;
        writeln!(f, "Settled       : {}", self.settled)?;
        write!(f, "Message       : {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_order() -> Order {
        let mut order = Order::new(Side::Sell, dec!(100), dec!(0.02));
        order.accept(OrderAck {
            order_id: "abc-1".to_string(),
            status: OrderStatus::Open,
            filled_size: Decimal::ZERO,
            executed_value: None,
        });
        order
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_reject_settles_immediately() {
        let mut order = Order::new(Side::Buy, dec!(99), dec!(0.01));
        order.reject("invalid amount/price for order");

        assert!(!order.created);
        assert!(order.settled);
        assert!(order.error());
        assert_eq!(order.filled_size, Decimal::ZERO);
    }

    #[test]
    fn test_accept_retains_exchange_id() {
        let order = open_order();
        assert!(order.created);
        assert!(!order.settled);
        assert_eq!(order.order_id.as_deref(), Some("abc-1"));
        assert_eq!(order.status, OrderStatus::Open);
    }

    #[test]
    fn test_apply_is_monotonic() {
        let mut order = open_order();

        order.apply(OrderUpdate {
            status: OrderStatus::Open,
            filled_size: dec!(0.01),
            executed_value: None,
        });
        assert_eq!(order.filled_size, dec!(0.01));
        // 체결 가치 미보고 시 지정가 근사
        assert_eq!(order.executed_value, dec!(1.00));

        // 더 낮은 값은 무시된다
        order.apply(OrderUpdate {
            status: OrderStatus::Open,
            filled_size: dec!(0.005),
            executed_value: Some(dec!(0.5)),
        });
        assert_eq!(order.filled_size, dec!(0.01));
        assert_eq!(order.executed_value, dec!(1.00));
    }

    #[test]
    fn test_settled_freezes_state() {
        let mut order = open_order();
        order.apply(OrderUpdate {
            status: OrderStatus::Filled,
            filled_size: dec!(0.02),
            executed_value: Some(dec!(2.00)),
        });
        assert!(order.settled);

        order.apply(OrderUpdate {
            status: OrderStatus::Open,
            filled_size: dec!(0.03),
            executed_value: Some(dec!(3.00)),
        });
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_size, dec!(0.02));
        assert_eq!(order.executed_value, dec!(2.00));
    }

    #[test]
    fn test_not_found_settles() {
        let mut order = open_order();
        order.settle_not_found();
        assert!(order.settled);
        assert!(order.error());
    }

    #[test]
    fn test_cancel_idempotent() {
        let mut order = open_order();

        assert!(order.mark_canceled());
        assert!(order.settled);
        assert_eq!(order.status, OrderStatus::Canceled);

        // 두 번째 호출은 no-op, 상태는 동일
        assert!(!order.mark_canceled());
        assert_eq!(order.status, OrderStatus::Canceled);
        assert!(order.settled);
    }

    #[test]
    fn test_query_error_does_not_settle() {
        let mut order = open_order();
        order.note_error("get order exception: timeout");

        assert!(order.error());
        assert!(!order.settled);
    }
}
