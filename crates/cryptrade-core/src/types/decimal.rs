//! 정밀한 금융 계산을 위한 Decimal 유틸리티.

use rust_decimal::Decimal;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 주문 수량을 위한 타입.
pub type Amount = Decimal;

/// 값을 주어진 단위(step)의 배수로 내림합니다.
///
/// 결과는 절대 입력을 초과하지 않으며, 이미 단위의 배수인 값은 그대로
/// 유지됩니다(멱등). 단위가 0 이하이면 값을 그대로 반환합니다.
pub fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }

    (value / step).floor() * step
}
