//! 거래 상품(거래쌍) 및 주문 제약 조건.
//!
//! 상품은 세션 시작 시 거래소 메타데이터로부터 한 번 생성되며 이후
//! 불변입니다. 가격/수량 포매팅은 항상 내림(floor-to-step)으로,
//! 포매팅된 값이 요청 값을 초과하지 않도록 보장합니다.

use crate::error::{CryptradeError, CryptradeResult};
use crate::types::{floor_to_step, Amount, Currency, Price};
use rust_decimal::Decimal;
use std::fmt;

/// 거래소 메타데이터에서 읽어온 주문 제약 조건.
#[derive(Debug, Clone, Default)]
pub struct ProductLimits {
    /// 최소 주문 수량
    pub min_amount: Amount,
    /// 최소 주문 가격
    pub min_price: Price,
    /// 최소 주문 가치 (수량 × 가격)
    pub min_value: Decimal,
    /// 가격 호가 단위
    pub price_step: Decimal,
    /// 수량 단위
    pub amount_step: Decimal,
}

/// 거래 가능한 상품 (거래 통화 / 구매 통화 쌍).
#[derive(Debug, Clone)]
pub struct Product {
    trading_currency: Currency,
    buying_currency: Currency,
    pair_id: String,
    limits: ProductLimits,
}

impl Product {
    /// 새 상품을 생성합니다.
    ///
    /// # Errors
    /// 거래 통화와 구매 통화가 같으면 `CryptradeError::Product`를 반환합니다.
    pub fn new(
        trading_currency: Currency,
        buying_currency: Currency,
        pair_id: impl Into<String>,
        limits: ProductLimits,
    ) -> CryptradeResult<Self> {
        if trading_currency == buying_currency {
            return Err(CryptradeError::Product(
                "trading and buying currency cannot be the same".to_string(),
            ));
        }

        Ok(Self {
            trading_currency,
            buying_currency,
            pair_id: pair_id.into(),
            limits,
        })
    }

    /// 거래 통화(사고 파는 자산)를 반환합니다.
    pub fn trading_currency(&self) -> &Currency {
        &self.trading_currency
    }

    /// 구매 통화(결제 자산)를 반환합니다.
    pub fn buying_currency(&self) -> &Currency {
        &self.buying_currency
    }

    /// 거래소 고유 상품 식별자를 반환합니다.
    pub fn pair_id(&self) -> &str {
        &self.pair_id
    }

    /// 주문 제약 조건을 반환합니다.
    pub fn limits(&self) -> &ProductLimits {
        &self.limits
    }

    /// 수량/가격이 세 가지 최소 조건을 모두 만족하는지 확인합니다.
    ///
    /// 경계값 포함: `amount == min_amount`는 유효합니다.
    pub fn valid(&self, amount: Amount, price: Price) -> bool {
        amount >= self.limits.min_amount
            && price >= self.limits.min_price
            && amount * price >= self.limits.min_value
    }

    /// 가격을 호가 단위로 내림합니다. 결과는 입력 이하입니다.
    pub fn format_price(&self, price: Price) -> Price {
        floor_to_step(price, self.limits.price_step)
    }

    /// 수량을 수량 단위로 내림합니다. 결과는 입력 이하입니다.
    pub fn format_amount(&self, amount: Amount) -> Amount {
        floor_to_step(amount, self.limits.amount_step)
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.trading_currency, self.buying_currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn test_product() -> Product {
        Product::new(
            Currency::new("BTC"),
            Currency::new("EUR"),
            "BTCEUR",
            ProductLimits {
                min_amount: dec!(0.001),
                min_price: dec!(0.01),
                min_value: dec!(10),
                price_step: dec!(0.01),
                amount_step: dec!(0.0001),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_same_currency_rejected() {
        let result = Product::new(
            Currency::new("BTC"),
            Currency::new("btc"),
            "BTCBTC",
            ProductLimits::default(),
        );
        assert!(matches!(result, Err(CryptradeError::Product(_))));
    }

    #[test]
    fn test_valid_requires_all_thresholds() {
        let product = test_product();

        // 모든 조건 만족
        assert!(product.valid(dec!(0.01), dec!(10000)));
        // 경계값: amount == min_amount
        assert!(product.valid(dec!(0.001), dec!(10000)));

        // 조건 하나라도 위반하면 거부
        assert!(!product.valid(dec!(0.0009), dec!(10000))); // 수량 미달
        assert!(!product.valid(dec!(0.01), dec!(0.001))); // 가격 미달
        assert!(!product.valid(dec!(0.001), dec!(100))); // 가치 미달 (0.1 < 10)
    }

    #[test]
    fn test_format_price_floors() {
        let product = test_product();
        assert_eq!(product.format_price(dec!(99.999)), dec!(99.99));
        assert_eq!(product.format_price(dec!(99.99)), dec!(99.99));
    }

    #[test]
    fn test_format_amount_floors() {
        let product = test_product();
        assert_eq!(product.format_amount(dec!(0.12345)), dec!(0.1234));
    }

    proptest! {
        #[test]
        fn prop_format_never_increases(mantissa in 0i64..1_000_000_000_000i64, scale in 0u32..8) {
            let product = test_product();
            let value = Decimal::new(mantissa, scale);

            prop_assert!(product.format_price(value) <= value);
            prop_assert!(product.format_amount(value) <= value);
        }

        #[test]
        fn prop_format_idempotent(mantissa in 0i64..1_000_000_000_000i64, scale in 0u32..8) {
            let product = test_product();
            let value = Decimal::new(mantissa, scale);

            let price = product.format_price(value);
            prop_assert_eq!(product.format_price(price), price);

            let amount = product.format_amount(value);
            prop_assert_eq!(product.format_amount(amount), amount);
        }
    }
}
