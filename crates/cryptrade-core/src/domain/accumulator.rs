//! 체결 누계.

use crate::types::Amount;
use rust_decimal::Decimal;
use std::fmt;

/// 한 방향(매수 또는 매도)의 체결 누계.
///
/// 세션 동안 단조 증가하며 리셋되지 않습니다. 순수 부기용으로 I/O와
/// 실패 경로가 없습니다.
#[derive(Debug, Clone)]
pub struct TransactionAccumulator {
    name: String,
    fee_rate: Option<Decimal>,
    number: u64,
    amount: Amount,
    value: Decimal,
    total_fee: Decimal,
}

impl TransactionAccumulator {
    /// 새 누계를 생성합니다. `fee_rate`는 체결 가치에 곱해지는 수수료율.
    pub fn new(name: impl Into<String>, fee_rate: Option<Decimal>) -> Self {
        Self {
            name: name.into(),
            fee_rate,
            number: 0,
            amount: Decimal::ZERO,
            value: Decimal::ZERO,
            total_fee: Decimal::ZERO,
        }
    }

    /// 체결 한 건을 기록합니다.
    ///
    /// `fee_override`가 주어지면 그 값으로, 아니면 설정된 수수료율로,
    /// 둘 다 없으면 0으로 `executed_value × fee`를 누적합니다.
    pub fn add(&mut self, filled_size: Amount, executed_value: Decimal, fee_override: Option<Decimal>) {
        self.number += 1;
        self.amount += filled_size;
        self.value += executed_value;

        if let Some(fee) = fee_override.or(self.fee_rate) {
            self.total_fee += executed_value * fee;
        }
    }

    /// 누계 이름 (예: "buy", "sell").
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 기록된 체결 건수.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// 체결 수량 합계.
    pub fn amount(&self) -> Amount {
        self.amount
    }

    /// 체결 가치 합계.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// 수수료 합계.
    pub fn total_fee(&self) -> Decimal {
        self.total_fee
    }
}

impl fmt::Display for TransactionAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TRANSACTIONS {}", self.name)?;
        writeln!(f, "Number  : {}", self.number)?;
        writeln!(f, "Amount  : {:.4}", self.amount)?;
        writeln!(f, "Value   : {:.2}", self.value)?;
        write!(f, "Fee     : {:.2}", self.total_fee)
    }
}
