//! 통화 식별자.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 거래소 중립적인 통화 코드.
///
/// 코드는 항상 대문자로 정규화되며, 동등성은 이 일반 코드 기준입니다.
/// 거래소별 표기(예: Kraken의 `BTC` → `XXBT`)는 각 커넥터가 소유한
/// 매핑 테이블이 담당합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Currency(String);

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // 설정 파일의 소문자 코드도 정규화를 거치게 한다
        Ok(Currency::new(String::deserialize(deserializer)?))
    }
}

impl Currency {
    /// 새 통화 코드를 생성합니다.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().trim().to_uppercase())
    }

    /// 일반 코드 문자열을 반환합니다.
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
