//! 거래 시스템의 에러 타입.

use thiserror::Error;

/// 핵심 거래 에러.
///
/// `Authentication`/`Product`/`Parameter`는 시작 시점에 발생하는 치명적
/// 에러로, 거래 루프에 진입하기 전에 프로세스를 중단시킵니다.
#[derive(Debug, Error)]
pub enum CryptradeError {
    /// 인증 에러 (잘못된 API 자격증명)
    #[error("authentication error: {0}")]
    Authentication(String),

    /// 지원되지 않는 거래쌍 또는 상품 메타데이터 조회 실패
    #[error("unsupported trade-pair: {0}")]
    Product(String),

    /// 잘못된 설정/파라미터
    #[error("invalid parameter(s): {0}")]
    Parameter(String),

    /// 거래소 통신 에러
    #[error("exchange error: {0}")]
    Exchange(String),

    /// 주문 처리 에러
    #[error("order error: {0}")]
    Order(String),
}

/// 거래 작업을 위한 Result 타입.
pub type CryptradeResult<T> = Result<T, CryptradeError>;

impl CryptradeError {
    /// 시작을 중단시켜야 하는 치명적 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CryptradeError::Authentication(_)
                | CryptradeError::Product(_)
                | CryptradeError::Parameter(_)
        )
    }
}

impl From<serde_json::Error> for CryptradeError {
    fn from(err: serde_json::Error) -> Self {
        CryptradeError::Parameter(err.to_string())
    }
}

impl From<config::ConfigError> for CryptradeError {
    fn from(err: config::ConfigError) -> Self {
        CryptradeError::Parameter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(CryptradeError::Authentication("bad key".to_string()).is_fatal());
        assert!(CryptradeError::Product("BTC/BTC".to_string()).is_fatal());
        assert!(CryptradeError::Parameter("delta".to_string()).is_fatal());

        assert!(!CryptradeError::Exchange("timeout".to_string()).is_fatal());
        assert!(!CryptradeError::Order("rejected".to_string()).is_fatal());
    }
}
