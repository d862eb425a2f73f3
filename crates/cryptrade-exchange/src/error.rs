//! 거래소 에러 타입.

use cryptrade_core::CryptradeError;
use thiserror::Error;

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("network error: {0}")]
    Network(String),

    /// 인증/권한 에러
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 요청 한도 초과
    #[error("rate limit exceeded")]
    RateLimited,

    /// 거래소 API 에러 코드
    #[error("api error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("parse error: {0}")]
    Parse(String),

    /// 거래쌍을 찾을 수 없음
    #[error("pair not found: {0}")]
    PairNotFound(String),

    /// 주문을 찾을 수 없음
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// 주문 거부됨
    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// 잘못된 주문 수량/가격
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// 잔고 부족
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// 타임아웃
    #[error("request timeout: {0}")]
    Timeout(String),

    /// 알 수 없는 에러
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl ExchangeError {
    /// 일시적이어서 다음 사이클에 회복될 수 있는 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::Network(_) | ExchangeError::RateLimited | ExchangeError::Timeout(_)
        )
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ExchangeError::Unauthorized(_))
    }

    /// 재시도하면 안 되는 에러인지 확인.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExchangeError::Unauthorized(_)
                | ExchangeError::InsufficientBalance(_)
                | ExchangeError::InvalidOrder(_)
                | ExchangeError::OrderRejected(_)
        )
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ExchangeError::Network(err.to_string())
        } else {
            ExchangeError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Parse(err.to_string())
    }
}

impl From<ExchangeError> for CryptradeError {
    fn from(err: ExchangeError) -> Self {
        match &err {
            ExchangeError::Unauthorized(_) => CryptradeError::Authentication(err.to_string()),
            ExchangeError::PairNotFound(_) => CryptradeError::Product(err.to_string()),
            _ => CryptradeError::Exchange(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ExchangeError::Network("timeout".to_string()).is_retryable());
        assert!(ExchangeError::RateLimited.is_retryable());
        assert!(!ExchangeError::Unauthorized("bad key".to_string()).is_retryable());
    }

    #[test]
    fn test_startup_error_mapping() {
        let err: CryptradeError = ExchangeError::Unauthorized("bad key".to_string()).into();
        assert!(matches!(err, CryptradeError::Authentication(_)));
        assert!(err.is_fatal());

        let err: CryptradeError = ExchangeError::PairNotFound("BTCEUR".to_string()).into();
        assert!(matches!(err, CryptradeError::Product(_)));

        let err: CryptradeError = ExchangeError::RateLimited.into();
        assert!(matches!(err, CryptradeError::Exchange(_)));
        assert!(!err.is_fatal());
    }
}
