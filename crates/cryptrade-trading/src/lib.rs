//! 쌍주문 거래 루프.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `TradeSession`: 시세/계좌를 제자리 갱신하는 세션 (신선도 마커 포함)
//! - `LiveOrder`: 주문 제출/조회/취소를 구동하는 생명주기 드라이버
//! - `Trader`: 매수/매도 쌍주문 거래 루프
//! - `TickerFeed` / `TickerWindow`: 주기적 시세 폴링과 한정된 관찰 윈도우
//! - `Notifier`: 명시적으로 전달되는 알림 핸들

pub mod live_order;
pub mod monitor;
pub mod notify;
pub mod session;
pub mod trader;

pub use live_order::LiveOrder;
pub use monitor::{TickerFeed, TickerWindow};
pub use notify::{LogNotifier, Notifier};
pub use session::{Freshness, TradeSession};
pub use trader::{TradeReport, Trader};
