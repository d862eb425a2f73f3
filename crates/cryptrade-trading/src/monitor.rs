//! 시세 모니터링.
//!
//! 멀티 거래소 모니터링 도구용 협력자:
//! - `TickerFeed`: 주기적으로 시세를 조회해 단일 소비자 채널로 보내는
//!   생산자. 소비자는 타임아웃을 지정해 다음 스냅샷을 기다립니다.
//! - `TickerWindow`: 시간 윈도우와 최대 샘플 수로 한정된 인메모리
//!   관찰 기록. 고가/저가/평균을 파생합니다. 그 이상의 이력 영속화는
//!   범위 밖입니다.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cryptrade_core::{Price, Product, TickerSnapshot};
use cryptrade_exchange::ExchangeApi;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// 주기적 시세 생산자.
///
/// 조회 실패는 기록만 하고 건너뜁니다. 소비자가 수신을 멈추면
/// 생산 태스크도 끝납니다.
pub struct TickerFeed {
    handle: JoinHandle<()>,
    receiver: mpsc::Receiver<TickerSnapshot>,
}

impl TickerFeed {
    /// 생산 태스크를 시작합니다.
    pub fn spawn(exchange: Arc<dyn ExchangeApi>, product: Product, interval: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            loop {
                match exchange.fetch_ticker(&product).await {
                    Ok(snapshot) => {
                        if sender.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!("ticker poll failed: {}", e),
                }
                tokio::time::sleep(interval).await;
            }
        });

        Self { handle, receiver }
    }

    /// 다음 스냅샷을 기다립니다. 타임아웃이나 피드 종료 시 `None`.
    pub async fn next(&mut self, timeout: Duration) -> Option<TickerSnapshot> {
        tokio::time::timeout(timeout, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for TickerFeed {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 기록된 시세 샘플.
#[derive(Debug, Clone, Copy)]
pub struct TickerSample {
    /// 기록 시각
    pub time: DateTime<Utc>,
    /// 시세 값
    pub snapshot: TickerSnapshot,
}

/// 한정된 시세 관찰 윈도우.
#[derive(Debug)]
pub struct TickerWindow {
    name: String,
    time_window: chrono::Duration,
    max_samples: usize,
    samples: VecDeque<TickerSample>,
}

impl TickerWindow {
    /// 새 윈도우를 생성합니다.
    ///
    /// `time_window`보다 오래된 샘플과 `max_samples`를 넘는 샘플은
    /// 새 기록 시점에 제거됩니다.
    pub fn new(name: impl Into<String>, time_window: Duration, max_samples: usize) -> Self {
        Self {
            name: name.into(),
            time_window: chrono::Duration::from_std(time_window)
                .unwrap_or(chrono::Duration::MAX),
            max_samples,
            samples: VecDeque::new(),
        }
    }

    /// 현재 시각으로 스냅샷을 기록합니다.
    pub fn record(&mut self, snapshot: TickerSnapshot) {
        self.record_at(Utc::now(), snapshot);
    }

    /// 지정된 시각으로 스냅샷을 기록합니다.
    pub fn record_at(&mut self, time: DateTime<Utc>, snapshot: TickerSnapshot) {
        while let Some(front) = self.samples.front() {
            if time - front.time > self.time_window {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        self.samples.push_back(TickerSample { time, snapshot });

        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// 윈도우 이름.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 보관 중인 샘플 수.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// 샘플이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 윈도우 내 최고 체결가.
    pub fn high(&self) -> Option<Price> {
        self.samples.iter().map(|s| s.snapshot.last).max()
    }

    /// 윈도우 내 최저 체결가.
    pub fn low(&self) -> Option<Price> {
        self.samples.iter().map(|s| s.snapshot.last).min()
    }

    /// 윈도우 내 평균 체결가.
    pub fn average(&self) -> Option<Price> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: Decimal = self.samples.iter().map(|s| s.snapshot.last).sum();
        Some(sum / Decimal::from(self.samples.len()))
    }
}

impl std::fmt::Display for TickerWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.samples.is_empty() {
            return Ok(());
        }
        writeln!(f, "TICKER {}", self.name)?;
        writeln!(f, "High   : {:.4}", self.high().unwrap_or_default())?;
        writeln!(f, "Low    : {:.4}", self.low().unwrap_or_default())?;
        write!(f, "Average: {:.4}", self.average().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cryptrade_core::Currency;
    use cryptrade_exchange::{SimulatedConfig, SimulatedExchange};
    use rust_decimal_macros::dec;

    fn snapshot(last: Decimal) -> TickerSnapshot {
        TickerSnapshot {
            bid: last - dec!(1),
            ask: last + dec!(1),
            last,
        }
    }

    #[test]
    fn test_window_aggregates() {
        let mut window = TickerWindow::new("test", Duration::from_secs(3600), 100);
        let base = Utc::now();

        window.record_at(base, snapshot(dec!(100)));
        window.record_at(base + chrono::Duration::seconds(1), snapshot(dec!(110)));
        window.record_at(base + chrono::Duration::seconds(2), snapshot(dec!(90)));

        assert_eq!(window.len(), 3);
        assert_eq!(window.high(), Some(dec!(110)));
        assert_eq!(window.low(), Some(dec!(90)));
        assert_eq!(window.average(), Some(dec!(100)));
    }

    #[test]
    fn test_time_window_eviction() {
        let mut window = TickerWindow::new("test", Duration::from_secs(60), 100);
        let base = Utc::now();

        window.record_at(base, snapshot(dec!(100)));
        // 윈도우 밖으로 밀려나는 기록
        window.record_at(base + chrono::Duration::seconds(120), snapshot(dec!(110)));

        assert_eq!(window.len(), 1);
        assert_eq!(window.high(), Some(dec!(110)));
    }

    #[test]
    fn test_max_samples_bound() {
        let mut window = TickerWindow::new("test", Duration::from_secs(3600), 2);
        let base = Utc::now();

        for i in 0..5 {
            window.record_at(
                base + chrono::Duration::seconds(i),
                snapshot(Decimal::from(100 + i)),
            );
        }

        assert_eq!(window.len(), 2);
        assert_eq!(window.low(), Some(dec!(103)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_delivers_snapshots() {
        let exchange = Arc::new(SimulatedExchange::new(
            SimulatedConfig::default().with_ticker(dec!(100), dec!(102), dec!(101)),
        ));
        let product = exchange
            .fetch_product(&Currency::new("BTC"), &Currency::new("EUR"))
            .await
            .unwrap();

        let mut feed = TickerFeed::spawn(exchange, product, Duration::from_secs(10));

        let snapshot = feed.next(Duration::from_secs(30)).await.unwrap();
        assert_eq!(snapshot.last, dec!(101));

        let snapshot = feed.next(Duration::from_secs(30)).await.unwrap();
        assert_eq!(snapshot.bid, dec!(100));
    }
}
