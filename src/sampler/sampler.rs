//! # PositionSampler: periodic fixes as a stream.
//!
//! ```text
//! start(interval) ──► sampling task ──try_send──► SampleStream (futures::Stream)
//!                        │
//!                        ├─ tick (first one immediate, missed ticks delayed)
//!                        ├─ locator.current_position() under timeout
//!                        ├─ age check, range check
//!                        └─ events: SampleTaken | SampleFailed | SampleRejected | SampleDropped
//! ```
//!
//! ## Rules
//! - Failures never end the stream; the next tick tries again.
//! - One run at a time: `start` cancels the previous run.
//! - An acquisition that completes after `stop()` is discarded.
//! - A stream consumer that falls behind loses samples (`SampleDropped`),
//!   the sampler never waits for it.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::error::{PositionError, SamplerError};
use crate::events::{Bus, Event, EventKind};
use crate::geo::Position;
use crate::sampler::Locator;

/// Per-sample limits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerParams {
    /// Deadline for one fix.
    pub timeout: Duration,
    /// Oldest acceptable fix.
    pub max_age: Duration,
    /// Samples buffered for a slow stream consumer (clamped to at least 1).
    pub capacity: usize,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(30),
            capacity: 16,
        }
    }
}

/// Produces validated positions at a fixed cadence.
pub struct PositionSampler {
    locator: Arc<dyn Locator>,
    params: SamplerParams,
    bus: Bus,
    subject: Arc<str>,
    run: Mutex<Option<CancellationToken>>,
}

impl PositionSampler {
    /// Creates an idle sampler; events are tagged with `subject`.
    pub fn new(
        locator: Arc<dyn Locator>,
        params: SamplerParams,
        bus: Bus,
        subject: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            locator,
            params,
            bus,
            subject: subject.into(),
            run: Mutex::new(None),
        }
    }

    fn run(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts sampling every `interval`, replacing any current run.
    ///
    /// The first fix is requested immediately. Must be called inside a Tokio
    /// runtime.
    pub fn start(&self, interval: Duration) -> SampleStream {
        let token = CancellationToken::new();
        if let Some(prev) = self.run().replace(token.clone()) {
            prev.cancel();
        }

        let (tx, rx) = mpsc::channel(self.params.capacity.max(1));
        let ctx = SampleLoop {
            locator: Arc::clone(&self.locator),
            params: self.params,
            bus: self.bus.clone(),
            subject: Arc::clone(&self.subject),
        };
        tokio::spawn(ctx.run(interval.max(Duration::from_millis(1)), tx, token.clone()));

        SampleStream { rx, token }
    }

    /// Stops the current run; its stream ends. Idempotent.
    pub fn stop(&self) {
        if let Some(token) = self.run().take() {
            token.cancel();
        }
    }

    /// True while a run is active.
    pub fn is_running(&self) -> bool {
        self.run().as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

impl Drop for PositionSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Infinite stream of samples from one run.
///
/// Ends after [`PositionSampler::stop`] or a restart. Dropping it stops
/// the run.
pub struct SampleStream {
    rx: mpsc::Receiver<Position>,
    token: CancellationToken,
}

impl SampleStream {
    /// Stops the run that feeds this stream.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Stream for SampleStream {
    type Item = Position;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Position>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for SampleStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

enum Skip {
    Failed(SamplerError),
    Rejected(PositionError),
}

impl From<SamplerError> for Skip {
    fn from(e: SamplerError) -> Self {
        Skip::Failed(e)
    }
}

impl From<PositionError> for Skip {
    fn from(e: PositionError) -> Self {
        Skip::Rejected(e)
    }
}

struct SampleLoop {
    locator: Arc<dyn Locator>,
    params: SamplerParams,
    bus: Bus,
    subject: Arc<str>,
}

impl SampleLoop {
    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_subject(Arc::clone(&self.subject))
    }

    async fn run(self, period: Duration, tx: mpsc::Sender<Position>, token: CancellationToken) {
        let mut ticks = time::interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticks.tick() => {}
            }
            let outcome = select! {
                biased;
                _ = token.cancelled() => break,
                res = self.acquire() => res,
            };

            match outcome {
                Ok(position) => {
                    self.bus
                        .publish(self.event(EventKind::SampleTaken).with_position(position));
                    match tx.try_send(position) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            self.bus.publish(
                                self.event(EventKind::SampleDropped)
                                    .with_position(position)
                                    .with_reason("sample consumer behind"),
                            );
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => break,
                    }
                }
                Err(Skip::Failed(e)) => {
                    tracing::debug!(subject = %self.subject, error = %e, "location fix failed");
                    self.bus.publish(
                        self.event(EventKind::SampleFailed)
                            .with_error(e.as_label(), e.as_message()),
                    );
                }
                Err(Skip::Rejected(e)) => {
                    self.bus
                        .publish(self.event(EventKind::SampleRejected).with_reason(e.to_string()));
                }
            }
        }
    }

    async fn acquire(&self) -> Result<Position, Skip> {
        let SamplerParams {
            timeout, max_age, ..
        } = self.params;

        let fix = time::timeout(timeout, self.locator.current_position(max_age))
            .await
            .map_err(|_| SamplerError::Timeout { timeout })??;

        if let Ok(age) = SystemTime::now().duration_since(fix.captured_at) {
            if age > max_age {
                return Err(SamplerError::PositionUnavailable {
                    reason: format!("cached fix is {age:?} old (max {max_age:?})"),
                }
                .into());
            }
        }
        Ok(Position::new(fix.latitude, fix.longitude, fix.captured_at)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Fix;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::broadcast;
    use tokio::time::Instant;

    /// Plays back scripted results, then keeps returning a fix at (1, 1).
    #[derive(Default)]
    struct Scripted(StdMutex<VecDeque<Option<Result<Fix, SamplerError>>>>);

    impl Scripted {
        fn with(items: Vec<Option<Result<Fix, SamplerError>>>) -> Arc<Self> {
            Arc::new(Self(StdMutex::new(items.into())))
        }
    }

    #[async_trait]
    impl Locator for Scripted {
        async fn current_position(&self, _max_age: Duration) -> Result<Fix, SamplerError> {
            let next = self.0.lock().unwrap().pop_front();
            match next {
                Some(Some(res)) => res,
                // `None` entry: hang until the sampler gives up.
                Some(None) => std::future::pending().await,
                None => Ok(Fix::now(1.0, 1.0)),
            }
        }
    }

    fn sampler(locator: Arc<dyn Locator>, bus: &Bus) -> PositionSampler {
        PositionSampler::new(locator, SamplerParams::default(), bus.clone(), "technician/1")
    }

    async fn next_of(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
        loop {
            let ev = rx.recv().await.unwrap();
            if ev.kind == kind {
                return ev;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_sample_is_immediate_then_periodic() {
        let bus = Bus::new(64);
        let s = sampler(Scripted::with(vec![]), &bus);
        let start = Instant::now();
        let mut stream = s.start(Duration::from_secs(5));

        stream.next().await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(1500));

        let first = Instant::now();
        stream.next().await.unwrap();
        assert!(first.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_reported_and_sampling_continues() {
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let s = sampler(
            Scripted::with(vec![Some(Err(SamplerError::PermissionDenied))]),
            &bus,
        );
        let mut stream = s.start(Duration::from_secs(1));

        let ev = next_of(&mut events, EventKind::SampleFailed).await;
        assert_eq!(ev.label, Some("sampler_permission_denied"));
        assert_eq!(stream.next().await.unwrap().coords(), (1.0, 1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fix_times_out() {
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let s = sampler(Scripted::with(vec![None]), &bus);
        let _stream = s.start(Duration::from_secs(60));

        let ev = next_of(&mut events, EventKind::SampleFailed).await;
        assert_eq!(ev.label, Some("sampler_timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_fix_is_unavailable() {
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let old = Fix {
            latitude: 1.0,
            longitude: 1.0,
            captured_at: SystemTime::now() - Duration::from_secs(120),
        };
        let s = sampler(Scripted::with(vec![Some(Ok(old))]), &bus);
        let _stream = s.start(Duration::from_secs(1));

        let ev = next_of(&mut events, EventKind::SampleFailed).await;
        assert_eq!(ev.label, Some("sampler_position_unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_fix_is_never_streamed() {
        let bus = Bus::new(64);
        let mut events = bus.subscribe();
        let s = sampler(Scripted::with(vec![Some(Ok(Fix::now(91.0, 0.0)))]), &bus);
        let mut stream = s.start(Duration::from_secs(1));

        next_of(&mut events, EventKind::SampleRejected).await;
        assert_eq!(stream.next().await.unwrap().coords(), (1.0, 1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_stream_and_restart_begins_fresh() {
        let bus = Bus::new(64);
        let s = sampler(Scripted::with(vec![]), &bus);

        let mut first = s.start(Duration::from_secs(1));
        first.next().await.unwrap();
        s.stop();
        s.stop();
        assert!(!s.is_running());
        while first.next().await.is_some() {}

        let mut second = s.start(Duration::from_secs(1));
        assert!(s.is_running());
        second.next().await.unwrap();

        let mut third = s.start(Duration::from_secs(1));
        while second.next().await.is_some() {}
        third.next().await.unwrap();
    }
}
