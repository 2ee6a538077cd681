//! 定时回调调度
//!
//! 驱动在初始化时注册一个无参数、无返回值的回调，由调度器按固定周期调用。
//! [`ThreadScheduler`] 为每个回调启动一个后台线程；[`ManualScheduler`] 由调用方
//! 自行驱动，适合已有主循环的场景。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_timers::clock::Clock;

/// 定时回调
pub type PeriodicCallback = Box<dyn FnMut() + Send + 'static>;

/// 定时回调调度器
pub trait Scheduler {
    /// 注册一个按`period`周期调用的回调
    fn register_periodic_callback(
        &mut self,
        period: Duration,
        callback: PeriodicCallback,
    ) -> anyhow::Result<PeriodicHandle>;
}

/// 已注册回调的句柄，停止或丢弃后回调不再被调用
#[derive(Debug)]
pub struct PeriodicHandle {
    stopped: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PeriodicHandle {
    /// 创建句柄，`thread`为执行回调的后台线程（如有）
    pub fn new(stopped: Arc<AtomicBool>, thread: Option<JoinHandle<()>>) -> Self {
        Self { stopped, thread }
    }

    /// 回调是否已停止
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// 停止回调并等待后台线程退出
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);

        if let Some(thread) = self.thread.take() {
            // 回调内部丢弃句柄时不能join自己
            if thread.thread().id() == thread::current().id() {
                return;
            }
            thread.thread().unpark();
            if thread.join().is_err() {
                log::error!("定时回调线程异常退出");
            }
        }
    }
}

impl Drop for PeriodicHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 后台线程调度器
///
/// 调用时刻固定为`start + n * period`，单次回调超时不会让后续时刻整体后移
pub struct ThreadScheduler<C> {
    clock: C,
    name: String,
}

impl<C> ThreadScheduler<C>
where
    C: Clock + Clone + Send + 'static,
    C::Instant: Copy + Send,
{
    /// 创建调度器，`name`用作后台线程名前缀
    pub fn new(clock: C, name: impl Into<String>) -> Self {
        Self {
            clock,
            name: name.into(),
        }
    }
}

impl<C> Scheduler for ThreadScheduler<C>
where
    C: Clock + Clone + Send + 'static,
    C::Instant: Copy + Send,
{
    fn register_periodic_callback(
        &mut self,
        period: Duration,
        mut callback: PeriodicCallback,
    ) -> anyhow::Result<PeriodicHandle> {
        if period.is_zero() {
            return Err(anyhow::anyhow!("定时回调周期不能为0"));
        }

        let stopped = Arc::new(AtomicBool::new(false));
        let thread_stopped = stopped.clone();
        let clock = self.clock.clone();

        let thread = thread::Builder::new()
            .name(format!("{}-{}ms", self.name, period.as_millis()))
            .spawn(move || {
                let start = clock.now();
                let mut rate = FixedRate::new(period);

                while !thread_stopped.load(Ordering::Acquire) {
                    callback();

                    // 等待下一个调用时刻，stop()会唤醒线程
                    let deadline = rate.advance();
                    loop {
                        if thread_stopped.load(Ordering::Acquire) {
                            return;
                        }
                        let elapsed = clock.elapsed(start);
                        if elapsed >= deadline {
                            break;
                        }
                        thread::park_timeout(deadline - elapsed);
                    }
                }
            })?;

        log::debug!("已注册定时回调, 周期: {:?}", period);

        // OK
        Ok(PeriodicHandle::new(stopped, Some(thread)))
    }
}

/// 固定频率调用时刻，相对启动时刻按周期累加，不会回绕
#[derive(Debug, Clone, Copy)]
struct FixedRate {
    period: Duration,
    next: Duration,
}

impl FixedRate {
    fn new(period: Duration) -> Self {
        Self {
            period,
            next: Duration::ZERO,
        }
    }

    /// 下一个调用时刻
    fn advance(&mut self) -> Duration {
        self.next = self.next.saturating_add(self.period);
        self.next
    }
}

/// 手动调度器，每次`tick()`把所有未停止的回调各调用一次
#[derive(Default)]
pub struct ManualScheduler {
    callbacks: Vec<(Duration, Arc<AtomicBool>, PeriodicCallback)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 调用一轮回调，返回实际调用的个数
    pub fn tick(&mut self) -> usize {
        // 顺便清理已停止的回调
        self.callbacks
            .retain(|(_, stopped, _)| !stopped.load(Ordering::Acquire));

        for (_, _, callback) in self.callbacks.iter_mut() {
            callback();
        }

        self.callbacks.len()
    }

    /// 已注册回调的周期
    pub fn periods(&self) -> Vec<Duration> {
        self.callbacks.iter().map(|(period, _, _)| *period).collect()
    }
}

impl Scheduler for ManualScheduler {
    fn register_periodic_callback(
        &mut self,
        period: Duration,
        callback: PeriodicCallback,
    ) -> anyhow::Result<PeriodicHandle> {
        let stopped = Arc::new(AtomicBool::new(false));
        self.callbacks.push((period, stopped.clone(), callback));

        // OK
        Ok(PeriodicHandle::new(stopped, None))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::std_clock::StdClock;

    #[test]
    fn manual_scheduler_runs_until_stopped() {
        let mut scheduler = ManualScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let mut handle = scheduler
            .register_periodic_callback(
                Duration::from_millis(20),
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        assert_eq!(scheduler.periods(), vec![Duration::from_millis(20)]);
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.stop();
        assert!(handle.is_stopped());
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn thread_scheduler_calls_back_and_stops_on_drop() {
        let mut scheduler = ThreadScheduler::new(StdClock::new(), "test");
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let handle = scheduler
            .register_periodic_callback(
                Duration::from_millis(2),
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        drop(handle);
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "only {} callbacks ran", after_stop);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn fixed_rate_keeps_growing_past_u32_ticks() {
        let period = Duration::from_millis(20);
        let mut rate = FixedRate::new(period);
        assert_eq!(rate.advance(), period);
        assert_eq!(rate.advance(), period * 2);

        // 约2.7年后的第2^32个周期
        rate.next = period * u32::MAX;
        let deadline = rate.advance();
        assert_eq!(deadline, period * u32::MAX + period);
        assert!(rate.advance() > deadline);
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut scheduler = ThreadScheduler::new(StdClock::new(), "test");
        assert!(
            scheduler
                .register_periodic_callback(Duration::ZERO, Box::new(|| {}))
                .is_err()
        );
    }
}
