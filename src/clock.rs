//! Time sources for command polling and long-operation wake-ups.

use crate::types::{Error, Result};
use alloc::vec::Vec;
use core::time::Duration;

/// Monotonic time plus the ability to wait.
pub trait Clock {
    fn now(&self) -> Duration;
    fn stall(&mut self, duration: Duration);
}

/// Registry of wake sources: periodic ticks and one-shot deadlines.
pub trait Timer {
    type Source: Copy + PartialEq + core::fmt::Debug;

    fn periodic(&mut self, interval: Duration) -> Result<Self::Source>;
    fn one_shot(&mut self, after: Duration) -> Result<Self::Source>;
    /// Blocks until one of SOURCES fires and returns which. When several
    /// are due at once, the earliest listed wins.
    fn wait_any(&mut self, sources: &[Self::Source]) -> Result<Self::Source>;
    fn release(&mut self, source: Self::Source);
}

/// Clock whose time only moves when somebody stalls on it.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }
    fn stall(&mut self, duration: Duration) {
        self.now += duration;
    }
}

#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self { origin: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
    fn stall(&mut self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

#[derive(Debug, Clone, Copy)]
struct Scheduled {
    due: Duration,
    period: Option<Duration>,
}

/// Timer that sleeps on a `Clock` until the earliest requested source is
/// due.
#[derive(Debug)]
pub struct ClockTimer<C: Clock> {
    clock: C,
    slots: Vec<Option<Scheduled>>,
}

impl<C: Clock> ClockTimer<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, slots: Vec::new() }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of sources registered and not yet released.
    pub fn active_sources(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn insert(&mut self, scheduled: Scheduled) -> usize {
        match self.slots.iter().position(|slot| slot.is_none()) {
            Some(index) => {
                self.slots[index] = Some(scheduled);
                index
            }
            None => {
                self.slots.push(Some(scheduled));
                self.slots.len() - 1
            }
        }
    }
}

impl<C: Clock> Timer for ClockTimer<C> {
    type Source = usize;

    fn periodic(&mut self, interval: Duration) -> Result<usize> {
        if interval.is_zero() {
            return Err(Error::InvalidParameter);
        }
        let due = self
            .clock
            .now()
            .checked_add(interval)
            .ok_or(Error::ArithmeticOverflow)?;
        Ok(self.insert(Scheduled { due, period: Some(interval) }))
    }

    fn one_shot(&mut self, after: Duration) -> Result<usize> {
        let due = self
            .clock
            .now()
            .checked_add(after)
            .ok_or(Error::ArithmeticOverflow)?;
        Ok(self.insert(Scheduled { due, period: None }))
    }

    fn wait_any(&mut self, sources: &[usize]) -> Result<usize> {
        let mut earliest: Option<(usize, Scheduled)> = None;
        for &source in sources {
            let scheduled = self
                .slots
                .get(source)
                .copied()
                .flatten()
                .ok_or(Error::InvalidParameter)?;
            match earliest {
                Some((_, best)) if best.due <= scheduled.due => {}
                _ => earliest = Some((source, scheduled)),
            }
        }
        let (source, scheduled) = earliest.ok_or(Error::InvalidParameter)?;
        if scheduled.due == Duration::MAX {
            // Every requested one-shot already fired; nothing will wake us.
            return Err(Error::InvalidParameter);
        }
        let now = self.clock.now();
        if scheduled.due > now {
            self.clock.stall(scheduled.due - now);
        }
        self.slots[source] = Some(match scheduled.period {
            Some(period) => Scheduled {
                due: scheduled.due.saturating_add(period),
                period: Some(period),
            },
            None => Scheduled { due: Duration::MAX, period: None },
        });
        Ok(source)
    }

    fn release(&mut self, source: usize) {
        if let Some(slot) = self.slots.get_mut(source) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn periodic_and_deadline_interleave() -> Result<()> {
        let mut timer = ClockTimer::new(ManualClock::new());
        let tick = timer.periodic(Duration::from_millis(40))?;
        let deadline = timer.one_shot(Duration::from_millis(100))?;
        assert!(timer.wait_any(&[deadline, tick])? == tick);
        assert!(timer.wait_any(&[deadline, tick])? == tick);
        assert!(timer.wait_any(&[deadline, tick])? == deadline);
        assert!(timer.clock().now() == Duration::from_millis(100));
        assert!(timer.wait_any(&[deadline, tick])? == tick);
        assert!(timer.clock().now() == Duration::from_millis(120));
        timer.release(tick);
        timer.release(deadline);
        assert!(timer.active_sources() == 0);
        Ok(())
    }

    #[test]
    fn released_sources_cannot_be_awaited() -> Result<()> {
        let mut timer = ClockTimer::new(ManualClock::new());
        let tick = timer.periodic(Duration::from_secs(1))?;
        timer.release(tick);
        assert!(matches!(
            timer.wait_any(&[tick]),
            Err(Error::InvalidParameter)
        ));
        Ok(())
    }

    #[test]
    fn slots_are_reused() -> Result<()> {
        let mut timer = ClockTimer::new(ManualClock::new());
        let first = timer.one_shot(Duration::from_secs(1))?;
        timer.release(first);
        let second = timer.periodic(Duration::from_secs(1))?;
        assert!(first == second);
        assert!(timer.active_sources() == 1);
        Ok(())
    }
}
