use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer<T> {
    id: TimerId,
    task: T,
    period: Option<Duration>,
}

/// Virtual-clock timer queue: one-shot and interval timers, fired in
/// deadline order, ties in the order they were armed.
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now: Duration,
    next_seq: u64,
    queue: BTreeMap<(Duration, u64), Timer<T>>,
    index: HashMap<TimerId, (Duration, u64)>,
}

impl<T: Clone> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            queue: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn set_timeout(&mut self, delay: Duration, task: T) -> TimerId {
        self.arm(delay, task, None)
    }

    pub fn set_interval(&mut self, period: Duration, task: T) -> TimerId {
        self.arm(period, task, Some(period))
    }

    fn arm(&mut self, delay: Duration, task: T, period: Option<Duration>) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = TimerId(seq);
        let key = (self.now + delay, seq);
        self.queue.insert(key, Timer { id, task, period });
        self.index.insert(id, key);
        id
    }

    /// Returns false when the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.index.remove(&id) {
            Some(key) => self.queue.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.index.clear();
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its deadline. Interval timers are re-armed under the same id.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerId, T)> {
        let key = *self.queue.keys().next()?;
        if key.0 > until {
            return None;
        }
        let timer = self.queue.remove(&key)?;
        self.index.remove(&timer.id);
        self.now = self.now.max(key.0);
        if let Some(period) = timer.period {
            let seq = self.next_seq;
            self.next_seq += 1;
            let next_key = (self.now + period, seq);
            self.index.insert(timer.id, next_key);
            self.queue.insert(
                next_key,
                Timer {
                    id: timer.id,
                    task: timer.task.clone(),
                    period: timer.period,
                },
            );
        }
        Some((timer.id, timer.task))
    }

    /// Move the clock forward without running anything.
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}
