use std::collections::HashMap;
use std::time::{Duration, Instant};

#[macro_export]
macro_rules! start_timer {
    ($timer:expr, $hook:expr) => {{
        #[cfg(feature = "introspection")]
        $timer.start_timer($hook);
    }};
}

#[macro_export]
macro_rules! mark_timer {
    ($timer:expr, $hook:expr) => {{
        #[cfg(feature = "introspection")]
        $timer.mark_timer($hook);
    }};
}

/// Phases of the heap that can be timed separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerHook {
    RingSplice,
    ChildPromotion,
    Consolidate,
    PairwiseLink,
    Cut,
    CascadingCut,
}

#[derive(Clone)]
pub struct Timer {
    name: String,
    times: HashMap<TimerHook, (Duration, u64)>,
    running: HashMap<TimerHook, Instant>,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            times: HashMap::new(),
            running: HashMap::new(),
        }
    }

    #[inline]
    pub fn start_timer(&mut self, hook: TimerHook) {
        self.running.insert(hook, Instant::now());
    }

    /// Stops the running timer for `hook`; a mark without a matching start is ignored.
    #[inline]
    pub fn mark_timer(&mut self, hook: TimerHook) {
        if let Some(start) = self.running.remove(&hook) {
            let (total, count) = self.times.entry(hook).or_insert((Duration::ZERO, 0));
            *total += start.elapsed();
            *count += 1;
        }
    }

    /// Number of completed measurements for `hook`.
    pub fn samples(&self, hook: TimerHook) -> u64 {
        self.times.get(&hook).map_or(0, |&(_, count)| count)
    }

    /// Mean duration of `hook`, if it was ever measured.
    pub fn average(&self, hook: TimerHook) -> Option<Duration> {
        match self.times.get(&hook) {
            Some(&(total, count)) if count > 0 => Some(total / count as u32),
            _ => None,
        }
    }

    /// Folds the measurements of `other` into this timer.
    pub fn absorb(&mut self, other: &Timer) {
        for (&hook, &(total, count)) in other.times.iter() {
            let entry = self.times.entry(hook).or_insert((Duration::ZERO, 0));
            entry.0 += total;
            entry.1 += count;
        }
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Name: {}", self.name)?;
        let mut hooks: Vec<_> = self.times.keys().copied().collect();
        hooks.sort();
        for hook in hooks {
            if let Some(avg) = self.average(hook) {
                writeln!(f, "{:?}: {:?} over {} samples", hook, avg, self.samples(hook))?;
            }
        }
        Ok(())
    }
}
