use std::time::Instant;

/// Accumulating stopwatch for the tools' statistics.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Timer {
    pub total_time: u128,
    pub laps: usize,
    pub curr: Instant,
}

impl Default for Timer {
    fn default() -> Self {
        Self { total_time: 0, laps: 0, curr: Instant::now() }
    }
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn start(&mut self) {
        self.curr = Instant::now();
    }

    /// Ends the current lap and returns its duration in nanoseconds.
    #[inline(always)]
    pub fn stop(&mut self) -> u128 {
        let diff = self.curr.elapsed().as_nanos();
        self.total_time += diff;
        self.laps += 1;
        diff
    }

    pub fn total_ms(&self) -> f64 {
        self.total_time as f64 / 1_000_000.0
    }
}

#[test]
fn test_timer() {
    use std::{thread, time};

    let mut timer = Timer::new();

    timer.start();
    thread::sleep(time::Duration::from_millis(20));
    let lap = timer.stop();

    timer.start();
    thread::sleep(time::Duration::from_millis(10));
    timer.stop();

    assert!(lap >= 20_000_000);
    assert!(timer.total_time >= 30_000_000);
    assert_eq!(timer.laps, 2);
    assert!(timer.total_ms() >= 30.0);
}
