//! Trading strategies driven by the replay loop.

use crate::model::{MarketSnapshot, StrategyConfig};
use std::collections::VecDeque;

pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Called once per snapshot; returns the signed target position
    /// (positive long, negative short, zero flat).
    fn on_snapshot(&mut self, snapshot: &MarketSnapshot) -> i64;
}

/// Simple moving average over a fixed window.
struct RollingMean {
    window: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl RollingMean {
    fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::new(),
            sum: 0.0,
        }
    }

    fn push(&mut self, v: f64) {
        self.values.push_back(v);
        self.sum += v;
        if self.values.len() > self.window {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
    }

    fn value(&self) -> Option<f64> {
        if self.values.len() < self.window {
            None
        } else {
            Some(self.sum / self.window as f64)
        }
    }
}

/// Long when the fast average is above the slow one, short when below.
///
/// With `min_balance` set, a new position is only entered when the depth
/// balance agrees with the signal by at least that much; otherwise the
/// current position is held.
pub struct MovingAverageCrossover {
    name: String,
    fast: RollingMean,
    slow: RollingMean,
    quantity: i64,
    min_balance: Option<f64>,
    target: i64,
}

impl MovingAverageCrossover {
    pub fn new(cfg: &StrategyConfig) -> Self {
        Self {
            name: format!("MA crossover {}/{}", cfg.fast_period, cfg.slow_period),
            fast: RollingMean::new(cfg.fast_period),
            slow: RollingMean::new(cfg.slow_period),
            quantity: cfg.quantity,
            min_balance: cfg.min_balance,
            target: 0,
        }
    }

    fn balance_allows(&self, desired: i64, balance: f64) -> bool {
        match self.min_balance {
            None => true,
            Some(min) if desired > 0 => balance >= min,
            Some(min) if desired < 0 => balance <= -min,
            Some(_) => true,
        }
    }
}

impl Strategy for MovingAverageCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_snapshot(&mut self, snapshot: &MarketSnapshot) -> i64 {
        self.fast.push(snapshot.price);
        self.slow.push(snapshot.price);

        let (Some(fast), Some(slow)) = (self.fast.value(), self.slow.value()) else {
            return self.target;
        };
        let desired = if fast > slow {
            self.quantity
        } else if fast < slow {
            -self.quantity
        } else {
            self.target
        };
        if desired != self.target && self.balance_allows(desired, snapshot.balance) {
            self.target = desired;
        }
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn snap(price: f64, balance: f64) -> MarketSnapshot {
        MarketSnapshot {
            time: datetime!(2024-01-05 09:30:00),
            balance,
            price,
            volume: 1,
        }
    }

    fn cfg(min_balance: Option<f64>) -> StrategyConfig {
        StrategyConfig {
            fast_period: 2,
            slow_period: 4,
            quantity: 3,
            min_balance,
            ..Default::default()
        }
    }

    #[test]
    fn flat_while_warming_up() {
        let mut s = MovingAverageCrossover::new(&cfg(None));
        for p in [100.0, 101.0, 102.0] {
            assert_eq!(s.on_snapshot(&snap(p, 0.0)), 0);
        }
    }

    #[test]
    fn huge_window_never_fills() {
        let mut s = MovingAverageCrossover::new(&StrategyConfig {
            fast_period: 1,
            slow_period: usize::MAX,
            ..Default::default()
        });
        assert_eq!(s.on_snapshot(&snap(100.0, 0.0)), 0);
    }

    #[test]
    fn rising_series_goes_long_then_reverses() {
        let mut s = MovingAverageCrossover::new(&cfg(None));
        let mut last = 0;
        for p in [100.0, 101.0, 102.0, 103.0] {
            last = s.on_snapshot(&snap(p, 0.0));
        }
        assert_eq!(last, 3);

        for p in [99.0, 95.0] {
            last = s.on_snapshot(&snap(p, 0.0));
        }
        assert_eq!(last, -3);
    }

    #[test]
    fn balance_filter_holds_position() {
        let mut s = MovingAverageCrossover::new(&cfg(Some(20.0)));
        let mut last = 0;
        for p in [100.0, 101.0, 102.0, 103.0] {
            last = s.on_snapshot(&snap(p, 5.0));
        }
        assert_eq!(last, 0);

        last = s.on_snapshot(&snap(104.0, 25.0));
        assert_eq!(last, 3);
    }
}
