use crate::model::{MarketSnapshot, Side, Trade};
use time::OffsetDateTime;

/// Tracks the open position, closed trades, and the equity curve's drawdown.
pub(crate) struct PositionTracker {
    multiplier: f64,
    position: i64,
    entry_price: f64,
    entry_time: Option<OffsetDateTime>,
    realized: f64,
    peak_equity: f64,
    max_drawdown: f64,
    trades: Vec<Trade>,
}

impl PositionTracker {
    pub fn new(multiplier: f64) -> Self {
        Self {
            multiplier,
            position: 0,
            entry_price: 0.0,
            entry_time: None,
            realized: 0.0,
            peak_equity: 0.0,
            max_drawdown: 0.0,
            trades: Vec::new(),
        }
    }

    /// Move to `target` at the snapshot's price, then mark equity to market.
    pub fn update(&mut self, target: i64, snapshot: &MarketSnapshot) {
        if target != self.position {
            self.close(snapshot);
            if target != 0 {
                self.position = target;
                self.entry_price = snapshot.price;
                self.entry_time = Some(snapshot.time.assume_utc());
            }
        }
        self.mark(snapshot.price);
    }

    /// Close any open position at the snapshot's price.
    pub fn close(&mut self, snapshot: &MarketSnapshot) {
        if self.position == 0 {
            return;
        }
        let pnl = (snapshot.price - self.entry_price) * self.position as f64 * self.multiplier;
        let exit_time = snapshot.time.assume_utc();
        self.realized += pnl;
        self.trades.push(Trade {
            side: if self.position > 0 {
                Side::Long
            } else {
                Side::Short
            },
            quantity: self.position.abs(),
            entry_price: self.entry_price,
            exit_price: snapshot.price,
            entry_time: self.entry_time.unwrap_or(exit_time),
            exit_time,
            pnl,
        });
        self.position = 0;
        self.entry_time = None;
        self.mark(snapshot.price);
    }

    fn mark(&mut self, price: f64) {
        let unrealized = (price - self.entry_price) * self.position as f64 * self.multiplier;
        let equity = self.realized + unrealized;
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        let drawdown = self.peak_equity - equity;
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
    }

    pub fn realized(&self) -> f64 {
        self.realized
    }

    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn snap(price: f64) -> MarketSnapshot {
        MarketSnapshot {
            time: datetime!(2024-01-05 09:30:00),
            balance: 0.0,
            price,
            volume: 1,
        }
    }

    #[test]
    fn reversal_closes_and_reopens() {
        let mut t = PositionTracker::new(50.0);
        t.update(1, &snap(100.0));
        t.update(1, &snap(102.0));
        t.update(-1, &snap(101.0));
        t.close(&snap(99.0));

        let realized = t.realized();
        let trades = t.into_trades();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, Side::Long);
        assert_eq!(trades[0].pnl, 50.0);
        assert_eq!(trades[1].side, Side::Short);
        assert_eq!(trades[1].pnl, 100.0);
        assert_eq!(realized, 150.0);
    }

    #[test]
    fn drawdown_tracks_peak_to_trough() {
        let mut t = PositionTracker::new(1.0);
        t.update(2, &snap(10.0));
        t.update(2, &snap(15.0)); // equity 10
        t.update(2, &snap(12.0)); // equity 4
        t.update(2, &snap(16.0)); // equity 12
        assert_eq!(t.max_drawdown(), 6.0);
    }
}
