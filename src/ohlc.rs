// src/ohlc.rs

use std::collections::VecDeque;

use crate::price::rescale_up;

/// Bound on the number of bars kept per resolution (§3). Oldest bars are
/// evicted FIFO once exceeded.
pub const MAX_BARS: usize = 4096;

/// One OHLC bar covering `[ts_open, ts_close)`, all fields sharing `scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OHLCPrice {
    pub ts_open: u64,
    pub ts_last: u64,
    pub ts_close: u64,
    pub open: u64,
    pub high: u64,
    pub low: u64,
    pub close: u64,
    pub curr: u64,
    pub prev: u64,
    pub scale: u64,
}

/// Ordered sequence of bars for one resolution, newest last, bounded to
/// `MAX_BARS`.
#[derive(Debug, Clone, Default)]
pub struct OHLCData {
    bars: VecDeque<OHLCPrice>,
}

impl OHLCData {
    pub fn new() -> Self {
        Self {
            bars: VecDeque::new(),
        }
    }

    pub fn bars(&self) -> impl Iterator<Item = &OHLCPrice> {
        self.bars.iter()
    }

    pub fn last(&self) -> Option<&OHLCPrice> {
        self.bars.back()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Folds one tick `(value, scale, ts)` into this series at bucket width
    /// `width_secs`, per §4.4's fold algorithm.
    fn fold(&mut self, value: u64, scale: u64, ts: u64, width_secs: u64) {
        match self.bars.back_mut() {
            None => self.bars.push_back(new_bar(value, scale, ts, width_secs)),
            Some(bar) if ts >= bar.ts_close => {
                let ts_open = bar.ts_close;
                let mut next = new_bar(value, scale, ts, width_secs);
                next.ts_open = ts_open;
                self.bars.push_back(next);
                if self.bars.len() > MAX_BARS {
                    self.bars.pop_front();
                }
            }
            Some(bar) => {
                let value = rescale_bar_in_place(bar, value, scale);
                bar.close = value;
                bar.high = bar.high.max(value);
                bar.low = bar.low.min(value);
                bar.prev = bar.curr;
                bar.curr = value;
                bar.ts_last = ts;
            }
        }
    }
}

fn new_bar(value: u64, scale: u64, ts: u64, width_secs: u64) -> OHLCPrice {
    let ts_close = bucket_close(ts, width_secs);
    OHLCPrice {
        ts_open: ts,
        ts_last: ts,
        ts_close,
        open: value,
        high: value,
        low: value,
        close: value,
        curr: value,
        prev: value,
        scale,
    }
}

fn bucket_close(ts: u64, width_secs: u64) -> u64 {
    let ts_sec = ts / 1000;
    (ts_sec - (ts_sec % width_secs) + width_secs) * 1000
}

/// Rescales `bar` in place if its stored scale differs from the incoming
/// tick's, per §4.4, and returns the incoming value at the bar's final
/// (post-rescale) scale.
fn rescale_bar_in_place(bar: &mut OHLCPrice, value: u64, scale: u64) -> u64 {
    use std::cmp::Ordering;
    match bar.scale.cmp(&scale) {
        Ordering::Less => {
            let mul = scale - bar.scale;
            bar.open = rescale_up(bar.open, 0, mul);
            bar.high = rescale_up(bar.high, 0, mul);
            bar.low = rescale_up(bar.low, 0, mul);
            bar.close = rescale_up(bar.close, 0, mul);
            bar.curr = rescale_up(bar.curr, 0, mul);
            bar.prev = rescale_up(bar.prev, 0, mul);
            bar.scale = scale;
            value
        }
        Ordering::Greater => rescale_up(value, 0, bar.scale - scale),
        Ordering::Equal => value,
    }
}

/// Bucket widths, in seconds, for the eight resolutions kept per symbol.
const WIDTHS_SECS: [u64; 8] = [1, 60, 300, 900, 1800, 3600, 14400, 86400];

/// The eight simultaneous OHLC resolutions kept for one symbol: 1s, 1m, 5m,
/// 15m, 30m, 1h, 4h, 1d.
#[derive(Debug, Clone, Default)]
pub struct OHLCGroup {
    pub ohlc_1s: OHLCData,
    pub ohlc_1m: OHLCData,
    pub ohlc_5m: OHLCData,
    pub ohlc_15m: OHLCData,
    pub ohlc_30m: OHLCData,
    pub ohlc_1h: OHLCData,
    pub ohlc_4h: OHLCData,
    pub ohlc_1d: OHLCData,
}

impl OHLCGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one tick into all eight resolutions.
    pub fn fold(&mut self, value: u64, scale: u64, ts: u64) {
        let series: [(&mut OHLCData, u64); 8] = [
            (&mut self.ohlc_1s, WIDTHS_SECS[0]),
            (&mut self.ohlc_1m, WIDTHS_SECS[1]),
            (&mut self.ohlc_5m, WIDTHS_SECS[2]),
            (&mut self.ohlc_15m, WIDTHS_SECS[3]),
            (&mut self.ohlc_30m, WIDTHS_SECS[4]),
            (&mut self.ohlc_1h, WIDTHS_SECS[5]),
            (&mut self.ohlc_4h, WIDTHS_SECS[6]),
            (&mut self.ohlc_1d, WIDTHS_SECS[7]),
        ];
        for (data, width) in series {
            data.fold(value, scale, ts, width);
        }
    }

    /// Returns the most recent 1-minute bar, used by `dump_ohlc` (teacher's
    /// `dumpOHLCData` diagnostic always inspected the 1-minute series).
    pub fn last_1m(&self) -> Option<&OHLCPrice> {
        self.ohlc_1m.last()
    }
}
