//! OHLCV bars derived from reserve snapshots
//!
//! One series per resolution. Only the last bar of a series is open;
//! a price or volume update whose bucket is later than the open bar's
//! closes it and opens a new one. Updates stamped earlier than the open
//! bar fold into the open bar so bar times never go backwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;
use crate::math::{ratio_f64, Amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "1")]
    M1,
    #[serde(rename = "5")]
    M5,
    #[serde(rename = "15")]
    M15,
    #[serde(rename = "30")]
    M30,
    #[serde(rename = "60")]
    H1,
    #[serde(rename = "240")]
    H4,
    #[serde(rename = "1D")]
    D1,
}

impl Resolution {
    pub const ALL: [Resolution; 7] = [
        Resolution::M1,
        Resolution::M5,
        Resolution::M15,
        Resolution::M30,
        Resolution::H1,
        Resolution::H4,
        Resolution::D1,
    ];

    /// Bucket width in seconds
    pub fn bucket_secs(self) -> u64 {
        match self {
            Resolution::M1 => 60,
            Resolution::M5 => 300,
            Resolution::M15 => 900,
            Resolution::M30 => 1_800,
            Resolution::H1 => 3_600,
            Resolution::H4 => 14_400,
            Resolution::D1 => 86_400,
        }
    }

    /// Start of the bucket containing `ts`
    pub fn bucket_start(self, ts: u64) -> u64 {
        ts - ts % self.bucket_secs()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::M1 => "1",
            Resolution::M5 => "5",
            Resolution::M15 => "15",
            Resolution::M30 => "30",
            Resolution::H1 => "60",
            Resolution::H4 => "240",
            Resolution::D1 => "1D",
        }
    }
}

impl FromStr for Resolution {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or(LedgerError::InvalidConfiguration("unknown resolution"))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candle. `time` is the bucket start in unix seconds; prices are
/// ETH per token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    fn flat(time: u64, price: f64) -> Self {
        Self { time, open: price, high: price, low: price, close: price, volume: 0.0 }
    }

    fn apply_price(&mut self, price: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type BarCallback = Box<dyn FnMut(&Bar) + Send>;

struct Subscription {
    id: SubscriptionId,
    resolution: Resolution,
    callback: BarCallback,
}

pub struct CandleAggregator {
    series: BTreeMap<Resolution, Vec<Bar>>,
    subscriptions: Vec<Subscription>,
    next_subscription: u64,
}

impl CandleAggregator {
    /// Seed every resolution with a flat bar at the launch price
    pub fn new(initial_eth_reserve: Amount, initial_token_reserve: Amount, launch_time: u64) -> Self {
        let price = ratio_f64(initial_eth_reserve, initial_token_reserve);
        let series = Resolution::ALL
            .into_iter()
            .map(|r| (r, vec![Bar::flat(r.bucket_start(launch_time), price)]))
            .collect();

        Self { series, subscriptions: Vec::new(), next_subscription: 0 }
    }

    /// Fold the spot price `eth_reserve / token_reserve` at `timestamp`
    /// into every series
    pub fn update_price(&mut self, eth_reserve: Amount, token_reserve: Amount, timestamp: u64) {
        let price = ratio_f64(eth_reserve, token_reserve);
        for resolution in Resolution::ALL {
            if let Some(bar) = self.open_bar_at(resolution, timestamp, Some(price)) {
                bar.apply_price(price);
                let bar = *bar;
                self.notify(resolution, &bar);
            }
        }
    }

    /// Add traded volume (in ETH) to the bar covering `timestamp`
    pub fn add_volume(&mut self, volume: f64, timestamp: u64) {
        if volume <= 0.0 || !volume.is_finite() {
            return;
        }
        for resolution in Resolution::ALL {
            if let Some(bar) = self.open_bar_at(resolution, timestamp, None) {
                bar.volume += volume;
                let bar = *bar;
                self.notify(resolution, &bar);
            }
        }
    }

    /// Bars of `resolution` intersecting `[from, to]`, oldest first. The
    /// returned iterator can be cloned to replay the same range.
    pub fn get_bars(&self, resolution: Resolution, from: u64, to: u64) -> impl Iterator<Item = &Bar> + Clone + '_ {
        let bars = self.series.get(&resolution).map(Vec::as_slice).unwrap_or(&[]);
        let width = resolution.bucket_secs();
        let lo = bars.partition_point(|b| b.time.saturating_add(width) <= from);
        let hi = bars.partition_point(|b| b.time <= to).max(lo);
        bars[lo..hi].iter()
    }

    /// The open bar of `resolution`
    pub fn last_bar(&self, resolution: Resolution) -> Option<&Bar> {
        self.series.get(&resolution).and_then(|bars| bars.last())
    }

    /// Stream the open bar of `resolution` each time it changes
    pub fn subscribe<F>(&mut self, resolution: Resolution, callback: F) -> SubscriptionId
    where
        F: FnMut(&Bar) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscriptions.push(Subscription { id, resolution, callback: Box::new(callback) });
        id
    }

    /// Returns whether the subscription existed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Open bar for the bucket containing `timestamp`, rolling the series
    /// forward if that bucket is newer. A new bar opens at `price`, or at
    /// the previous close when only volume is being recorded.
    fn open_bar_at(&mut self, resolution: Resolution, timestamp: u64, price: Option<f64>) -> Option<&mut Bar> {
        let bars = self.series.get_mut(&resolution)?;
        let start = resolution.bucket_start(timestamp);
        let last = bars.last()?;
        if last.time < start {
            let open = price.unwrap_or(last.close);
            bars.push(Bar::flat(start, open));
        }
        bars.last_mut()
    }

    fn notify(&mut self, resolution: Resolution, bar: &Bar) {
        for sub in self.subscriptions.iter_mut().filter(|s| s.resolution == resolution) {
            (sub.callback)(bar);
        }
    }
}
