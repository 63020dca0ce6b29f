//! Poll triggers

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// What drives the syncer's poll cycles
#[derive(Debug)]
pub enum TickSource {
    /// Wall-clock interval
    Interval(Duration),

    /// One cycle per message. Once every sender is dropped no more cycles run.
    Channel(mpsc::Receiver<()>),
}

impl TickSource {
    /// A manually driven tick source and the sender that drives it
    pub fn channel(buffer: usize) -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, TickSource::Channel(rx))
    }

    pub(crate) fn into_ticker(self) -> Ticker {
        match self {
            TickSource::Interval(period) => {
                let first = tokio::time::Instant::now() + period;
                let mut interval = tokio::time::interval_at(first, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Ticker::Interval(interval)
            }
            TickSource::Channel(rx) => Ticker::Channel(rx),
        }
    }
}

pub(crate) enum Ticker {
    Interval(Interval),
    Channel(mpsc::Receiver<()>),
}

impl Ticker {
    /// Wait for the next tick
    pub(crate) async fn tick(&mut self) {
        match self {
            Ticker::Interval(interval) => {
                interval.tick().await;
            }
            Ticker::Channel(rx) => {
                if rx.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }
}
