//! Progress and log observation.
//!
//! This module defines the SyncObserver trait, which decouples the engine
//! from whatever presents its output (CLI, GUI, etc.), and a channel-backed
//! implementation for presenting from another thread.

use crossbeam_channel::Sender;

use crate::log::SyncLogEntry;
use crate::model::ProgressState;

/// Receives progress and log events from a sync run.
///
/// All methods are called synchronously on the engine's thread, in the order
/// the events happen. Implementations must not block for long.
pub trait SyncObserver: Send + Sync {
    /// Called at pair start, after every file, and when the pair ends.
    fn on_progress(&self, pair_index: usize, progress: &ProgressState);

    /// Called once per log entry, right after it is recorded.
    fn on_log_entry(&self, pair_index: usize, entry: &SyncLogEntry);
}

/// One event as delivered over a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Progress {
        pair_index: usize,
        progress: ProgressState,
    },
    Log {
        pair_index: usize,
        entry: SyncLogEntry,
    },
}

/// A SyncObserver that forwards events into a channel.
///
/// Sending is fire-and-forget: if the receiving side has gone away the
/// engine keeps running.
pub struct ChannelObserver {
    sender: Sender<SyncEvent>,
}

impl ChannelObserver {
    pub fn new(sender: Sender<SyncEvent>) -> Self {
        ChannelObserver { sender }
    }
}

impl SyncObserver for ChannelObserver {
    fn on_progress(&self, pair_index: usize, progress: &ProgressState) {
        let _ = self.sender.send(SyncEvent::Progress {
            pair_index,
            progress: *progress,
        });
    }

    fn on_log_entry(&self, pair_index: usize, entry: &SyncLogEntry) {
        let _ = self.sender.send(SyncEvent::Log {
            pair_index,
            entry: entry.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_channel_observer_forwards_in_order() {
        let (tx, rx) = unbounded();
        let observer = ChannelObserver::new(tx);

        observer.on_progress(0, &ProgressState::syncing(0, 2));
        observer.on_progress(0, &ProgressState::syncing(1, 2));

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                SyncEvent::Progress { pair_index: 0, progress: ProgressState::syncing(0, 2) },
                SyncEvent::Progress { pair_index: 0, progress: ProgressState::syncing(1, 2) },
            ]
        );
    }

    #[test]
    fn test_dropped_receiver_does_not_panic() {
        let (tx, rx) = unbounded();
        drop(rx);
        let observer = ChannelObserver::new(tx);
        observer.on_progress(3, &ProgressState::completed(1));
    }
}
