//! Notification sinks.
//!
//! Sinks passively observe every [`ObservationResult`] the monitor produces.
//! The monitor only knows the [`NotificationSink`] trait, so it runs the same
//! way headless or with a display attached.

#[cfg(feature = "display")]
pub mod display;
pub mod logger;

use crate::models::ObservationResult;

pub use logger::LogSink;
#[cfg(feature = "display")]
pub use display::{DisplaySink, StatusBoard, run_display};

/// Receiver of observation events.
///
/// `notify` is called from the monitor loop and must return promptly:
/// anything slow belongs on the other side of a channel.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, result: &ObservationResult);
}

/// Fans each result out to all registered sinks.
#[derive(Default)]
pub struct Notifier {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink.
    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Deliver a result to every sink.
    pub fn dispatch(&self, result: &ObservationResult) {
        for sink in &self.sinks {
            sink.notify(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use chrono::Utc;

    use crate::models::ObservationStatus;

    struct Recorder(Arc<Mutex<Vec<ObservationStatus>>>);

    impl NotificationSink for Recorder {
        fn notify(&self, result: &ObservationResult) {
            self.0.lock().unwrap().push(result.status);
        }
    }

    #[test]
    fn test_dispatch_reaches_every_sink() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new()
            .with_sink(Recorder(Arc::clone(&first)))
            .with_sink(Recorder(Arc::clone(&second)));

        notifier.dispatch(&ObservationResult::unchanged(1, Utc::now(), "sha256:00"));

        assert_eq!(notifier.sink_count(), 2);
        assert_eq!(*first.lock().unwrap(), vec![ObservationStatus::Unchanged]);
        assert_eq!(*second.lock().unwrap(), vec![ObservationStatus::Unchanged]);
    }
}
