//! Progress reporting for update runs.
//!
//! The client emits discrete [`ProgressEvent`]s through a host-supplied
//! [`ProgressSink`]; how they are rendered (progress bar, log line,
//! nothing) is entirely the host's business. Events carry a percentage so
//! the sink needs no knowledge of byte counts or entry totals.

/// The phase a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStep {
    /// Streaming the artifact from the store to a private temporary file.
    Download,
    /// Extracting archive entries into the install root.
    Apply,
}

/// One discrete progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Phase the event belongs to.
    pub step: UpdateStep,
    /// Completion of that phase, 0 to 100.
    pub percent: u8,
}

impl ProgressEvent {
    pub(crate) fn new(step: UpdateStep, percent: u8) -> Self {
        Self { step, percent: percent.min(100) }
    }
}

/// Capability interface for receiving progress events.
///
/// Implemented for any `Fn(ProgressEvent)` closure, so hosts can pass
/// `|event| bar.set_position(event.percent.into())` directly.
pub trait ProgressSink: Send + Sync {
    /// Receive one progress event.
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event);
    }
}

/// The default sink: drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardProgress;

impl ProgressSink for DiscardProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Turns a running byte or entry count into deduplicated percentage
/// events. Emits only when the percentage changes, so a sink sees at most
/// 101 events per phase regardless of chunk size.
pub(crate) struct PercentTracker {
    step: UpdateStep,
    total: Option<u64>,
    last: Option<u8>,
}

impl PercentTracker {
    pub(crate) fn new(step: UpdateStep, total: Option<u64>) -> Self {
        Self { step, total, last: None }
    }

    pub(crate) fn advance(&mut self, done: u64, sink: &dyn ProgressSink) {
        let Some(total) = self.total.filter(|total| *total > 0) else {
            return;
        };
        let percent = (done.min(total) * 100 / total) as u8;
        if self.last != Some(percent) {
            self.last = Some(percent);
            sink.report(ProgressEvent::new(self.step, percent));
        }
    }

    /// Emit the final 100% event if it has not been emitted yet, covering
    /// sources that do not announce their length up front.
    pub(crate) fn finish(&mut self, sink: &dyn ProgressSink) {
        if self.last != Some(100) {
            self.last = Some(100);
            sink.report(ProgressEvent::new(self.step, 100));
        }
    }
}
