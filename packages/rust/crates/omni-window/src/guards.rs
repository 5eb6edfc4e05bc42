//! Guard signals consulted before every evaluation.

use crate::host::Host;
use crate::markers::TEST_ID_ATTR;
use crate::selector::Matcher;

/// Host markers present while a response is still streaming.
pub const STREAMING_MARKERS: Matcher = Matcher::AnyOf(&[
    Matcher::AttrEquals(TEST_ID_ATTR, "stop-button"),
    Matcher::AttrEquals("data-message-streaming", "true"),
    Matcher::AttrEquals("aria-busy", "true"),
    Matcher::ClassToken("result-streaming"),
]);

/// Why an evaluation may not run now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardBlock {
    /// Policy switched off.
    Disabled,
    /// A response is streaming.
    Streaming,
    /// The engine's own writes are settling.
    Suppressed,
    /// The user typed recently.
    Typing,
    /// The reader is away from the bottom.
    ScrolledUp,
}

impl GuardBlock {
    /// String form used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Streaming => "streaming",
            Self::Suppressed => "suppressed",
            Self::Typing => "typing",
            Self::ScrolledUp => "scrolled_up",
        }
    }
}

/// Snapshot of every guard signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardReport {
    /// Policy enabled.
    pub enabled: bool,
    /// Streaming in progress.
    pub streaming: bool,
    /// Suppression active.
    pub suppressed: bool,
    /// Inside the typing grace period.
    pub typing: bool,
    /// Scrolled up with the pause option on.
    pub scrolled_up: bool,
}

impl GuardReport {
    /// First blocking signal. Forced evaluations ignore the scroll position only.
    #[must_use]
    pub fn blocker(&self, forced: bool) -> Option<GuardBlock> {
        if !self.enabled {
            Some(GuardBlock::Disabled)
        } else if self.streaming {
            Some(GuardBlock::Streaming)
        } else if self.suppressed {
            Some(GuardBlock::Suppressed)
        } else if self.typing {
            Some(GuardBlock::Typing)
        } else if self.scrolled_up && !forced {
            Some(GuardBlock::ScrolledUp)
        } else {
            None
        }
    }
}

/// Composer activity with a trailing grace period.
#[derive(Debug, Clone)]
pub struct TypingGuard {
    grace_ms: u64,
    last_input_ms: Option<u64>,
}

impl TypingGuard {
    /// Guard holding for `grace_ms` after each input.
    #[must_use]
    pub fn new(grace_ms: u64) -> Self {
        Self {
            grace_ms,
            last_input_ms: None,
        }
    }

    /// Record composer input.
    pub fn record_input(&mut self, now_ms: u64) {
        self.last_input_ms = Some(now_ms);
    }

    /// When the current hold ends, if any input was seen.
    #[must_use]
    pub fn hold_until(&self) -> Option<u64> {
        self.last_input_ms.map(|t| t.saturating_add(self.grace_ms))
    }

    /// True inside the grace period.
    #[must_use]
    pub fn is_holding(&self, now_ms: u64) -> bool {
        self.hold_until().is_some_and(|until| now_ms < until)
    }
}

/// Result of one streaming sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSample {
    /// Streaming right now.
    pub streaming: bool,
    /// Was streaming at the previous sample and no longer is.
    pub finished: bool,
}

/// Edge-detecting streaming signal.
#[derive(Debug, Clone, Default)]
pub struct StreamingGuard {
    was_streaming: bool,
}

impl StreamingGuard {
    /// Sample the whole document; the stop control usually lives outside the thread.
    pub fn sample(&mut self, host: &dyn Host) -> StreamSample {
        let streaming = STREAMING_MARKERS.any_within(host, host.document_root());
        let finished = self.was_streaming && !streaming;
        self.was_streaming = streaming;
        if finished {
            tracing::debug!(event = "window.guard.stream_finished", "response stream finished");
        }
        StreamSample { streaming, finished }
    }

    /// Forget the previous sample.
    pub fn reset(&mut self) {
        self.was_streaming = false;
    }
}

/// True when the scroll container sits more than `threshold_px` above the bottom.
#[must_use]
pub fn is_scrolled_up(host: &dyn Host, threshold_px: f64) -> bool {
    host.scroll_container()
        .and_then(|container| host.scroll_metrics(container))
        .is_some_and(|metrics| metrics.distance_from_bottom() > threshold_px)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;

    #[test]
    fn forced_runs_ignore_scroll_only() {
        let report = GuardReport {
            enabled: true,
            scrolled_up: true,
            ..GuardReport::default()
        };
        assert_eq!(report.blocker(false), Some(GuardBlock::ScrolledUp));
        assert_eq!(report.blocker(true), None);
        let typing = GuardReport {
            typing: true,
            ..report
        };
        assert_eq!(typing.blocker(true), Some(GuardBlock::Typing));
    }

    #[test]
    fn typing_grace_expires() {
        let mut guard = TypingGuard::new(600);
        assert!(!guard.is_holding(0));
        guard.record_input(100);
        assert!(guard.is_holding(699));
        assert!(!guard.is_holding(700));
    }

    #[test]
    fn streaming_edge_is_reported_once() {
        let mut doc = MemoryDocument::new();
        let root = doc.root();
        let stop = doc.append_element(root, "button", &[(TEST_ID_ATTR, "stop-button")]);
        let mut guard = StreamingGuard::default();
        assert!(guard.sample(&doc).streaming);
        doc.remove(stop);
        assert!(guard.sample(&doc).finished);
        assert!(!guard.sample(&doc).finished);
    }
}
