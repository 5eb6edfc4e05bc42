//! Scroll preservation across a batch.

use crate::host::{Host, HostError, NodeRef, ScrollMetrics};

/// Scroll position captured before a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollAnchor {
    container: NodeRef,
    before: ScrollMetrics,
    pinned: bool,
}

impl ScrollAnchor {
    /// Capture the container state; `None` without a scroll container.
    #[must_use]
    pub fn capture(host: &dyn Host, pin_threshold_px: f64) -> Option<Self> {
        let container = host.scroll_container()?;
        let before = host.scroll_metrics(container)?;
        Some(Self {
            container,
            before,
            pinned: before.distance_from_bottom() <= pin_threshold_px,
        })
    }

    /// True when the reader was at the bottom.
    #[must_use]
    pub fn was_pinned(&self) -> bool {
        self.pinned
    }

    /// Re-pin to the bottom, or offset by the height lost above the viewport.
    ///
    /// Returns the new scroll top, `None` when the container went away.
    ///
    /// # Errors
    ///
    /// Host write failures.
    pub fn restore(&self, host: &mut dyn Host) -> Result<Option<f64>, HostError> {
        let Some(after) = host.scroll_metrics(self.container) else {
            return Ok(None);
        };
        let target = if self.pinned {
            after.max_scroll_top()
        } else {
            let delta = self.before.scroll_height - after.scroll_height;
            (self.before.scroll_top - delta).clamp(0.0, after.max_scroll_top())
        };
        host.set_scroll_top(self.container, target)?;
        tracing::trace!(
            event = "window.scroll.restored",
            pinned = self.pinned,
            scroll_top = target,
            "scroll position restored"
        );
        Ok(Some(target))
    }
}
