use async_trait::async_trait;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use trashcore::view::{LabelStyle, StyleSurface, StyleSurfaceError, StyleToken, SurfaceStyle};

/// Style slot published to the visualizer through `/payload`.
///
/// A clear stays pending until the visualizer acknowledges its generation
/// or `settle` elapses, whichever comes first.
pub struct PublishedSurface {
    state: RwLock<PublishedState>,
    acked: watch::Sender<u64>,
    settle: Duration,
}

#[derive(Debug, Clone, Copy)]
struct PublishedState {
    style: SurfaceStyle,
    pending_clear: Option<u64>,
}

impl PublishedSurface {
    pub fn new(initial: LabelStyle, settle: Duration) -> Self {
        let (acked, _) = watch::channel(0);
        Self {
            state: RwLock::new(PublishedState {
                style: SurfaceStyle::Styled(initial),
                pending_clear: None,
            }),
            acked,
            settle,
        }
    }

    pub fn current(&self) -> SurfaceStyle {
        self.read().style
    }

    /// Generation of the clear awaiting acknowledgement, if any.
    pub fn pending_clear(&self) -> Option<u64> {
        self.read().pending_clear
    }

    /// Renderer confirmation that it dropped the style for `generation`.
    /// Returns false for a generation that is not the pending one.
    pub fn acknowledge(&self, generation: u64) -> bool {
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if state.pending_clear != Some(generation) {
                return false;
            }
            state.pending_clear = None;
        }
        self.acked.send_if_modified(|seen| {
            if generation > *seen {
                *seen = generation;
                true
            } else {
                false
            }
        });
        true
    }

    fn read(&self) -> PublishedState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, style: SurfaceStyle, pending_clear: Option<u64>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = PublishedState {
            style,
            pending_clear,
        };
    }
}

#[async_trait]
impl StyleSurface for PublishedSurface {
    async fn clear(&self, token: StyleToken) -> Result<(), StyleSurfaceError> {
        log::debug!("surface cleared for generation {}", token.generation());
        self.set(SurfaceStyle::Cleared, Some(token.generation()));
        Ok(())
    }

    async fn settle(&self, token: StyleToken) -> Result<(), StyleSurfaceError> {
        if self.settle.is_zero() {
            return Ok(());
        }
        let generation = token.generation();
        let mut acked = self.acked.subscribe();
        let acknowledged = tokio::time::timeout(self.settle, async move {
            let _ = acked.wait_for(|seen| *seen >= generation).await;
        })
        .await;
        if acknowledged.is_err() {
            log::debug!(
                "no acknowledgement for generation {} after {:?}",
                generation,
                self.settle
            );
        }
        Ok(())
    }

    async fn apply(&self, token: StyleToken, style: LabelStyle) -> Result<(), StyleSurfaceError> {
        log::debug!("surface styled {:?} for generation {}", style, token.generation());
        self.set(SurfaceStyle::Styled(style), None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trashcore::view::{LabelSwitcher, SwitchOutcome};

    #[tokio::test]
    async fn acknowledged_clear_settles_before_timeout() {
        let surface = Arc::new(PublishedSurface::new(
            LabelStyle::Labeled,
            Duration::from_secs(30),
        ));
        let switcher = Arc::new(LabelSwitcher::new(surface.clone(), LabelStyle::Labeled));

        let switch = tokio::spawn({
            let switcher = switcher.clone();
            async move { switcher.switch(false).await }
        });
        while surface.pending_clear().is_none() {
            tokio::task::yield_now().await;
        }
        assert_eq!(surface.current(), SurfaceStyle::Cleared);
        assert!(!surface.acknowledge(99));
        let generation = surface.pending_clear().unwrap();
        assert!(surface.acknowledge(generation));

        let outcome = tokio::time::timeout(Duration::from_secs(5), switch)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, SwitchOutcome::Applied(LabelStyle::Unlabeled));
        assert_eq!(surface.current(), SurfaceStyle::Styled(LabelStyle::Unlabeled));
        assert_eq!(surface.pending_clear(), None);
    }

    #[tokio::test]
    async fn unacknowledged_clear_falls_back_to_settle_delay() {
        let surface = Arc::new(PublishedSurface::new(
            LabelStyle::Labeled,
            Duration::from_millis(20),
        ));
        let switcher = LabelSwitcher::new(surface.clone(), LabelStyle::Labeled);

        let outcome = switcher.switch(false).await.unwrap();

        assert_eq!(outcome, SwitchOutcome::Applied(LabelStyle::Unlabeled));
        assert_eq!(surface.current(), SurfaceStyle::Styled(LabelStyle::Unlabeled));
    }
}
