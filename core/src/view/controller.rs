use std::sync::Arc;

use crate::state::reconciler::Reconciler;
use crate::view::style::{
    LabelStyle, LabelSwitcher, StyleSurface, StyleSurfaceError, SwitchOutcome,
};
use crate::view::toggles::{ViewFlag, ViewState};

/// Entry point for the four view toggles.
pub struct ViewController {
    reconciler: Arc<Reconciler>,
    labels: LabelSwitcher,
}

impl ViewController {
    pub fn new(reconciler: Arc<Reconciler>, surface: Arc<dyn StyleSurface>) -> Self {
        let initial = LabelStyle::for_labels(reconciler.view().show_labels);
        Self {
            reconciler,
            labels: LabelSwitcher::new(surface, initial),
        }
    }

    pub async fn toggle(&self, flag: ViewFlag) -> Result<ViewState, StyleSurfaceError> {
        if flag != ViewFlag::Labels {
            return Ok(self.reconciler.toggle(flag));
        }
        let reconciler = &self.reconciler;
        let (view, _) = self
            .labels
            .switch_with(
                || {
                    let view = reconciler.toggle(ViewFlag::Labels);
                    (view, view.show_labels)
                },
                |_| {
                    reconciler.toggle(ViewFlag::Labels);
                },
            )
            .await?;
        Ok(view)
    }

    pub async fn surface_loaded(&self) -> Result<SwitchOutcome, StyleSurfaceError> {
        self.labels.attach().await
    }

    pub async fn surface_unloaded(&self) {
        self.labels.detach().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::style::StyleToken;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct LastStyle(Mutex<Option<LabelStyle>>, AtomicBool);

    #[async_trait]
    impl StyleSurface for LastStyle {
        async fn clear(&self, _token: StyleToken) -> Result<(), StyleSurfaceError> {
            if self.1.load(Ordering::SeqCst) {
                return Err(StyleSurfaceError::Unavailable("map not ready".into()));
            }
            *self.0.lock().unwrap() = None;
            Ok(())
        }

        async fn settle(&self, _token: StyleToken) -> Result<(), StyleSurfaceError> {
            Ok(())
        }

        async fn apply(&self, _token: StyleToken, style: LabelStyle) -> Result<(), StyleSurfaceError> {
            *self.0.lock().unwrap() = Some(style);
            Ok(())
        }
    }

    #[tokio::test]
    async fn label_toggle_flips_flag_and_surface_style() {
        let surface = Arc::new(LastStyle::default());
        let controller = ViewController::new(Arc::new(Reconciler::default()), surface.clone());

        let view = controller.toggle(ViewFlag::Labels).await.unwrap();
        assert!(!view.show_labels);
        assert_eq!(*surface.0.lock().unwrap(), Some(LabelStyle::Unlabeled));

        let view = controller.toggle(ViewFlag::Labels).await.unwrap();
        assert!(view.show_labels);
        assert_eq!(*surface.0.lock().unwrap(), Some(LabelStyle::Labeled));
    }

    #[tokio::test]
    async fn data_toggles_leave_surface_style_alone() {
        let surface = Arc::new(LastStyle::default());
        let controller = ViewController::new(Arc::new(Reconciler::default()), surface.clone());

        let view = controller.toggle(ViewFlag::Heatmap).await.unwrap();
        assert!(view.show_heatmap);
        assert_eq!(*surface.0.lock().unwrap(), None);
    }

    #[tokio::test]
    async fn failed_label_toggle_keeps_flag() {
        let surface = Arc::new(LastStyle::default());
        let reconciler = Arc::new(Reconciler::default());
        let controller = ViewController::new(reconciler.clone(), surface.clone());

        surface.1.store(true, Ordering::SeqCst);
        assert!(controller.toggle(ViewFlag::Labels).await.is_err());
        assert!(reconciler.view().show_labels);

        surface.1.store(false, Ordering::SeqCst);
        let view = controller.toggle(ViewFlag::Labels).await.unwrap();
        assert!(!view.show_labels);
        assert_eq!(*surface.0.lock().unwrap(), Some(LabelStyle::Unlabeled));
    }
}
