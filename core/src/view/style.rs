use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::telemetry::log::LogManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStyle {
    Labeled,
    Unlabeled,
}

impl LabelStyle {
    pub fn for_labels(show_labels: bool) -> Self {
        if show_labels {
            LabelStyle::Labeled
        } else {
            LabelStyle::Unlabeled
        }
    }

    pub fn shows_labels(self) -> bool {
        matches!(self, LabelStyle::Labeled)
    }
}

/// What the rendering surface currently displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceStyle {
    Cleared,
    Styled(LabelStyle),
}

/// Identifies one clear-then-apply transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleToken {
    generation: u64,
    target: LabelStyle,
}

impl StyleToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target(&self) -> LabelStyle {
        self.target
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleTransition {
    Idle,
    Clearing(StyleToken),
}

/// Two-state machine behind the label switch.
///
/// `begin` moves to `Clearing` with a fresh generation, superseding any
/// pending token. `finish` returns the style to apply only for the token that
/// is still pending.
#[derive(Debug)]
pub struct StyleController {
    generation: u64,
    transition: StyleTransition,
    target: LabelStyle,
    attached: bool,
}

impl StyleController {
    pub fn new(initial: LabelStyle) -> Self {
        Self {
            generation: 0,
            transition: StyleTransition::Idle,
            target: initial,
            attached: true,
        }
    }

    pub fn begin(&mut self, target: LabelStyle) -> StyleToken {
        self.generation += 1;
        self.target = target;
        let token = StyleToken {
            generation: self.generation,
            target,
        };
        self.transition = StyleTransition::Clearing(token);
        token
    }

    pub fn finish(&mut self, token: StyleToken) -> Option<LabelStyle> {
        match self.transition {
            StyleTransition::Clearing(pending) if pending == token => {
                self.transition = StyleTransition::Idle;
                Some(token.target)
            }
            _ => None,
        }
    }

    /// Drops any pending transition; its phase 2 will be skipped.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.transition = StyleTransition::Idle;
    }

    pub fn transition(&self) -> StyleTransition {
        self.transition
    }

    pub fn target(&self) -> LabelStyle {
        self.target
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StyleSurfaceError {
    #[error("rendering surface unavailable: {0}")]
    Unavailable(String),
}

/// Port for the map rendering surface's style channel.
#[async_trait]
pub trait StyleSurface: Send + Sync {
    /// Phase 1: drop the current style.
    async fn clear(&self, token: StyleToken) -> Result<(), StyleSurfaceError>;
    /// Resolves once the surface has acknowledged the clear.
    async fn settle(&self, token: StyleToken) -> Result<(), StyleSurfaceError>;
    /// Phase 2.
    async fn apply(&self, token: StyleToken, style: LabelStyle) -> Result<(), StyleSurfaceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Applied(LabelStyle),
    /// A later switch took over before phase 2.
    Superseded,
    /// No surface loaded; the style is applied on the next load.
    Deferred,
}

/// Drives [`StyleController`] transitions against a [`StyleSurface`].
///
/// Clears are issued and applies performed while holding the controller
/// lock, so surface writes land in generation order. The settle wait runs
/// outside the lock, which is where a newer switch can supersede.
pub struct LabelSwitcher {
    controller: Mutex<StyleController>,
    surface: Arc<dyn StyleSurface>,
    logger: LogManager,
}

impl LabelSwitcher {
    pub fn new(surface: Arc<dyn StyleSurface>, initial: LabelStyle) -> Self {
        Self {
            controller: Mutex::new(StyleController::new(initial)),
            surface,
            logger: LogManager::new("style"),
        }
    }

    pub async fn switch(&self, show_labels: bool) -> Result<SwitchOutcome, StyleSurfaceError> {
        self.switch_with(|| ((), show_labels), |_| ())
            .await
            .map(|(_, outcome)| outcome)
    }

    /// Runs `decide` under the controller lock and switches to the label
    /// visibility it returns, so the decision and the generation order agree.
    /// If the surface refuses the clear, `undo` runs under the same lock and
    /// the controller goes back to its previous target and pending transition.
    pub async fn switch_with<T, F, U>(
        &self,
        decide: F,
        undo: U,
    ) -> Result<(T, SwitchOutcome), StyleSurfaceError>
    where
        F: FnOnce() -> (T, bool),
        U: FnOnce(&T),
    {
        let (value, token) = {
            let mut controller = self.controller.lock().await;
            let (previous, pending) = (controller.target(), controller.transition());
            let (value, show_labels) = decide();
            let target = LabelStyle::for_labels(show_labels);
            if !controller.is_attached() {
                controller.cancel();
                controller.target = target;
                self.logger
                    .debug(&format!("surface detached, deferring {:?}", target));
                return Ok((value, SwitchOutcome::Deferred));
            }
            let token = controller.begin(target);
            if let Err(err) = self.surface.clear(token).await {
                controller.target = previous;
                controller.transition = pending;
                undo(&value);
                self.logger.warn(&format!(
                    "clear for generation {} failed: {}",
                    token.generation(),
                    err
                ));
                return Err(err);
            }
            (value, token)
        };

        Ok((value, self.complete(token).await?))
    }

    /// Surface load: re-applies the latest requested style.
    pub async fn attach(&self) -> Result<SwitchOutcome, StyleSurfaceError> {
        let token = {
            let mut controller = self.controller.lock().await;
            controller.attached = true;
            let target = controller.target();
            let token = controller.begin(target);
            self.surface.clear(token).await?;
            token
        };
        self.complete(token).await
    }

    /// Surface unload: pending transitions are dropped.
    pub async fn detach(&self) {
        let mut controller = self.controller.lock().await;
        controller.attached = false;
        controller.cancel();
    }

    pub async fn transition(&self) -> StyleTransition {
        self.controller.lock().await.transition()
    }

    async fn complete(&self, token: StyleToken) -> Result<SwitchOutcome, StyleSurfaceError> {
        self.surface.settle(token).await?;

        let mut controller = self.controller.lock().await;
        match controller.finish(token) {
            Some(style) => {
                self.surface.apply(token, style).await?;
                self.logger.debug(&format!(
                    "applied {:?} (generation {})",
                    style,
                    token.generation()
                ));
                Ok(SwitchOutcome::Applied(style))
            }
            None => {
                self.logger.debug(&format!(
                    "generation {} superseded before apply",
                    token.generation()
                ));
                Ok(SwitchOutcome::Superseded)
            }
        }
    }
}
