//! The scene contract and its lifecycle.
//!
//! A scene moves strictly forward through
//! `Unloaded -> Loading -> Ready -> Running -> Ended`; [`Lifecycle`] is the
//! pure state machine that enforces it. Out-of-order calls are
//! [`Error::InvalidLifecycle`], which [`Game`](crate::Game) treats as fatal
//! for the scene: a draw on an ended scene is a bug, not a condition to
//! paper over.
//!
//! Scenes own every GPU object they allocate in `start` and drop them in
//! `end`; nothing crosses scene boundaries. `end` must be safe after a
//! partially failed `start`, which falls out naturally from storing
//! resources in `Option`s and collections.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::game::FrameContext;
use crate::gpu::GpuContext;
use crate::loader::{AssetBundle, Manifest};

/// Where a scene is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneState {
    Unloaded,
    Loading,
    Ready,
    Running,
    Ended,
}

/// Forward-only lifecycle tracker for one scene instance.
#[derive(Clone, Debug)]
pub struct Lifecycle {
    name: String,
    state: SceneState,
}

impl Lifecycle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SceneState::Unloaded,
        }
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn violation(&self, attempted: &'static str) -> Error {
        Error::InvalidLifecycle {
            scene: self.name.clone(),
            state: self.state,
            attempted,
        }
    }

    /// `load` was called: Unloaded -> Loading.
    pub fn begin_loading(&mut self) -> Result<()> {
        match self.state {
            SceneState::Unloaded => {
                self.state = SceneState::Loading;
                Ok(())
            }
            _ => Err(self.violation("load")),
        }
    }

    /// Assets resolved: Loading -> Ready.
    pub fn mark_ready(&mut self) -> Result<()> {
        match self.state {
            SceneState::Loading => {
                self.state = SceneState::Ready;
                Ok(())
            }
            _ => Err(self.violation("ready")),
        }
    }

    /// `start` succeeded: Ready -> Running.
    pub fn begin_running(&mut self) -> Result<()> {
        match self.state {
            SceneState::Ready => {
                self.state = SceneState::Running;
                Ok(())
            }
            _ => Err(self.violation("start")),
        }
    }

    /// `draw` is only legal while Running. Not a transition.
    pub fn check_draw(&self) -> Result<()> {
        match self.state {
            SceneState::Running => Ok(()),
            _ => Err(self.violation("draw")),
        }
    }

    /// `end` is legal from Ready (start failed) or Running. Ended -> Ended
    /// is tolerated so teardown paths can be idempotent.
    pub fn mark_ended(&mut self) -> Result<()> {
        match self.state {
            SceneState::Ready | SceneState::Running | SceneState::Ended => {
                self.state = SceneState::Ended;
                Ok(())
            }
            _ => Err(self.violation("end")),
        }
    }
}

/// What a scene implements.
///
/// `load` declares dependencies and must not touch the GPU; it runs while
/// the previous scene is still drawing. `start` turns the resolved assets
/// into GPU objects. `draw` runs once per display refresh. `end` releases
/// everything; dropping the scene must be equivalent.
pub trait Scene {
    /// Declare the assets this scene needs. Called exactly once.
    fn load(&mut self) -> Manifest {
        Manifest::new()
    }

    /// Build GPU state from resolved assets. A returned error aborts the
    /// switch and the previous scene stays active.
    fn start(&mut self, gpu: &GpuContext, assets: &AssetBundle) -> Result<()>;

    /// Render one frame. `dt` is wall-clock seconds since the last draw.
    fn draw(&mut self, ctx: &mut FrameContext<'_>, dt: f32) -> Result<()>;

    /// Release scene-owned resources. Must tolerate a partially failed
    /// `start` and repeated calls.
    fn end(&mut self, _gpu: &GpuContext) {}
}

type SceneFactory = Box<dyn Fn() -> Box<dyn Scene>>;

/// Maps scene keys to factories.
#[derive(Default)]
pub struct SceneRegistry {
    factories: HashMap<String, SceneFactory>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one under the same key.
    pub fn register<S, F>(&mut self, name: impl Into<String>, factory: F)
    where
        S: Scene + 'static,
        F: Fn() -> S + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            log::warn!("scene '{}' registered twice, replacing", name);
        }
        self.factories
            .insert(name, Box::new(move || Box::new(factory())));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<S, F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        S: Scene + 'static,
        F: Fn() -> S + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Instantiate a fresh scene.
    pub fn create(&self, name: &str) -> Result<Box<dyn Scene>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownScene(name.to_string()))
    }

    /// Absorb another registry's factories.
    pub fn merge(&mut self, other: SceneRegistry) {
        for (name, factory) in other.factories {
            if self.factories.contains_key(&name) {
                log::warn!("scene '{}' registered twice, replacing", name);
            }
            self.factories.insert(name, factory);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_forward() {
        let mut lc = Lifecycle::new("demo");
        assert_eq!(lc.state(), SceneState::Unloaded);

        lc.begin_loading().unwrap();
        lc.mark_ready().unwrap();
        lc.begin_running().unwrap();
        lc.check_draw().unwrap();
        lc.check_draw().unwrap();
        lc.mark_ended().unwrap();
        assert_eq!(lc.state(), SceneState::Ended);
    }

    #[test]
    fn draw_before_start_is_a_violation() {
        let mut lc = Lifecycle::new("demo");
        lc.begin_loading().unwrap();
        lc.mark_ready().unwrap();

        match lc.check_draw() {
            Err(Error::InvalidLifecycle {
                scene,
                state,
                attempted,
            }) => {
                assert_eq!(scene, "demo");
                assert_eq!(state, SceneState::Ready);
                assert_eq!(attempted, "draw");
            }
            other => panic!("expected InvalidLifecycle, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn no_going_backwards() {
        let mut lc = Lifecycle::new("demo");
        lc.begin_loading().unwrap();
        lc.mark_ready().unwrap();
        lc.begin_running().unwrap();
        lc.mark_ended().unwrap();

        assert!(lc.begin_loading().is_err());
        assert!(lc.mark_ready().is_err());
        assert!(lc.begin_running().is_err());
        assert!(lc.check_draw().is_err());
    }

    #[test]
    fn end_after_failed_start_and_double_end_are_fine() {
        let mut lc = Lifecycle::new("demo");
        lc.begin_loading().unwrap();
        lc.mark_ready().unwrap();
        // start failed: the switcher ends the scene from Ready.
        lc.mark_ended().unwrap();
        lc.mark_ended().unwrap();
        assert_eq!(lc.state(), SceneState::Ended);
    }

    #[test]
    fn load_called_twice_is_a_violation() {
        let mut lc = Lifecycle::new("demo");
        lc.begin_loading().unwrap();
        assert!(lc.begin_loading().is_err());
    }

    struct NullScene;
    impl Scene for NullScene {
        fn start(&mut self, _gpu: &GpuContext, _assets: &AssetBundle) -> Result<()> {
            Ok(())
        }
        fn draw(&mut self, _ctx: &mut FrameContext<'_>, _dt: f32) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn registry_resolves_and_rejects() {
        let registry = SceneRegistry::new().with("null", || NullScene);
        assert!(registry.contains("null"));
        assert!(registry.create("null").is_ok());

        match registry.create("missing") {
            Err(Error::UnknownScene(name)) => assert_eq!(name, "missing"),
            other => panic!("expected UnknownScene, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn merge_brings_factories_across() {
        let mut base = SceneRegistry::new();
        let extra = SceneRegistry::new().with("null", || NullScene);
        base.merge(extra);
        assert!(base.contains("null"));
    }
}
