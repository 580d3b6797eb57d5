//! Owns every particle system and auxiliary component of an effect

use crate::light::{LightState, ManagerComponent};
use crate::system::{ParticleSystem, TickStats};
use ember_core::{EmberError, Result};
use ember_runtime::RuntimeSystem;
use log::{error, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Summary of one `ParticleManager::update`
#[derive(Debug, Default)]
pub struct FrameReport {
    pub spawned: usize,
    pub dropped: usize,
    pub died: usize,
    pub alive: usize,
    /// Systems or components whose update failed this frame, with the error
    pub failures: Vec<(String, EmberError)>,
}

impl FrameReport {
    fn absorb(&mut self, stats: TickStats) {
        self.spawned += stats.spawned;
        self.dropped += stats.dropped;
        self.died += stats.died;
        self.alive += stats.alive;
    }
}

/// Sole entry point for per-frame update and render.
///
/// Systems are independent; with the `parallel` feature they update across
/// the rayon pool, each system still running its pipeline in order.
#[derive(Default)]
pub struct ParticleManager {
    systems: Vec<ParticleSystem>,
    components: Vec<Box<dyn ManagerComponent>>,
}

impl ParticleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system. Names must be unique within the manager.
    pub fn add_system(&mut self, system: ParticleSystem) -> Result<()> {
        if self.system(system.name()).is_some() {
            return Err(EmberError::Config(format!(
                "duplicate particle system name '{}'",
                system.name()
            )));
        }
        self.systems.push(system);
        Ok(())
    }

    /// Register an auxiliary component. Names must be unique among components.
    pub fn add_component(&mut self, component: Box<dyn ManagerComponent>) -> Result<()> {
        if self.component(component.name()).is_some() {
            return Err(EmberError::Config(format!(
                "duplicate component name '{}'",
                component.name()
            )));
        }
        self.components.push(component);
        Ok(())
    }

    pub fn systems(&self) -> &[ParticleSystem] {
        &self.systems
    }

    pub fn system(&self, name: &str) -> Option<&ParticleSystem> {
        self.systems.iter().find(|s| s.name() == name)
    }

    pub fn system_mut(&mut self, name: &str) -> Option<&mut ParticleSystem> {
        self.systems.iter_mut().find(|s| s.name() == name)
    }

    pub fn component(&self, name: &str) -> Option<&dyn ManagerComponent> {
        self.components
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut (dyn ManagerComponent + 'static)> {
        self.components
            .iter_mut()
            .find(|c| c.name() == name)
            .map(|c| c.as_mut())
    }

    /// Swap in a freshly built set of systems. The old systems are dropped,
    /// which disposes their renderers.
    pub fn replace_systems(&mut self, systems: Vec<ParticleSystem>) {
        let old = std::mem::replace(&mut self.systems, systems);
        info!(
            "replaced {} particle system(s) with {}",
            old.len(),
            self.systems.len()
        );
    }

    /// Drop every system and component
    pub fn clear(&mut self) {
        self.systems.clear();
        self.components.clear();
    }

    pub fn start_all(&mut self) {
        for system in &mut self.systems {
            system.start();
        }
    }

    pub fn stop_all(&mut self) {
        for system in &mut self.systems {
            system.stop();
        }
    }

    /// Particles alive across every system
    pub fn total_alive(&self) -> usize {
        self.systems.iter().map(|s| s.alive_count()).sum()
    }

    /// Light output of every component that drives a light
    pub fn lights(&self) -> impl Iterator<Item = (&str, LightState)> + '_ {
        self.components
            .iter()
            .filter_map(|c| c.as_light().map(|light| (c.name(), light)))
    }

    /// Advance every system and component by `dt` seconds.
    ///
    /// A failing system aborts only its own tick: the error is logged and
    /// reported, and every other system still updates.
    pub fn update(&mut self, dt: f64) -> FrameReport {
        #[cfg(feature = "parallel")]
        let results: Vec<Result<TickStats>> = self
            .systems
            .par_iter_mut()
            .map(|system| system.update(dt))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let results: Vec<Result<TickStats>> = self
            .systems
            .iter_mut()
            .map(|system| system.update(dt))
            .collect();

        let mut report = FrameReport::default();
        for (system, result) in self.systems.iter().zip(results) {
            match result {
                Ok(stats) => report.absorb(stats),
                Err(e) => {
                    error!("particle system '{}' failed this frame: {e}", system.name());
                    report.alive += system.alive_count();
                    report.failures.push((system.name().to_string(), e));
                }
            }
        }

        for component in &mut self.components {
            if let Err(e) = component.update(dt) {
                error!("component '{}' failed this frame: {e}", component.name());
                report.failures.push((component.name().to_string(), e));
            }
        }
        report
    }

    /// Hand every system's latest tick to its renderer
    pub fn render(&mut self) {
        for system in &mut self.systems {
            system.render();
        }
    }
}

impl RuntimeSystem for ParticleManager {
    fn initialize(&mut self) -> Result<()> {
        info!(
            "particle manager starting {} system(s), {} component(s)",
            self.systems.len(),
            self.components.len()
        );
        self.start_all();
        Ok(())
    }

    fn update(&mut self, dt: f64) -> Result<()> {
        ParticleManager::update(self, dt);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        ParticleManager::render(self);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop_all();
        self.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "particles"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ConstantGenerator;
    use crate::initializer::Initializer;
    use crate::light::FlickerLight;
    use crate::render::{ParticleRenderer, ParticleView};
    use ember_core::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct DisposeCounter(Arc<AtomicUsize>);

    impl ParticleRenderer for DisposeCounter {
        fn render(&mut self, _view: &ParticleView<'_>) {}

        fn dispose(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn steady(name: &str, rate: f64) -> ParticleSystem {
        ParticleSystem::builder(name, 64)
            .emission_rate(rate)
            .initializer(Initializer::Position(ConstantGenerator(Vec3::ZERO).into_shared()))
            .build()
            .unwrap()
    }

    struct FailingComponent;

    impl ManagerComponent for FailingComponent {
        fn name(&self) -> &str {
            "faulty"
        }

        fn update(&mut self, _dt: f64) -> Result<()> {
            Err(EmberError::Simulation {
                system: "faulty".into(),
                message: "boom".into(),
            })
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut manager = ParticleManager::new();
        manager.add_system(steady("a", 1.0)).unwrap();
        assert!(manager.add_system(steady("a", 1.0)).is_err());
        manager
            .add_component(Box::new(FlickerLight::new("light", 1.0, 0.0, Vec3::ONE)))
            .unwrap();
        assert!(manager
            .add_component(Box::new(FlickerLight::new("light", 1.0, 0.0, Vec3::ONE)))
            .is_err());
    }

    #[test]
    fn update_fans_out_to_every_system() {
        let mut manager = ParticleManager::new();
        manager.add_system(steady("a", 10.0)).unwrap();
        manager.add_system(steady("b", 20.0)).unwrap();
        manager.initialize().unwrap();

        let report = ParticleManager::update(&mut manager, 0.5);
        assert_eq!(report.spawned, 15);
        assert!(report.failures.is_empty());
        assert_eq!(manager.total_alive(), 15);
        assert_eq!(manager.system("b").unwrap().alive_count(), 10);
    }

    #[test]
    fn failures_are_reported_and_the_rest_still_update() {
        let mut manager = ParticleManager::new();
        manager.add_component(Box::new(FailingComponent)).unwrap();
        manager
            .add_component(Box::new(FlickerLight::new("fire", 3.0, 0.0, Vec3::ONE)))
            .unwrap();
        manager.add_system(steady("good", 10.0)).unwrap();
        manager.start_all();

        let report = ParticleManager::update(&mut manager, 0.5);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "faulty");
        assert_eq!(manager.system("good").unwrap().alive_count(), 5);
        let (_, light) = manager.lights().next().unwrap();
        assert_eq!(light.intensity, 3.0);
    }

    #[test]
    fn lights_update_with_the_systems() {
        let mut manager = ParticleManager::new();
        manager
            .add_component(Box::new(
                FlickerLight::new("fire", 2.0, 0.0, Vec3::ONE).with_position(Vec3::Y),
            ))
            .unwrap();
        ParticleManager::update(&mut manager, 0.016);

        let lights: Vec<_> = manager.lights().collect();
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].0, "fire");
        assert_eq!(lights[0].1.intensity, 2.0);
        assert_eq!(lights[0].1.position, Vec3::Y);
    }

    #[test]
    fn replacing_and_clearing_dispose_renderers() {
        let disposals = Arc::new(AtomicUsize::new(0));
        let with_renderer = |name: &str| {
            ParticleSystem::builder(name, 4)
                .renderer(Box::new(DisposeCounter(disposals.clone())))
                .build()
                .unwrap()
        };

        let mut manager = ParticleManager::new();
        manager.add_system(with_renderer("a")).unwrap();
        manager.add_system(with_renderer("b")).unwrap();

        manager.replace_systems(vec![with_renderer("a")]);
        assert_eq!(disposals.load(Ordering::SeqCst), 2);

        manager.shutdown().unwrap();
        assert_eq!(disposals.load(Ordering::SeqCst), 3);
        assert!(manager.systems().is_empty());
    }
}
