//! One particle system: a store plus its initializer, operator and emission pipeline

use crate::emitter::{EmissionPolicy, EmissionScheduler};
use crate::initializer::{Initializer, SpawnContext};
use crate::operator::{Operator, TickContext};
use crate::particle::ParticleStore;
use crate::random::ParticleRng;
use crate::render::{ParticleRenderer, ParticleView};
use crate::sequence::SequenceTable;
use ember_core::{EmberError, Result, Transform};
use log::{debug, info, trace, warn};

/// Largest store a system may allocate
pub const MAX_CAPACITY: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Stopped,
    Running,
}

/// What one `update` did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Slots activated this tick
    pub spawned: usize,
    /// Spawns requested but dropped because the store was full
    pub dropped: usize,
    /// Slots returned to the free list this tick
    pub died: usize,
    /// Particles alive after the tick
    pub alive: usize,
}

pub struct ParticleSystemBuilder {
    name: String,
    capacity: usize,
    emitter: Transform,
    policy: EmissionPolicy,
    sequences: SequenceTable,
    initializers: Vec<Initializer>,
    operators: Vec<Operator>,
    world_space: bool,
    seed: u64,
    renderer: Option<Box<dyn ParticleRenderer>>,
}

impl ParticleSystemBuilder {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            emitter: Transform::IDENTITY,
            policy: EmissionPolicy::Constant { rate: 0.0 },
            sequences: SequenceTable::new(),
            initializers: Vec::new(),
            operators: Vec::new(),
            world_space: false,
            seed: 0,
            renderer: None,
        }
    }

    pub fn emitter_transform(mut self, transform: Transform) -> Self {
        self.emitter = transform;
        self
    }

    pub fn emission(mut self, policy: EmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn emission_rate(self, rate: f64) -> Self {
        self.emission(EmissionPolicy::Constant { rate })
    }

    pub fn sequences(mut self, sequences: SequenceTable) -> Self {
        self.sequences = sequences;
        self
    }

    pub fn initializer(mut self, initializer: Initializer) -> Self {
        self.initializers.push(initializer);
        self
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operators.push(operator);
        self
    }

    pub fn simulate_in_world_space(mut self, world_space: bool) -> Self {
        self.world_space = world_space;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn renderer(mut self, renderer: Box<dyn ParticleRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Validate the configuration and allocate the store.
    /// The system starts `Stopped`.
    pub fn build(self) -> Result<ParticleSystem> {
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(EmberError::Config(format!(
                "particle system '{}' capacity must be between 1 and {MAX_CAPACITY}, got {}",
                self.name, self.capacity
            )));
        }
        let scheduler = EmissionScheduler::new(self.policy).map_err(|e| annotate(&self.name, e))?;
        for initializer in &self.initializers {
            initializer
                .validate(&self.sequences)
                .map_err(|e| annotate(&self.name, e))?;
        }
        for operator in &self.operators {
            operator
                .validate(&self.sequences)
                .map_err(|e| annotate(&self.name, e))?;
        }

        let sequences_from_end = self
            .operators
            .iter()
            .any(|op| matches!(op, Operator::Sequence(seq) if seq.is_reverse()));

        debug!(
            "built particle system '{}' (capacity {}, {} initializer(s), {} operator(s))",
            self.name,
            self.capacity,
            self.initializers.len(),
            self.operators.len()
        );

        Ok(ParticleSystem {
            name: self.name,
            state: SystemState::Stopped,
            store: ParticleStore::new(self.capacity),
            sequences: self.sequences,
            initializers: self.initializers,
            operators: self.operators,
            scheduler,
            emitter: self.emitter,
            world_space: self.world_space,
            rng: ParticleRng::new(self.seed),
            pending_burst: 0,
            sequences_from_end,
            renderer: self.renderer,
        })
    }
}

/// Prefix a build-time error with the system name
fn annotate(system: &str, err: EmberError) -> EmberError {
    match err {
        EmberError::Config(message) => EmberError::Config(format!("{system}: {message}")),
        EmberError::InvalidSequence(message) => {
            EmberError::InvalidSequence(format!("{system}: {message}"))
        }
        other => other,
    }
}

fn tick_failure(system: &str, err: EmberError) -> EmberError {
    EmberError::Simulation {
        system: system.to_string(),
        message: err.to_string(),
    }
}

pub struct ParticleSystem {
    name: String,
    state: SystemState,
    store: ParticleStore,
    sequences: SequenceTable,
    initializers: Vec<Initializer>,
    operators: Vec<Operator>,
    scheduler: EmissionScheduler,
    emitter: Transform,
    world_space: bool,
    rng: ParticleRng,
    /// One-shot spawns requested by `queue_burst`, consumed by the next running tick
    pending_burst: usize,
    /// A reverse sequence operator runs this system, so spawns start at the
    /// end of their sequence
    sequences_from_end: bool,
    renderer: Option<Box<dyn ParticleRenderer>>,
}

impl ParticleSystem {
    pub fn builder(name: impl Into<String>, capacity: usize) -> ParticleSystemBuilder {
        ParticleSystemBuilder::new(name, capacity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SystemState::Running
    }

    /// Begin emitting. Restarting reseeds the RNG and clears the emission
    /// budget, so a fixed Δt sequence reproduces the same spawns.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.scheduler.reset();
        self.rng.reseed(self.rng.seed());
        self.state = SystemState::Running;
        info!("particle system '{}' started", self.name);
    }

    /// Freeze the system. Live particles stay as they are and keep rendering.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.state = SystemState::Stopped;
        info!(
            "particle system '{}' stopped with {} live particle(s)",
            self.name,
            self.store.alive_count()
        );
    }

    /// Advance the simulation by `dt` seconds. No-op while stopped.
    ///
    /// An `Err` aborts the rest of this tick; particles already processed keep
    /// their new state and dead slots are reclaimed on the next tick.
    pub fn update(&mut self, dt: f64) -> Result<TickStats> {
        if !self.is_running() {
            return Ok(TickStats {
                alive: self.store.alive_count(),
                ..TickStats::default()
            });
        }

        let dt = if dt.is_finite() {
            dt.max(0.0)
        } else {
            warn!("particle system '{}' got non-finite dt {dt}, using 0", self.name);
            0.0
        };

        let requested = self.scheduler.tick(dt) + std::mem::take(&mut self.pending_burst);
        let first = self.store.live_count();
        let spawned = self.store.activate(requested).len();
        let dropped = requested - spawned;
        if dropped > 0 {
            trace!(
                "particle system '{}' full, dropped {dropped} of {requested} spawn(s)",
                self.name
            );
        }

        let mut spawn_ctx = SpawnContext {
            rng: &mut self.rng,
            sequences: &self.sequences,
        };
        for i in first..first + spawned {
            let slot = self.store.live_indices()[i];
            for initializer in &self.initializers {
                initializer
                    .apply(&mut self.store, slot, &mut spawn_ctx)
                    .map_err(|e| tick_failure(&self.name, e))?;
            }
            if self.sequences_from_end {
                let element = &mut self.store.sequence[slot];
                if let Some(sequence) = self.sequences.get(element.sequence_index) {
                    element.current_frame = sequence.end();
                }
            }
            if self.world_space {
                self.store.position[slot] = self.emitter.transform_point(self.store.position[slot]);
                self.store.velocity[slot] = self.emitter.transform_vector(self.store.velocity[slot]);
            }
        }

        let mut tick_ctx = TickContext {
            dt,
            rng: &mut self.rng,
            sequences: &self.sequences,
        };
        for i in 0..self.store.live_count() {
            let slot = self.store.live_indices()[i];
            if !self.store.is_alive(slot) || !step_slot(&mut self.store, slot, dt) {
                self.store.mark_dead(slot);
                continue;
            }
            for operator in &self.operators {
                let keep = operator
                    .update(&mut self.store, slot, &mut tick_ctx)
                    .map_err(|e| tick_failure(&self.name, e))?;
                if !keep {
                    self.store.mark_dead(slot);
                    break;
                }
            }
        }

        let died = self.store.reclaim();
        let stats = TickStats {
            spawned,
            dropped,
            died,
            alive: self.store.live_count(),
        };
        debug!(
            "particle system '{}': +{} -{} ({} alive)",
            self.name, stats.spawned, stats.died, stats.alive
        );
        Ok(stats)
    }

    /// Spawn `count` extra particles on the next running tick
    pub fn queue_burst(&mut self, count: usize) {
        self.pending_burst += count;
    }

    pub fn emitter_transform(&self) -> Transform {
        self.emitter
    }

    /// Move the emission root. World-space particles already spawned stay put.
    pub fn set_emitter_transform(&mut self, transform: Transform) {
        self.emitter = transform;
    }

    pub fn emission_policy(&self) -> EmissionPolicy {
        self.scheduler.policy()
    }

    pub fn set_emission_policy(&mut self, policy: EmissionPolicy) -> Result<()> {
        self.scheduler.set_policy(policy)
    }

    pub fn set_emission_rate(&mut self, rate: f64) -> Result<()> {
        self.scheduler.set_rate(rate)
    }

    pub fn simulate_in_world_space(&self) -> bool {
        self.world_space
    }

    pub fn sequences(&self) -> &SequenceTable {
        &self.sequences
    }

    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    pub fn alive_count(&self) -> usize {
        self.store.alive_count()
    }

    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    pub fn view(&self) -> ParticleView<'_> {
        ParticleView {
            name: &self.name,
            store: &self.store,
            sequences: &self.sequences,
            world_space: self.world_space,
            emitter: self.emitter,
        }
    }

    /// Hand the latest tick to the renderer, if any
    pub fn render(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let view = ParticleView {
            name: &self.name,
            store: &self.store,
            sequences: &self.sequences,
            world_space: self.world_space,
            emitter: self.emitter,
        };
        renderer.render(&view);
    }
}

impl Drop for ParticleSystem {
    fn drop(&mut self) {
        if let Some(mut renderer) = self.renderer.take() {
            renderer.dispose();
            debug!("particle system '{}' disposed its renderer", self.name);
        }
    }
}

/// Age and spin one slot. Returns `false` once its lifetime is used up.
/// A lifetime of 0 never expires; a negative (or NaN) one expires at once.
fn step_slot(store: &mut ParticleStore, slot: usize, dt: f64) -> bool {
    store.age[slot] += dt;
    store.rotation[slot] += store.rotational_speed[slot] * dt as f32;
    let lifetime = store.lifetime[slot];
    if lifetime == 0.0 {
        return true;
    }
    if lifetime.is_nan() || store.age[slot] >= lifetime {
        store.age[slot] = lifetime.max(0.0);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ConstantGenerator;
    use crate::initializer::SequenceSelection;
    use ember_core::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingRenderer {
        renders: Arc<AtomicUsize>,
        disposals: Arc<AtomicUsize>,
    }

    impl ParticleRenderer for CountingRenderer {
        fn render(&mut self, _view: &ParticleView<'_>) {
            self.renders.fetch_add(1, Ordering::SeqCst);
        }

        fn dispose(&mut self) {
            self.disposals.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn at(position: Vec3) -> Initializer {
        Initializer::Position(ConstantGenerator(position).into_shared())
    }

    fn still() -> Initializer {
        Initializer::Velocity(ConstantGenerator(Vec3::ZERO).into_shared())
    }

    #[test]
    fn build_rejects_bad_configuration() {
        assert!(ParticleSystem::builder("empty", 0).build().is_err());
        assert!(matches!(
            ParticleSystem::builder("huge", MAX_CAPACITY + 1).build(),
            Err(EmberError::Config(_))
        ));
        assert!(ParticleSystem::builder("rate", 4)
            .emission_rate(-1.0)
            .build()
            .is_err());
        let err = ParticleSystem::builder("seq", 4)
            .initializer(Initializer::Sequence(SequenceSelection::Random))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, EmberError::InvalidSequence(_)));
    }

    #[test]
    fn stopped_system_does_nothing() {
        let mut system = ParticleSystem::builder("idle", 8)
            .emission_rate(100.0)
            .build()
            .unwrap();
        assert_eq!(system.state(), SystemState::Stopped);
        assert_eq!(system.update(1.0).unwrap().spawned, 0);
        assert_eq!(system.alive_count(), 0);
    }

    #[test]
    fn stop_freezes_live_particles() {
        let mut system = ParticleSystem::builder("frozen", 32)
            .emission_rate(10.0)
            .initializer(at(Vec3::ZERO))
            .initializer(Initializer::Velocity(
                ConstantGenerator(Vec3::new(0.0, 1.0, 0.0)).into_shared(),
            ))
            .operator(Operator::constant_acceleration(Vec3::ZERO))
            .build()
            .unwrap();
        system.start();
        for _ in 0..5 {
            system.update(0.1).unwrap();
        }
        system.stop();

        let alive = system.alive_count();
        let before: Vec<Vec3> = system.store().alive_indices().map(|s| system.store().position(s)).collect();
        system.queue_burst(5);
        for _ in 0..5 {
            system.update(0.1).unwrap();
        }
        let after: Vec<Vec3> = system.store().alive_indices().map(|s| system.store().position(s)).collect();
        assert_eq!(alive, 5);
        assert_eq!(system.alive_count(), alive);
        assert_eq!(before, after);

        // The queued burst waits for the next running tick
        system.start();
        assert_eq!(system.update(0.0).unwrap().spawned, 5);
    }

    #[test]
    fn capacity_exhaustion_truncates_spawns() {
        let mut system = ParticleSystem::builder("full", 5)
            .initializer(at(Vec3::ZERO))
            .build()
            .unwrap();
        system.start();
        system.queue_burst(3);
        assert_eq!(system.update(0.1).unwrap().spawned, 3);

        system.queue_burst(10);
        let stats = system.update(0.1).unwrap();
        assert_eq!(stats.spawned, 2);
        assert_eq!(stats.dropped, 8);
        assert_eq!(system.alive_count(), 5);

        // Dropped spawns are not carried over
        assert_eq!(system.update(0.1).unwrap().spawned, 0);
    }

    #[test]
    fn lifetime_expiry_frees_slots() {
        let mut system = ParticleSystem::builder("short", 1)
            .initializer(Initializer::Lifetime(ConstantGenerator(0.25).into_shared()))
            .build()
            .unwrap();
        system.start();
        system.queue_burst(1);
        system.update(0.1).unwrap();
        system.update(0.1).unwrap();
        assert_eq!(system.alive_count(), 1);
        let stats = system.update(0.1).unwrap();
        assert_eq!(stats.died, 1);
        assert_eq!(system.alive_count(), 0);
        assert_eq!(system.store().free_count(), 1);
    }

    #[test]
    fn negative_lifetime_dies_on_first_tick() {
        let mut system = ParticleSystem::builder("expired", 4)
            .initializer(Initializer::Lifetime(ConstantGenerator(-0.5).into_shared()))
            .build()
            .unwrap();
        system.start();
        system.queue_burst(1);
        let stats = system.update(0.1).unwrap();
        assert_eq!(stats.spawned, 1);
        assert_eq!(stats.died, 1);
        for _ in 0..100 {
            system.update(0.1).unwrap();
        }
        assert_eq!(system.alive_count(), 0);
        assert_eq!(system.store().free_count(), 4);
    }

    #[test]
    fn zero_lifetime_never_expires() {
        let mut system = ParticleSystem::builder("forever", 1)
            .initializer(Initializer::Lifetime(ConstantGenerator(0.0).into_shared()))
            .build()
            .unwrap();
        system.start();
        system.queue_burst(1);
        for _ in 0..100 {
            system.update(0.1).unwrap();
        }
        assert_eq!(system.alive_count(), 1);
    }

    #[test]
    fn reverse_sequences_start_at_the_end() {
        let mut sequences = SequenceTable::new();
        sequences.add(0.0, 4.0).unwrap();
        let mut system = ParticleSystem::builder("rewind", 1)
            .sequences(sequences)
            .initializer(Initializer::Sequence(SequenceSelection::Fixed(0)))
            .operator(Operator::sequence(1.0, false, true).unwrap())
            .build()
            .unwrap();
        system.start();
        system.queue_burst(1);

        let stats = system.update(0.5).unwrap();
        assert_eq!(stats.died, 0);
        let slot = system.store().alive_indices().next().unwrap();
        assert_eq!(system.store().sequence_element(slot).current_frame, 3.5);
        assert_eq!(system.view().atlas_frame(slot), Some(3));

        for _ in 0..3 {
            assert_eq!(system.update(1.0).unwrap().died, 0);
        }
        assert_eq!(system.update(1.0).unwrap().died, 1);
        assert_eq!(system.store().sequence_element(slot).current_frame, 0.0);
    }

    #[test]
    fn dead_particle_skips_remaining_operators() {
        let mut sequences = SequenceTable::new();
        sequences.add(0.0, 1.0).unwrap();
        let mut system = ParticleSystem::builder("flash", 1)
            .sequences(sequences)
            .initializer(Initializer::Opacity(ConstantGenerator(1.0).into_shared()))
            .initializer(Initializer::Sequence(SequenceSelection::Fixed(0)))
            .operator(Operator::sequence(0.1, false, false).unwrap())
            .operator(Operator::opacity([(0.5, 0.0), (0.5, 1.0)], false).unwrap())
            .build()
            .unwrap();
        system.start();
        system.queue_burst(1);

        let stats = system.update(0.5).unwrap();
        assert_eq!(stats.spawned, 1);
        assert_eq!(stats.died, 1);
        // The opacity operator never ran for the ended slot
        assert_eq!(system.store().opacity(0), 1.0);
        assert_eq!(system.store().sequence_element(0).current_frame, 1.0);
    }

    #[test]
    fn restart_reproduces_spawn_counts() {
        let mut system = ParticleSystem::builder("replay", 1000)
            .emission_rate(7.3)
            .seed(42)
            .initializer(Initializer::box_position(Vec3::ONE, Vec3::ZERO))
            .initializer(still())
            .build()
            .unwrap();
        let steps = [0.016, 0.05, 0.2, 0.033, 0.1, 0.0, 0.3, 0.07];

        let run = |system: &mut ParticleSystem| -> Vec<usize> {
            system.start();
            let counts = steps.iter().map(|&dt| system.update(dt).unwrap().spawned).collect();
            system.stop();
            counts
        };

        let first = run(&mut system);
        let second = run(&mut system);
        assert_eq!(first, second);
        assert!(first.iter().sum::<usize>() > 0);
    }

    #[test]
    fn world_space_particles_ignore_later_emitter_moves() {
        let emitter = Transform::from_position(Vec3::new(0.0, 10.0, 0.0));
        let build = |world_space| {
            ParticleSystem::builder("space", 4)
                .emitter_transform(emitter)
                .simulate_in_world_space(world_space)
                .initializer(at(Vec3::new(1.0, 0.0, 0.0)))
                .initializer(still())
                .operator(Operator::constant_acceleration(Vec3::ZERO))
                .build()
                .unwrap()
        };

        let mut world = build(true);
        let mut local = build(false);
        for system in [&mut world, &mut local] {
            system.start();
            system.queue_burst(1);
            system.update(0.1).unwrap();
            system.set_emitter_transform(Transform::from_position(Vec3::new(0.0, 20.0, 0.0)));
            system.update(0.1).unwrap();
        }

        let slot = world.store().alive_indices().next().unwrap();
        assert_eq!(world.view().world_position(slot), Vec3::new(1.0, 10.0, 0.0));

        let slot = local.store().alive_indices().next().unwrap();
        assert_eq!(local.store().position(slot), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(local.view().world_position(slot), Vec3::new(1.0, 20.0, 0.0));
    }

    #[test]
    fn non_finite_dt_is_treated_as_zero() {
        let mut system = ParticleSystem::builder("nan", 8)
            .emission_rate(100.0)
            .build()
            .unwrap();
        system.start();
        assert_eq!(system.update(f64::NAN).unwrap().spawned, 0);
        assert_eq!(system.update(f64::INFINITY).unwrap().spawned, 0);
        assert_eq!(system.update(0.05).unwrap().spawned, 5);
    }

    #[test]
    fn renderer_is_disposed_exactly_once_on_drop() {
        let renders = Arc::new(AtomicUsize::new(0));
        let disposals = Arc::new(AtomicUsize::new(0));
        let mut system = ParticleSystem::builder("gpu", 4)
            .renderer(Box::new(CountingRenderer {
                renders: renders.clone(),
                disposals: disposals.clone(),
            }))
            .build()
            .unwrap();
        system.render();
        system.render();
        assert_eq!(renders.load(Ordering::SeqCst), 2);
        assert_eq!(disposals.load(Ordering::SeqCst), 0);

        drop(system);
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }
}
