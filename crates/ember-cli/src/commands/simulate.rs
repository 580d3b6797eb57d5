//! Headless effect simulation command

use anyhow::{Context, Result};
use ember_particles::{
    Effect, EffectConfig, InstanceRenderer, ParamValue, ParticleInstance, ParticleRenderer,
    RendererFactory, SystemConfig,
};
use ember_runtime::FrameClock;
use log::{debug, info};
use std::path::PathBuf;
use std::time::Duration;

pub struct SimulateArgs {
    pub effect: PathBuf,
    pub seconds: f64,
    pub dt: f64,
    pub set: Vec<(String, ParamValue)>,
    pub realtime: bool,
    pub report_every: f64,
}

/// Running totals between report lines
#[derive(Default)]
struct Window {
    frames: u64,
    spawned: usize,
    died: usize,
    dropped: usize,
}

pub fn run(args: SimulateArgs) -> Result<()> {
    if !(args.dt.is_finite() && args.dt > 0.0) {
        anyhow::bail!("--dt must be a positive number of seconds, got {}", args.dt);
    }
    if !(args.report_every.is_finite() && args.report_every > 0.0) {
        anyhow::bail!("--report-every must be positive, got {}", args.report_every);
    }

    let config = EffectConfig::load(&args.effect)
        .with_context(|| format!("Failed to load effect: {}", args.effect.display()))?;
    let renderers: RendererFactory =
        Box::new(|_: &SystemConfig| -> Box<dyn ParticleRenderer> { Box::new(InstanceRenderer::new()) });
    let mut effect = Effect::with_renderers(config, renderers)
        .with_context(|| format!("Invalid effect: {}", args.effect.display()))?;
    info!("loaded effect from {}", args.effect.display());

    for (key, value) in &args.set {
        let applied = effect
            .set_parameter(key, *value)
            .with_context(|| format!("Failed to set {key}={value}"))?;
        debug!("parameter {key} applied as {applied:?}");
        println!("Set {key} = {value} ({applied:?})");
    }

    println!(
        "Simulating '{}' for {:.2}s ({} system(s))",
        effect.config().name,
        args.seconds,
        effect.manager().systems().len()
    );

    let mut clock = FrameClock::new();
    let mut window = Window::default();
    let mut next_report = args.report_every;
    let mut failures = 0usize;
    effect.start();

    while clock.total_time < args.seconds {
        let dt = if args.realtime {
            std::thread::sleep(Duration::from_secs_f64(args.dt));
            clock.tick()
        } else {
            clock.advance(args.dt)
        };

        let report = effect.update(dt);
        effect.render();
        for (name, err) in &report.failures {
            eprintln!("  [{:.2}s] {name}: {err}", clock.total_time);
        }
        failures += report.failures.len();

        window.frames += 1;
        window.spawned += report.spawned;
        window.died += report.died;
        window.dropped += report.dropped;

        if clock.total_time + 1e-9 >= next_report {
            print_window(&effect, clock.total_time, &window);
            window = Window::default();
            next_report += args.report_every;
        }
    }
    if window.frames > 0 {
        print_window(&effect, clock.total_time, &window);
    }

    effect.stop();
    info!("simulation finished after {:.2}s", clock.total_time);

    let alive = effect.manager().total_alive();
    println!(
        "Done: {} frame(s), {} particle(s) alive, {} byte(s) of instance data, {} failure(s)",
        clock.frame,
        alive,
        alive * std::mem::size_of::<ParticleInstance>(),
        failures
    );
    Ok(())
}

fn print_window(effect: &Effect, time: f64, window: &Window) {
    println!(
        "[{time:6.2}s] {} frame(s): +{} spawned, -{} died, {} dropped",
        window.frames, window.spawned, window.died, window.dropped
    );
    for system in effect.manager().systems() {
        println!(
            "    {:<16} {:>5} / {:<5}",
            system.name(),
            system.alive_count(),
            system.capacity()
        );
    }
    for (name, light) in effect.manager().lights() {
        println!("    light {:<10} intensity {:.3}", name, light.intensity);
    }
}
