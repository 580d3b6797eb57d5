//! Effect validation command

use anyhow::{Context, Result};
use ember_particles::{Effect, EffectConfig};
use std::path::Path;

pub fn run(path: &Path) -> Result<()> {
    let config = EffectConfig::load(path)
        .with_context(|| format!("Failed to load effect: {}", path.display()))?;
    let effect = Effect::new(config)
        .with_context(|| format!("Invalid effect: {}", path.display()))?;

    let config = effect.config();
    println!("Effect '{}' is valid (scale {})", config.name, config.scale);
    for system in effect.manager().systems() {
        let system_config = config.system(system.name());
        println!(
            "  system '{}': capacity {}, {:?}, {} initializer(s), {} operator(s), {} sequence(s){}",
            system.name(),
            system.capacity(),
            system.emission_policy(),
            system_config.map_or(0, |c| c.initializers.len()),
            system_config.map_or(0, |c| c.operators.len()),
            system.sequences().len(),
            if system.simulate_in_world_space() {
                ", world space"
            } else {
                ""
            }
        );
    }
    for light in &config.lights {
        println!(
            "  light '{}': intensity {} ± {}",
            light.name, light.intensity, light.intensity_flux
        );
    }
    Ok(())
}
