use anyhow::Context;
use radarcore::device::{Scene, SensorType, SyntheticSensor, Target};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Synthetic scene description accepted from YAML workflows and `POST /run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub sensor: SensorType,
    pub targets: Vec<Target>,
    pub clutter: Vec<Target>,
    /// Extra moving targets drawn from `seed`.
    pub random_targets: usize,
    pub noise_std: f32,
    pub seed: u64,
    pub ambient_temperature_celsius: f32,
    pub description: Option<String>,
    pub scenario: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sensor: SensorType::Bgt60tr13c,
            targets: vec![Target {
                range_m: 1.5,
                speed_m_s: 0.5,
                azimuth_deg: 10.0,
                elevation_deg: 0.0,
                amplitude: 1.0,
            }],
            clutter: vec![Target {
                range_m: 0.8,
                azimuth_deg: -25.0,
                amplitude: 2.0,
                ..Target::default()
            }],
            random_targets: 0,
            noise_std: 0.01,
            seed: 0,
            ambient_temperature_celsius: 25.0,
            description: None,
            scenario: None,
        }
    }
}

fn random_target(rng: &mut StdRng) -> Target {
    let speed = rng.gen_range(0.2..1.5);
    Target {
        range_m: rng.gen_range(0.5..4.0),
        speed_m_s: if rng.gen_bool(0.5) { speed } else { -speed },
        azimuth_deg: rng.gen_range(-45.0..45.0),
        elevation_deg: rng.gen_range(-20.0..20.0),
        amplitude: rng.gen_range(0.5..1.5),
    }
}

pub fn build_scene(config: &GeneratorConfig) -> Scene {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut targets = config.targets.clone();
    targets.extend((0..config.random_targets).map(|_| random_target(&mut rng)));
    Scene {
        targets,
        clutter: config.clutter.clone(),
        noise_std: config.noise_std,
        // keep the noise stream apart from the target draw
        seed: config.seed.wrapping_add(1),
        ambient_temperature_celsius: config.ambient_temperature_celsius,
    }
}

pub fn build_sensor(config: &GeneratorConfig) -> anyhow::Result<SyntheticSensor> {
    SyntheticSensor::new(config.sensor, build_scene(config))
        .with_context(|| format!("creating synthetic {} sensor", config.sensor.name()))
}
