use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic mysql-middleware failover simulator")]
pub(crate) struct Args {
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    #[arg(long)]
    pub(crate) iterations: Option<u64>,
    /// Replicas configured per primary host
    #[arg(long, default_value_t = 2)]
    pub(crate) replicas: usize,
    /// Probability that connecting to a replica is refused
    #[arg(long, default_value_t = 0.05)]
    pub(crate) replica_failure_rate: f64,
    /// Probability that a statement fails with "server has gone away" / "lost connection"
    #[arg(long, default_value_t = 0.02)]
    pub(crate) transient_rate: f64,
    #[arg(long, default_value_t = 15)]
    pub(crate) max_failures: u32,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) quick: bool,
    #[arg(long)]
    pub(crate) stress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) seed: u64,
    pub(crate) iterations: u64,
    pub(crate) replicas: usize,
    pub(crate) replica_failure_rate: f64,
    pub(crate) transient_rate: f64,
    pub(crate) max_failures: u32,
    pub(crate) log: Option<PathBuf>,
    pub(crate) preset: Option<String>,
    pub(crate) first_steps: usize,
    pub(crate) tail_steps: usize,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let mut config = SimConfig {
            seed: args.seed.unwrap_or_else(random_seed),
            iterations: args.iterations.unwrap_or(1_000),
            replicas: args.replicas,
            replica_failure_rate: clamp_rate(args.replica_failure_rate),
            transient_rate: clamp_rate(args.transient_rate),
            max_failures: args.max_failures,
            log: args.log,
            preset: None,
            first_steps: 30,
            tail_steps: 80,
        };

        if args.quick {
            config.apply_quick();
        }
        if args.stress {
            config.apply_stress();
        }

        config
    }

    /// Small run with frequent faults, for CI.
    #[cfg(test)]
    pub(crate) fn quick(seed: u64) -> Self {
        let mut config = SimConfig {
            seed,
            iterations: 0,
            replicas: 0,
            replica_failure_rate: 0.0,
            transient_rate: 0.0,
            max_failures: 0,
            log: None,
            preset: None,
            first_steps: 30,
            tail_steps: 80,
        };
        config.apply_quick();
        config
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.iterations = 2_000;
        self.replicas = 2;
        self.replica_failure_rate = 0.2;
        self.transient_rate = 0.05;
        self.max_failures = 3;
    }

    fn apply_stress(&mut self) {
        self.preset = Some("stress".to_string());
        self.iterations = 100_000;
        self.replicas = 4;
        self.replica_failure_rate = 0.3;
        self.transient_rate = 0.1;
        self.max_failures = 15;
    }
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() ^ u64::from(now.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_rate_limits_bounds() {
        assert_eq!(clamp_rate(-1.0), 0.0);
        assert_eq!(clamp_rate(2.0), 1.0);
        assert_eq!(clamp_rate(0.5), 0.5);
        assert_eq!(clamp_rate(f64::NAN), 0.0);
    }

    #[test]
    fn presets_override_flags() {
        let args = Args::parse_from(["simulator", "--seed", "7", "--replicas", "9", "--stress"]);
        let config = SimConfig::from_args(args);
        assert_eq!(config.seed, 7);
        assert_eq!(config.replicas, 4);
        assert_eq!(config.preset.as_deref(), Some("stress"));
    }
}
