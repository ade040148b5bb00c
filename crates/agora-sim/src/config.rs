use agora_core::EngineConfig;
use clap::Parser;

/// Drive a synthetic social workload through an agora engine.
#[derive(Debug, Clone, Parser)]
#[command(name = "agora-sim", version, about)]
pub struct Args {
    /// Users registered before the workload starts
    #[arg(long, default_value_t = 30)]
    pub users: usize,

    /// Subreddits created before the workload starts
    #[arg(long, default_value_t = 6)]
    pub subreddits: usize,

    /// Randomized actions issued after setup
    #[arg(long, default_value_t = 200)]
    pub actions: usize,

    /// Concurrent tasks issuing actions
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Zipf exponent used to pick subreddits and join fan-out
    #[arg(long, default_value_t = 1.07)]
    pub zipf_exponent: f64,

    /// Seed for a reproducible action sequence per task
    #[arg(long)]
    pub seed: Option<u64>,

    /// Fail post sharing with missing entities instead of skipping it
    #[arg(long)]
    pub strict_sharing: bool,

    /// Print the user action and subreddit reports when done
    #[arg(long)]
    pub report: bool,

    /// Print final statistics as JSON
    #[arg(long)]
    pub json: bool,

    /// Ingress channel capacity
    #[arg(long, default_value_t = 1024)]
    pub channel_capacity: usize,
}

impl Args {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            channel_capacity: self.channel_capacity,
            strict_sharing: self.strict_sharing,
            ..EngineConfig::default()
        }
    }
}
