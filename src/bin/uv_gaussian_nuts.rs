use clap::Parser;
use ndarray::arr1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rs_nuts::{Gaussian, Settings, NUTS};

#[derive(Parser)]
#[command(about = "Samples from a univariate normal with NUTS, one sample per line")]
struct Cli {
    #[arg(long, default_value = "0")]
    mean: f64,

    #[arg(long, default_value = "1")]
    sigma: f64,

    /// Number of samples kept after burn-in
    #[arg(short, long, default_value = "10000")]
    iterations: usize,

    #[arg(long, default_value = "1000")]
    burn_in: usize,

    #[arg(long, default_value = "1")]
    thinning: usize,

    /// RNG seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings {
        iterations: cli.iterations,
        burn_in: cli.burn_in,
        thinning: cli.thinning,
        ..Settings::default()
    };
    let mut nuts = NUTS::new(Gaussian::new(cli.mean, cli.sigma)?, settings)?;
    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    nuts.sample(&arr1(&[cli.mean]), &mut rng)?
        .iter()
        .for_each(|v| println!("{}", v[0]));
    Ok(())
}
