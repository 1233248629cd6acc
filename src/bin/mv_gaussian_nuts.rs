use clap::Parser;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rs_nuts::{MultivariateGaussian, Settings, NUTS};

#[derive(Parser)]
#[command(about = "Samples from an isotropic multivariate normal with NUTS, one sample per line")]
struct Cli {
    #[arg(long, default_value = "2")]
    dim: usize,

    /// Variance of every coordinate
    #[arg(long, default_value = "1")]
    variance: f64,

    /// Number of samples kept after burn-in
    #[arg(short, long, default_value = "1000")]
    iterations: usize,

    #[arg(long, default_value = "100")]
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

    anyhow::ensure!(
        cli.variance.is_finite() && cli.variance > 0.,
        "variance must be positive, got {}",
        cli.variance
    );
    let energy = MultivariateGaussian::new(
        Array1::zeros(cli.dim),
        Array2::<f64>::eye(cli.dim) / cli.variance,
    )?;
    let settings = Settings {
        iterations: cli.iterations,
        burn_in: cli.burn_in,
        thinning: cli.thinning,
        ..Settings::default()
    };
    let mut nuts = NUTS::new(energy, settings)?;
    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    nuts.sample(&Array1::zeros(cli.dim), &mut rng)?
        .iter()
        .for_each(|v| println!("{v}"));
    Ok(())
}
