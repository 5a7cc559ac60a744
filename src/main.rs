use anyhow::Context;
use clap::Parser;
use log::{debug, LevelFilter};

use rdelta::cli::{Cli, Commands};
use rdelta::output;
use rdelta::whole;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG still wins when set
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.as_str()))
        .format_timestamp(None)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(ref log_file_path) = cli.log_file {
        output::init_logger(log_file_path)
            .with_context(|| format!("cannot open log file {}", log_file_path.display()))?;
        output::log_with_timestamp(&format!("rdelta v{} started", env!("CARGO_PKG_VERSION")));
    }

    let config = cli.load_config().context("invalid configuration")?;
    let options = cli.file_options(&config)?;
    debug!("{:?}", options);

    let result = match &cli.command {
        Commands::Signature(args) => {
            let sig_options = args.signature_options(&config)?;
            output::log_with_timestamp(&format!(
                "signature {} -> {}",
                args.basis.display(),
                args.sig.display()
            ));
            whole::sig_file(&args.basis, &args.sig, &sig_options, &options)
        }
        Commands::Delta { sig, new, delta } => {
            output::log_with_timestamp(&format!(
                "delta {} {} -> {}",
                sig.display(),
                new.display(),
                delta.display()
            ));
            whole::delta_file(sig, new, delta, &options)
        }
        Commands::Patch { basis, delta, new } => {
            output::log_with_timestamp(&format!(
                "patch {} {} -> {}",
                basis.display(),
                delta.display(),
                new.display()
            ));
            whole::patch_file(basis, delta, new, &options)
        }
    };

    match result {
        Ok(stats) => {
            output::log_stats(&stats);
            if cli.statistics {
                stats.print();
            }
            Ok(())
        }
        Err(failure) => {
            output::log_failure(&failure);
            if cli.statistics {
                failure.stats.print();
            }
            Err(failure.into())
        }
    }
}
