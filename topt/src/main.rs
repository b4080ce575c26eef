//! topt: validate that IR rewrites refine their source.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use topt::{parse, PrintOpts, VerifyOpts};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "topt")]
#[command(about = "Translation validator for IR transforms")]
#[command(version)]
struct Cli {
    /// Transform files to verify
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Abort with a non-zero status on the first failing transform
    #[arg(long)]
    fatal_errors: bool,

    /// Print function headers when echoing transforms
    #[arg(long)]
    print_fn_header: bool,

    /// Also refine every named intermediate value
    #[arg(long)]
    check_each_var: bool,

    /// Stop after the first satisfying typing assignment
    #[arg(long)]
    single_typing: bool,

    /// Treat an undecided solver answer as a failure
    #[arg(long)]
    fail_on_unknown: bool,

    /// Per-query solver timeout in milliseconds
    #[arg(long)]
    smt_timeout: Option<u32>,

    /// Report results as JSON, one object per transform
    #[arg(long)]
    json: bool,

    /// Path to a topt.toml configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "topt=debug,topt_ir=debug,topt_smt=debug,info"
    } else {
        "topt=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut opts = cli
        .config
        .as_deref()
        .and_then(VerifyOpts::from_file)
        .or_else(|| VerifyOpts::from_file(Path::new("topt.toml")))
        .unwrap_or_default();
    if cli.check_each_var {
        opts.check_each_var = true;
    }
    if cli.single_typing {
        opts.single_typing = true;
    }
    if cli.fail_on_unknown {
        opts.fail_on_unknown = true;
    }
    if let Some(timeout) = cli.smt_timeout {
        opts.smt_timeout_ms = timeout;
    }
    topt_smt::solver_init(opts.smt_timeout_ms);

    let print_opts = PrintOpts {
        print_fn_header: cli.print_fn_header,
    };

    for file in &cli.files {
        let buf = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let transforms =
            parse(&buf).map_err(|e| anyhow::anyhow!("{}: {e}", file.display()))?;

        for mut t in transforms {
            let errs = t.verify(&opts);
            if cli.json {
                let report = serde_json::json!({
                    "file": file.display().to_string(),
                    "name": t.name,
                    "valid": errs.is_empty(),
                    "errors": errs.iter().collect::<Vec<_>>(),
                });
                println!("{report}");
            } else {
                print!("{}", t.display(print_opts));
                if errs.is_empty() {
                    println!("Transformation seems to be correct!");
                } else {
                    println!("Transformation doesn't verify!");
                    print!("{errs}");
                }
            }
            if !errs.is_empty() && cli.fatal_errors {
                anyhow::bail!("transform doesn't verify: {}", file.display());
            }
        }
    }
    Ok(())
}
