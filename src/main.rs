use anyhow::{Context, Result};
use clap::Parser;
mod auth;
use saltseal::{
    Config, CryptError, DEFAULT_SALT_FILE, Mode, SaltSource, TreeReport, generate_key, process_path,
    scan_folders,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "saltseal")]
#[command(version, about = "Password-based encryption of files and folders, in place.")]
struct Cli {
    /// File or folder to encrypt/decrypt, or the root to scan with --scan
    path: PathBuf,

    /// Generate and store a fresh salt of N bytes instead of reusing the salt file
    #[arg(short, long, value_name = "N", conflicts_with = "decrypt")]
    salt_size: Option<usize>,

    /// Encrypt the file or folder
    #[arg(short, long, conflicts_with = "decrypt")]
    encrypt: bool,

    /// Decrypt the file or folder
    #[arg(short, long)]
    decrypt: bool,

    /// List the folders under PATH and pick one to operate on
    #[arg(long)]
    scan: bool,

    /// Path to the salt file
    #[arg(long, value_name = "PATH", env = "SALTSEAL_SALT_FILE", default_value = DEFAULT_SALT_FILE)]
    salt_file: PathBuf,

    /// Number of files to process in parallel
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Print the run report as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Log every file and key derivation step
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() -> ExitCode {
    let args = Cli::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(mut args: Cli) -> Result<ExitCode> {
    if args.scan {
        let folders = scan_folders(&args.path)
            .with_context(|| format!("cannot scan '{}'", args.path.display()))?;

        if folders.is_empty() {
            println!("No folders found.");
        } else {
            println!("Available folders:");
            for (i, folder) in folders.iter().enumerate() {
                println!("{}. {}", i + 1, folder.display());
            }

            match auth::read_choice("Enter the number of the folder to encrypt/decrypt: ")? {
                Some(n) if (1..=folders.len()).contains(&n) => args.path = folders[n - 1].clone(),
                _ => {
                    eprintln!("Invalid choice. Exiting.");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    let mode = match (args.encrypt, args.decrypt) {
        (true, false) => Mode::Encrypt,
        (false, true) => Mode::Decrypt,
        _ => {
            println!("Please specify whether to encrypt or decrypt the file or folder (--encrypt or --decrypt).");
            return Ok(ExitCode::SUCCESS);
        }
    };

    let password = auth::read_password()?;

    let config = Config::new(&args.salt_file);
    if mode == Mode::Decrypt && !config.salt_file().exists() {
        warn!(
            path = %config.salt_path().display(),
            "no salt file here; a new salt cannot decrypt existing files, run from the directory holding the original salt or pass --salt-file"
        );
    }
    let source = args.salt_size.map_or(SaltSource::Existing, SaltSource::Fresh);
    let key = generate_key(&password, source, &config).context("unable to derive encryption key")?;
    drop(password);

    let Some(key) = key else {
        return Err(CryptError::SaltUnavailable(config.salt_path().clone()).into());
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;

    let mut options = config.walk_options();
    options.jobs = args.jobs;
    options.cancel = Some(cancel);

    let report = process_path(&args.path, mode, Some(&key), &options)
        .with_context(|| format!("cannot process '{}'", args.path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(if report.cancelled {
        ExitCode::from(130)
    } else if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(report: &TreeReport) {
    let verb = match report.mode {
        Mode::Encrypt => "encrypted",
        Mode::Decrypt => "decrypted",
    };
    println!("{} file(s) {verb}", report.succeeded);

    if !report.failures.is_empty() {
        println!("{} file(s) failed:", report.failures.len());
        for failure in &report.failures {
            println!("  {}: {}", failure.path.display(), failure.message);
        }
    }

    if !report.skipped.is_empty() {
        println!("{} entries skipped", report.skipped.len());
    }

    if report.cancelled {
        println!("cancelled; remaining files were left unchanged");
    }
}
