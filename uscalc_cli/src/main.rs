use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uscalc_core::cache::{
    CacheName, CacheStore, DirStore, Lifecycle, LifecycleRecord, Method, OfflineCache, OriginDir,
    Request,
};
use uscalc_core::config::CacheConfig;
use uscalc_core::*;

#[derive(Parser)]
#[command(name = "uscalc")]
#[command(about = "Ultrasound acoustic output calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute derived metrics for one set of transducer parameters
    Calc {
        #[command(flatten)]
        inputs: InputArgs,

        /// Print the full evaluation as JSON
        #[arg(long)]
        json: bool,

        /// Copy the results block to the clipboard
        #[arg(long)]
        copy: bool,
    },

    /// Evaluate every row of a CSV file
    Batch {
        /// CSV with one set of raw inputs per row
        #[arg(long)]
        input: PathBuf,

        /// Where to write results (stdout if omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Manage the offline asset cache
    Cache {
        /// Override the cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Override the directory the page is served from
        #[arg(long)]
        origin: Option<PathBuf>,

        /// Override the cache version tag
        #[arg(long = "cache-version")]
        version: Option<String>,

        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(clap::Args)]
struct InputArgs {
    /// Center frequency (MHz)
    #[arg(long, allow_hyphen_values = true)]
    frequency: Option<String>,

    /// Depth (cm)
    #[arg(long, allow_hyphen_values = true)]
    depth: Option<String>,

    /// Peak negative pressure measured in water (MPa)
    #[arg(long, allow_hyphen_values = true)]
    pnp: Option<String>,

    /// Pulse duration
    #[arg(long, allow_hyphen_values = true)]
    pd: Option<String>,

    /// Pulse duration unit (s, ms, us)
    #[arg(long, default_value = "us")]
    pd_unit: TimeUnit,

    /// Pulse repetition frequency
    #[arg(long, allow_hyphen_values = true)]
    prf: Option<String>,

    /// Pulse repetition frequency unit (hz, khz)
    #[arg(long, default_value = "hz")]
    prf_unit: RateUnit,

    /// Skull insertion loss (dB); configured default if blank
    #[arg(long, allow_hyphen_values = true)]
    insertion_loss: Option<String>,

    /// Skull thickness (mm); configured default if blank
    #[arg(long, allow_hyphen_values = true)]
    skull: Option<String>,

    /// Medium impedance (water, soft, custom)
    #[arg(long, default_value = "water")]
    impedance: ImpedancePick,

    /// Impedance for `--impedance custom` (MRayl)
    #[arg(long, allow_hyphen_values = true)]
    custom_impedance: Option<String>,
}

impl From<InputArgs> for RawInputs {
    fn from(args: InputArgs) -> Self {
        RawInputs {
            frequency_mhz: args.frequency,
            depth_cm: args.depth,
            peak_negative_pressure_mpa: args.pnp,
            pulse_duration: args.pd,
            pulse_duration_unit: args.pd_unit,
            prf: args.prf,
            prf_unit: args.prf_unit,
            insertion_loss_db: args.insertion_loss,
            skull_thickness_mm: args.skull,
            impedance: args.impedance,
            custom_impedance_mrayl: args.custom_impedance,
        }
    }
}

#[derive(Subcommand)]
enum CacheAction {
    /// Pre-populate the current generation, then activate it
    Install {
        /// Stay installed without activating (no skip-waiting)
        #[arg(long)]
        wait: bool,
    },

    /// Delete stale generations and take over open pages
    Activate,

    /// Answer a request the way the page would see it
    Fetch {
        url: String,

        #[arg(long, default_value = "GET")]
        method: String,

        /// Write the body here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show the lifecycle state and stored generations
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    uscalc_core::logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Calc { inputs, json, copy } => cmd_calc(inputs.into(), json, copy, &config),
        Commands::Batch { input, output } => cmd_batch(input, output, &config),
        Commands::Cache {
            cache_dir,
            origin,
            version,
            action,
        } => {
            let mut cache_config = config.cache.clone();
            if let Some(dir) = cache_dir {
                cache_config.dir = dir;
            }
            if let Some(origin) = origin {
                cache_config.origin_dir = origin;
            }
            if let Some(version) = version {
                cache_config.version = version;
            }
            cmd_cache(action, &cache_config)
        }
    }
}

fn cmd_calc(raw: RawInputs, json: bool, copy: bool, config: &Config) -> Result<()> {
    let evaluation = evaluate(&raw, &config.defaults);

    if json {
        println!("{}", serde_json::to_string_pretty(&evaluation)?);
    } else {
        display_readout(evaluation.readout());
        for advisory in evaluation.advisories() {
            println!("\n⚠ {}", advisory);
        }
    }

    if copy {
        let mut clipboard = CommandClipboard::new(config.clipboard.command.clone());
        let outcome = copy_results(&mut clipboard, &raw, evaluation.readout());
        match outcome {
            CopyOutcome::Copied => println!("{}", outcome.message()),
            CopyOutcome::Blocked(_) => eprintln!("{}", outcome.message()),
        }
    }

    match evaluation.failure() {
        Some(failure) => Err(Error::Validation(*failure)),
        None => Ok(()),
    }
}

fn display_readout(readout: &Readout) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  ULTRASOUND OUTPUT");
    println!("╰─────────────────────────────────────────╯");
    println!();
    for (label, value) in readout.rows() {
        println!("  {:<22} {}", label, value);
    }
}

fn cmd_batch(input: PathBuf, output: Option<PathBuf>, config: &Config) -> Result<()> {
    let summary = match output {
        Some(ref path) => evaluate_csv_file(&input, path, &config.defaults)?,
        None => {
            let file = std::fs::File::open(&input)?;
            evaluate_csv(file, std::io::stdout().lock(), &config.defaults)?
        }
    };

    eprintln!(
        "✓ Evaluated {} rows ({} ok, {} with warnings, {} invalid)",
        summary.rows, summary.ok, summary.warnings, summary.invalid
    );
    if let Some(path) = output {
        eprintln!("  CSV: {}", path.display());
    }
    Ok(())
}

fn cmd_cache(action: CacheAction, cache_config: &CacheConfig) -> Result<()> {
    let root = cache_config.dir.as_path();
    let name: CacheName = cache_config.cache_name();
    let record_path = LifecycleRecord::path_in(root, &name.to_string())?;
    let record = LifecycleRecord::load(&record_path)?;

    let mut cache = OfflineCache::resume(
        name.clone(),
        cache_config.manifest(),
        DirStore::new(&cache_config.dir),
        OriginDir::new(&cache_config.origin_dir),
        record.as_ref(),
    );

    match action {
        CacheAction::Install { wait } => {
            let count = cache.install()?;
            cache.record().save(&record_path)?;
            println!("✓ Installed {} assets into {}", count, name);

            if !wait {
                activate(&mut cache, root, &record_path)?;
            }
        }

        CacheAction::Activate => {
            activate(&mut cache, root, &record_path)?;
        }

        CacheAction::Fetch { url, method, out } => {
            let method: Method = method.parse()?;
            let response = cache.fetch(&Request::new(method, url.clone()))?;
            if !response.is_ok() {
                return Err(Error::Other(format!(
                    "{} answered {}",
                    url, response.status
                )));
            }
            match out {
                Some(path) => std::fs::write(path, &response.body)?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&response.body)?;
                    stdout.flush()?;
                }
            }
        }

        CacheAction::Status => {
            println!("Current: {} ({})", name, cache.state());
            for other in LifecycleRecord::load_all(root)? {
                if other.cache_name != name.to_string() {
                    println!("Other: {} ({})", other.cache_name, other.state);
                }
            }
            let generations = cache.store().keys()?;
            if generations.is_empty() {
                println!("No cache generations stored.");
            }
            for generation in generations {
                let marker = if generation == name.to_string() { "*" } else { " " };
                let entries = cache.store().entries(&generation)?;
                println!("{} {} ({} entries)", marker, generation, entries.len());
                for key in entries {
                    println!("    {}", key);
                }
            }
        }
    }

    Ok(())
}

/// Activate the current version and retire every other version's record
fn activate(
    cache: &mut OfflineCache<DirStore, OriginDir>,
    root: &Path,
    record_path: &Path,
) -> Result<()> {
    let current = cache.name().to_string();
    let others: Vec<LifecycleRecord> = LifecycleRecord::load_all(root)?
        .into_iter()
        .filter(|r| r.cache_name != current)
        .collect();

    let report = cache.activate()?;
    cache.record().save(record_path)?;

    for other in &others {
        if other.state == Lifecycle::Active {
            tracing::info!("{} superseded by {}", other.cache_name, report.current);
            println!("  Superseded {}", other.cache_name);
        }
        LifecycleRecord::remove(root, &other.cache_name)?;
    }
    println!("✓ Activated {}", report.current);
    for deleted in &report.deleted {
        println!("  Deleted stale generation {}", deleted);
    }
    Ok(())
}
