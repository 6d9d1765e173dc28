use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use hwcgov::config::Settings;
use hwcgov::policy::{Policy, PolicyFile};
use hwcgov::provider::HuaweiCloudClient;
use hwcgov::resource::Registry;
use hwcgov::VERSION;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Run governance policies against Huawei Cloud resources
#[derive(Parser, Debug)]
#[command(name = "hwcgov", version, about, long_about = None)]
struct Args {
    /// Policy file (YAML)
    policy: PathBuf,

    /// Region to operate in
    #[arg(short, long)]
    region: Option<String>,

    /// Project id used in API paths
    #[arg(short, long)]
    project: Option<String>,

    /// Settings file (defaults to <config dir>/hwcgov/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only run the policy with this name
    #[arg(long)]
    only: Option<String>,

    /// Enumerate and filter, but skip all actions
    #[arg(long)]
    dry_run: bool,

    /// Validate the policy file and exit without calling the provider
    #[arg(long)]
    validate: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log file, or "-" for stderr
    #[arg(long)]
    log_file: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel, log_file: Option<&str>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let (non_blocking, guard, target) = if log_file == Some("-") {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
        (writer, guard, "stderr".to_string())
    } else {
        let log_path = log_file.map(PathBuf::from).unwrap_or_else(get_log_path);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        (writer, guard, log_path.display().to_string())
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(tracing_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("hwcgov {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log output: {}", target);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("hwcgov").join("hwcgov.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".hwcgov").join("hwcgov.log");
    }
    PathBuf::from("hwcgov.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref())?;

    let settings = match &args.config {
        Some(path) => Settings::load_from(path).context("failed to load settings")?,
        None => Settings::load(),
    };

    let registry = Registry::with_builtins().context("failed to load resource descriptors")?;
    let mut file = PolicyFile::load(&args.policy)
        .with_context(|| format!("failed to load {}", args.policy.display()))?;
    if let Some(only) = &args.only {
        file.policies.retain(|p| &p.name == only);
        if file.policies.is_empty() {
            anyhow::bail!("no policy named '{}' in {}", only, args.policy.display());
        }
    }

    // every policy is validated before the provider is touched
    let policies = Policy::load_all(&registry, &file).context("policy validation failed")?;
    if args.validate {
        println!("{} policy(ies) valid", policies.len());
        return Ok(());
    }

    let region = settings
        .effective_region(args.region.as_deref())
        .context("no region: pass --region, set it in the settings file or HUAWEICLOUD_REGION")?;
    let project = settings
        .effective_project(args.project.as_deref())
        .context("no project id: pass --project, set it in the settings file or HUAWEICLOUD_PROJECT_ID")?;
    let token = settings
        .auth_token()
        .with_context(|| format!("no auth token in ${}", settings.auth_token_env))?;

    let options = settings.run_options();
    let client = HuaweiCloudClient::new(settings, &region, &project, &token)
        .context("failed to create Huawei Cloud client")?;

    let mut outcomes = Vec::with_capacity(policies.len());
    for policy in &policies {
        let outcome = policy
            .run(&client, options, args.dry_run)
            .await
            .with_context(|| format!("policy '{}' failed", policy.name))?;
        outcomes.push(outcome);
    }

    println!("{}", serde_json::to_string_pretty(&outcomes)?);

    let failures: usize = outcomes
        .iter()
        .flat_map(|o| &o.actions)
        .map(|r| r.failed.len())
        .sum();
    if failures > 0 {
        anyhow::bail!("{} record(s) failed in actions", failures);
    }

    Ok(())
}
