use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;
use tracing_subscriber::EnvFilter;

use dynlibs_core::constants::DEFAULT_LIBRARY;
use dynlibs_core::facade::ffi::{self, DynHandle, DynStatus};
use dynlibs_core::{DynamicLoader, LibLoader, LoaderConfig};

/// dynlibs: load shared libraries by name and move their state between loaders
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Simple ping command for testing
    #[arg(long)]
    ping: bool,

    /// Config file (JSON, YAML or TOML); defaults to the environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory searched before the configured ones (repeatable)
    #[arg(long = "dir", global = true)]
    dirs: Vec<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the file a library name resolves to
    Resolve {
        /// Logical library name, e.g. "Default"
        name: String,
    },
    /// Load libraries and report the interface each one implements
    Load {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Run the setup pass and list the registry
    Setup,
    /// Set up one loader, move its state into a second one through the C ABI
    Transplant,
}

fn init_logging() {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records: {}", e);
    }
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(args: &CliArgs) -> Result<LoaderConfig> {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LoaderConfig::from_env().context("Failed to read config from the environment")?,
    };
    for dir in args.dirs.iter().rev() {
        config = config.with_search_dir(dir);
    }
    Ok(config)
}

fn resolve(config: &LoaderConfig, name: &str) -> Result<()> {
    let loader = DynamicLoader::from_config(config);
    let path = loader
        .resolve_path(name)
        .with_context(|| format!("Failed to resolve library '{}'", name))?;
    println!("{}", path.display());
    Ok(())
}

fn load(config: &LoaderConfig, names: &[String]) -> Result<()> {
    let mut loader = DynamicLoader::from_config(config);
    for name in names {
        let instance = loader
            .load_library(name)
            .with_context(|| format!("Failed to load library '{}'", name))?;
        let interface = instance
            .interface_id()
            .map(|id| id.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<malformed>".to_string());
        let path = loader
            .bindings()
            .get(name)
            .map(|binding| binding.library_path().display().to_string())
            .unwrap_or_default();
        println!("Loaded '{}' from {} ({})", name, path, interface);
    }
    Ok(())
}

fn setup(config: &LoaderConfig) -> Result<()> {
    let mut loader = LibLoader::with_config(config);
    loader.setup().context("Setup failed")?;
    println!("Setup complete. Loaded libraries:");
    for name in loader.bindings().names() {
        println!("  - {}", name);
    }
    Ok(())
}

fn check(operation: &str, status: DynStatus) -> Result<()> {
    if status != DynStatus::Ok {
        bail!("{} returned {:?}", operation, status);
    }
    Ok(())
}

fn default_instance(handle: *mut DynHandle) -> Result<*const ()> {
    // Handles come from `into_handle` and are destroyed only by `transplant`.
    let instance = unsafe {
        ffi::with_loader(handle, |loader| {
            loader
                .bindings()
                .instance(DEFAULT_LIBRARY)
                .map(|instance| instance.as_ptr().cast::<()>())
        })
    }
    .context("Loader handle is not live")?;
    instance.with_context(|| format!("'{}' is not registered", DEFAULT_LIBRARY))
}

fn transplant(config: &LoaderConfig) -> Result<()> {
    let source = ffi::into_handle(LibLoader::with_config(config));
    let target = ffi::into_handle(LibLoader::with_config(config));

    let result = (|| -> Result<()> {
        check("setup", unsafe { ffi::setup(source) })?;
        let original = default_instance(source)?;
        println!("Source '{}' instance at {:p}", DEFAULT_LIBRARY, original);

        let blob = unsafe { ffi::get_data(source) };
        if blob.is_null() {
            bail!("get_data returned null");
        }
        check("set_data", unsafe { ffi::set_data(target, blob) })?;

        let moved = default_instance(target)?;
        println!("Target '{}' instance at {:p}", DEFAULT_LIBRARY, moved);
        if moved != original {
            bail!("Transplanted instance differs from the source instance");
        }
        println!("Transplant succeeded: both loaders share the same instance.");
        Ok(())
    })();

    check("destroy", unsafe { ffi::destroy(source) })?;
    check("destroy", unsafe { ffi::destroy(target) })?;
    result
}

fn main() -> Result<()> {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return Ok(());
    }

    init_logging();
    let config = load_config(&args)?;
    info!("Library search path: {:?}", config.search_dirs);

    match &args.command {
        Some(Commands::Resolve { name }) => resolve(&config, name),
        Some(Commands::Load { names }) => load(&config, names),
        Some(Commands::Setup) => setup(&config),
        Some(Commands::Transplant) => transplant(&config),
        None => {
            println!("No command specified. Run with --help for usage.");
            Ok(())
        }
    }
}
