//! LazyMedia CLI entry point.

use std::path::PathBuf;
use std::rc::Rc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use lazy_media::breakpoints::BREAKPOINTS;
use lazy_media::resolver::DEFAULT_SRCSET_BASE_HEIGHT;
use lazy_media::{CatalogSection, UrlResolver};
use lazy_media_cli::config::resolve_config;
use lazy_media_cli::http_probe::{HttpProbe, DEFAULT_TIMEOUT_MS};
use lazy_media_cli::page::{simulate, PageLayout};

#[derive(Parser)]
#[command(
    name = "lazy-media",
    about = "Resolve responsive image URLs, probe locators, and simulate lazy-loaded pages",
    version
)]
struct Cli {
    /// Path to a JSON config file.
    /// Also reads LAZY_MEDIA_CONFIG, then ./.lazy-media.json.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Image host override. Also reads LAZY_MEDIA_HOST.
    #[arg(long, global = true)]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Image URL for a category (internships unless --section is given).
    Category {
        name: String,

        /// Catalog section (hero, internships, courses, about, training).
        #[arg(long)]
        section: Option<CatalogSection>,
    },

    /// Image URL for a course category, matched by keyword.
    Course { name: String },

    /// Responsive URL for a photo identifier.
    Responsive {
        id: String,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long)]
        quality: Option<u8>,
    },

    /// Srcset string for a photo identifier.
    Srcset {
        id: String,
        #[arg(long, default_value_t = DEFAULT_SRCSET_BASE_HEIGHT)]
        base_height: u32,
    },

    /// URL sized by the breakpoint table for a viewport width.
    Optimized {
        id: String,
        #[arg(long)]
        viewport: u32,
    },

    /// Re-synthesize a hosted locator at new dimensions.
    Reframe {
        locator: String,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
    },

    /// Warm up locators over HTTP. Outcomes are only logged.
    Preload {
        #[arg(required = true)]
        locators: Vec<String>,

        /// Per-request timeout in milliseconds.
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
        timeout_ms: u64,
    },

    /// Scroll through a JSON page description and report every element.
    Simulate {
        page: PathBuf,

        /// Run without a visibility notifier; every element loads on attach.
        #[arg(long)]
        eager: bool,

        /// Per-request timeout in milliseconds.
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
        timeout_ms: u64,
    },

    /// Print the effective config and breakpoint table as JSON.
    Info,

    /// Launch interactive REPL mode.
    Repl,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   lazy-media completions bash > ~/.local/share/bash-completion/completions/lazy-media
    ///   lazy-media completions zsh > ~/.zfunc/_lazy-media
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Loaders and probes share Rc state, so everything runs on one LocalSet.
    let local = tokio::task::LocalSet::new();
    local.run_until(run(cli)).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "lazy-media", &mut std::io::stdout());
        return Ok(());
    }

    let config = resolve_config(cli.config.as_deref(), cli.host.as_deref())?;
    let resolver = Rc::new(UrlResolver::new(config));

    match cli.command {
        Commands::Category { name, section } => {
            let url = match section {
                Some(section) => resolver.section_image(section, &name),
                None => resolver.category_image(&name),
            };
            println!("{url}");
        }

        Commands::Course { name } => {
            println!("{}", resolver.course_category_image(&name));
        }

        Commands::Responsive {
            id,
            width,
            height,
            quality,
        } => {
            let url = match quality {
                Some(q) => resolver.responsive_image_with_quality(&id, width, height, q),
                None => resolver.responsive_image(&id, width, height),
            };
            println!("{url}");
        }

        Commands::Srcset { id, base_height } => {
            println!("{}", resolver.responsive_srcset(&id, base_height));
        }

        Commands::Optimized { id, viewport } => {
            println!("{}", resolver.optimized_url(&id, viewport));
        }

        Commands::Reframe {
            locator,
            width,
            height,
        } => {
            println!("{}", resolver.reframe(&locator, width, height));
        }

        Commands::Preload {
            locators,
            timeout_ms,
        } => {
            let probe = HttpProbe::new(timeout_ms);
            resolver.preload(locators.as_slice(), &probe);
            let joined = probe.settle_all().await;
            tracing::info!("Preloaded {joined} of {} locators", locators.len());
        }

        Commands::Simulate {
            page,
            eager,
            timeout_ms,
        } => {
            let layout = PageLayout::from_json_file(&page)?;
            tracing::info!("Simulating {} ({} elements)", page.display(), layout.elements.len());
            let probe = Rc::new(HttpProbe::new(timeout_ms));
            let report = simulate(&layout, resolver.clone(), probe, eager).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Info => {
            let info = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "config": resolver.config(),
                "breakpoints": BREAKPOINTS,
                "sections": CatalogSection::ALL.iter().map(|s| s.name()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Repl => {
            lazy_media_cli::repl::run(&resolver)?;
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}
