//! Crowd Control CLI
//!
//! Send behavior tags and read audience membership from the command line.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use crowd_control::{
    ClientConfig, CrowdControl, Protocol, SendOutcome, StaticProvider, PRIVACY_NOTICE, VERSION,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crowd-control")]
#[command(version = VERSION)]
#[command(about = "Behavior collection and audience extraction client", long_about = None)]
struct Cli {
    #[command(flatten)]
    client: ClientArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options that override the saved configuration.
#[derive(Args)]
struct ClientArgs {
    /// Client id for data collection
    #[arg(long, global = true)]
    client_id: Option<u32>,

    /// Client id for audience extraction (defaults to the client id)
    #[arg(long, global = true)]
    audience_client_id: Option<u32>,

    /// Use https instead of http
    #[arg(long, global = true)]
    https: bool,

    /// Edge domain
    #[arg(long, global = true)]
    domain: Option<String>,

    /// Request the panorama id on audience reads
    #[arg(long, global = true)]
    panorama: bool,

    /// Advertising id to report instead of the hashed host id
    #[arg(long, global = true)]
    advertising_id: Option<String>,

    /// Treat the advertising id as limited ad tracking (opted out)
    #[arg(long, global = true, requires = "advertising_id")]
    limit_tracking: bool,

    /// Extra request header, as name=value (repeatable)
    #[arg(long = "header", global = true, value_parser = parse_pair)]
    headers: Vec<(String, String)>,

    /// Seconds to wait for identity resolution
    #[arg(long, global = true, default_value = "5")]
    wait: u64,

    /// Show debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send behavior tags to the collection servers
    Send {
        /// Tag to send, as key=value (repeatable)
        #[arg(long = "tag", value_parser = parse_pair)]
        tags: Vec<(String, String)>,

        /// Behavior id (repeatable)
        #[arg(long)]
        behavior: Vec<u64>,

        /// Placement id that had an opportunity (repeatable)
        #[arg(long)]
        opportunity: Vec<u64>,

        /// Send in the background and wait for the result
        #[arg(long = "async")]
        background: bool,
    },

    /// Print the audience membership JSON for this device
    Audience {
        /// Seconds to wait for the response
        #[arg(long, default_value = "5")]
        timeout: u64,
    },

    /// Show the resolved device identity
    Id,

    /// Show the effective configuration
    Config {
        /// Save it as the default configuration
        #[arg(long)]
        save: bool,
    },

    /// Display privacy notice
    Privacy,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.client.debug);

    match cli.command {
        Commands::Send {
            tags,
            behavior,
            opportunity,
            background,
        } => cmd_send(&cli.client, &tags, &behavior, &opportunity, background),
        Commands::Audience { timeout } => cmd_audience(&cli.client, timeout),
        Commands::Id => cmd_id(&cli.client),
        Commands::Config { save } => cmd_config(&cli.client, save),
        Commands::Privacy => {
            println!("{PRIVACY_NOTICE}");
            Ok(())
        }
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("crowd_control=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got '{s}'")),
    }
}

/// Merge command-line overrides onto the saved configuration.
fn resolve_config(args: &ClientArgs) -> Result<ClientConfig> {
    let saved = ClientConfig::load().context("Could not load saved configuration")?;

    let mut config = match (args.client_id, saved) {
        (Some(id), Some(saved)) => ClientConfig {
            client_id: id,
            ..saved
        },
        (Some(id), None) => ClientConfig::new(id),
        (None, Some(saved)) => saved,
        (None, None) => bail!(
            "--client-id is required (or save one with `crowd-control config --client-id <ID> --save`)"
        ),
    };

    if let Some(id) = args.audience_client_id {
        config.audience_client_id = Some(id);
    }
    if args.https {
        config.protocol = Protocol::Https;
    }
    if let Some(ref domain) = args.domain {
        config.domain = domain.clone();
    }
    if args.panorama {
        config.panorama_enabled = true;
    }
    Ok(config)
}

/// Build a client and wait for it to become ready.
fn connect(args: &ClientArgs) -> Result<CrowdControl> {
    let config = resolve_config(args)?;

    let mut builder = CrowdControl::builder(config);
    if let Some(ref id) = args.advertising_id {
        builder = builder.identity_provider(Arc::new(StaticProvider::new(
            id.clone(),
            args.limit_tracking,
        )));
    }
    let cc = builder.build().context("Failed to start client")?;

    for (name, value) in &args.headers {
        cc.set_header(name.clone(), value.clone());
    }

    if !cc.wait_until_ready(Duration::from_secs(args.wait)) {
        bail!("Identity was not resolved within {}s", args.wait);
    }
    Ok(cc)
}

fn cmd_send(
    args: &ClientArgs,
    tags: &[(String, String)],
    behaviors: &[u64],
    opportunities: &[u64],
    background: bool,
) -> Result<()> {
    if tags.is_empty() && behaviors.is_empty() && opportunities.is_empty() {
        eprintln!("Note: nothing to send beyond the page view marker");
    }

    let cc = connect(args)?;
    if cc.is_opted_out() {
        println!("Limited ad tracking is enabled; nothing was collected or sent.");
        return Ok(());
    }

    for (key, value) in tags {
        cc.add(key, value);
    }
    for id in behaviors {
        cc.add_behavior(*id);
    }
    for id in opportunities {
        cc.add_opportunity(*id);
    }

    if background {
        let Some(handle) = cc.flush_async() else {
            bail!("Client was not able to dispatch");
        };
        match handle.wait(cc.config().timeout + Duration::from_secs(1)) {
            SendOutcome::Delivered(_) => println!("Sent."),
            SendOutcome::Failed => bail!("Background send failed (run with --debug for details)"),
            SendOutcome::TimedOut => bail!("Background send did not finish in time"),
        }
    } else {
        cc.flush_sync().context("Collection call failed")?;
        println!("Sent.");
    }

    println!();
    println!("{}", cc.summary());
    Ok(())
}

fn cmd_audience(args: &ClientArgs, timeout: u64) -> Result<()> {
    let cc = connect(args)?;
    if cc.is_opted_out() {
        println!("Limited ad tracking is enabled; no audience data is available.");
        return Ok(());
    }

    let Some(body) = cc.read_audience(Duration::from_secs(timeout)) else {
        bail!("No audience data received (run with --debug for details)");
    };

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}

fn cmd_id(args: &ClientArgs) -> Result<()> {
    let cc = connect(args)?;
    let identity = cc.identity().context("Identity not available")?;
    println!("{}", serde_json::to_string_pretty(&identity)?);
    Ok(())
}

fn cmd_config(args: &ClientArgs, save: bool) -> Result<()> {
    let config = resolve_config(args)?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    if save {
        let path = config.save().context("Could not save configuration")?;
        println!();
        println!("Saved to {}", path.display());
    } else {
        println!();
        println!("Config file: {}", ClientConfig::config_path().display());
    }
    Ok(())
}
