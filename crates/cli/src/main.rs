use clap::{Parser, Subcommand};
use lib::applog::AppendLog;
use lib::config::{self, mask_secret, SearchSettings, Settings};
use lib::dispatch::Dispatcher;
use lib::search::SearchClient;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "linebridge")]
#[command(about = "LINE webhook relay for the Yelp AI chat API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Write a default config file if none exists.
    Init {
        /// Config file path (default: LINEBRIDGE_CONFIG_PATH or ~/.linebridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the webhook server (POST /callback, GET /health).
    Serve {
        /// Config file path (default: LINEBRIDGE_CONFIG_PATH or ~/.linebridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from PORT, config, or 8000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Validate the config and print the resolved settings with secrets masked.
    CheckConfig {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run one message through the command dispatcher and print the replies.
    Query {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Message text, e.g. `/yelp best ramen near me`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("ignoring .env: {}", e);
        }
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("linebridge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("server failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig { config }) => {
            if let Err(e) = run_check_config(config) {
                log::error!("config invalid: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Query { config, text }) => {
            if let Err(e) = run_query(config, text).await {
                log::error!("query failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    if config::write_default_config(&path)? {
        println!("wrote default configuration to {}", path.display());
    } else {
        println!("configuration already exists at {}", path.display());
    }
    Ok(())
}

async fn run_serve(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = config::load_config(config_path)?;
    if let Some(p) = port {
        config.server.port = p;
    }
    log::info!("using config {}", path.display());
    let settings = Settings::resolve(&config)?;
    log::info!("starting gateway on {}:{}", settings.bind, settings.port);
    lib::gateway::run_gateway(settings).await
}

fn run_check_config(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (config, path) = config::load_config(config_path)?;
    let settings = Settings::resolve(&config)?;
    let search = &settings.search;
    println!("config:          {}", path.display());
    println!("listen:          {}:{}", settings.bind, settings.port);
    println!("channel secret:  {}", mask_secret(&settings.channel_secret));
    println!("access token:    {}", mask_secret(&settings.channel_access_token));
    println!("line api:        {}", settings.line_api_base);
    println!(
        "yelp api key:    {}",
        search.api_key.as_deref().map(mask_secret).unwrap_or_else(|| "(not set)".to_string())
    );
    println!("yelp endpoint:   {} (timeout {}s)", search.endpoint, search.timeout.as_secs());
    println!("yelp locale:     {}", search.locale.as_deref().unwrap_or("(none)"));
    match search.coordinates {
        Some((lat, lon)) => println!("yelp location:   {}, {}", lat, lon),
        None => println!("yelp location:   (none)"),
    }
    println!("events log:      {}", settings.events_log.display());
    println!("search log:      {}", settings.search_log.display());
    Ok(())
}

async fn run_query(config_path: Option<PathBuf>, text: Vec<String>) -> anyhow::Result<()> {
    let (config, _path) = config::load_config(config_path)?;
    let search_settings = SearchSettings::from_config(&config.search);
    let search = SearchClient::new(&search_settings)?;
    if !search.is_configured() {
        log::warn!("YELP_API_KEY not set; /yelp will reply with a not-configured notice");
    }
    let dispatcher = Dispatcher::new(search, AppendLog::new(config.logs.search_path()));

    let replies = dispatcher.handle(&text.join(" ")).await;
    if replies.is_empty() {
        println!("(no reply)");
        return Ok(());
    }
    for (i, reply) in replies.iter().enumerate() {
        println!("--- message {} of {} ---", i + 1, replies.len());
        println!("{}", reply);
    }
    Ok(())
}
