//! Command-line interface parsing and handling
//!
//! Without a subcommand the full-screen client starts. The other
//! subcommands talk to the server once and print Markdown to stdout.

pub mod metadata_list;

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;

use crate::core::cache::MetadataKind;
use crate::core::config::{Overrides, Settings};
use crate::core::format::{resource_markdown, result_markdown};
use crate::core::records::is_error_result;
use crate::mcp::{McpBackend, McpClient};
use crate::ui::run_tui;
use crate::utils::logging::{init_logging, LogTarget};

use self::metadata_list::print_metadata;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")"
);

#[derive(Parser)]
#[command(name = "htbmcp")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "A terminal client for the HackTheBox CTF MCP server")]
#[command(
    long_about = "htbmcp is a full-screen terminal client for the HackTheBox CTF MCP server. \
Browse events, teams and challenges, call tools through a JSON argument editor, \
and start challenge containers.\n\n\
Environment Variables (also read from .env):\n\
  API_ACCESS_TOKEN  Bearer token for the MCP server (required)\n\
  HTB_MCP_URL       Server URL (defaults to https://mcp.hackthebox.ai/v1/ctf/mcp/)\n\
  HTBMCP_LOG        Log filter, e.g. debug or htbmcp=trace (defaults to info)\n\n\
Controls:\n\
  Up/Down           Move the selection\n\
  Enter             Open or select\n\
  Esc               Go back\n\
  Space             Skip the typewriter reveal\n\
  j / m             Save the current result as JSON / Markdown\n\
  Ctrl+C            Quit the application"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// MCP server URL (overrides HTB_MCP_URL and the config file)
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    /// Settings file to read instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write logs to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Show results at once instead of revealing them
    #[arg(long, global = true)]
    pub no_animation: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the full-screen client (default)
    Tui,
    /// List the tools the server offers
    Tools,
    /// List the resources the server offers
    Resources,
    /// List the prompts the server offers
    Prompts,
    /// Call a tool and print its result
    Call {
        /// Tool name
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, value_name = "JSON")]
        args: Option<String>,
    },
    /// Read a resource and print it
    Read {
        /// Resource URI
        uri: String,
    },
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            url: self.url.clone(),
            config_path: self.config.clone(),
            no_animation: self.no_animation,
        }
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let command = args.command.as_ref().unwrap_or(&Commands::Tui);
    let interactive = matches!(command, Commands::Tui);
    init_logging(&LogTarget::resolve(args.log.as_deref(), interactive))?;

    let settings = Settings::load(&args.overrides())?;
    if interactive {
        eprintln!("Connecting to {}...", settings.server.url);
    }
    let client = McpClient::connect(&settings.server).await?;
    info!(
        url = %client.url(),
        server = client.server_name().as_deref().unwrap_or("unknown"),
        protocol = %client.protocol_version(),
        "connected"
    );

    let mut stdout = io::stdout();
    match command {
        Commands::Tui => run_tui(settings, Arc::new(client)).await,
        Commands::Tools => print_metadata(&client, MetadataKind::Tools, &mut stdout).await,
        Commands::Resources => {
            print_metadata(&client, MetadataKind::Resources, &mut stdout).await
        }
        Commands::Prompts => print_metadata(&client, MetadataKind::Prompts, &mut stdout).await,
        Commands::Call { tool, args } => {
            call_tool(&client, tool, args.as_deref(), &mut stdout).await
        }
        Commands::Read { uri } => read_resource(&client, uri, &mut stdout).await,
    }
}

/// Parses `--args`; absent means no arguments.
pub(crate) fn parse_arguments(raw: Option<&str>) -> Result<Map<String, Value>, Box<dyn Error>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(arguments)) => Ok(arguments),
        Ok(_) => Err("Arguments must be a JSON object".into()),
        Err(err) => Err(format!("Invalid JSON arguments: {err}").into()),
    }
}

pub(crate) async fn call_tool(
    backend: &dyn McpBackend,
    tool: &str,
    raw_arguments: Option<&str>,
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>> {
    let arguments = parse_arguments(raw_arguments)?;
    let result = backend.call_tool(tool, arguments).await?;
    writeln!(out, "{}", result_markdown(&result))?;
    if is_error_result(&result) {
        return Err(format!("Tool {tool} reported an error").into());
    }
    Ok(())
}

pub(crate) async fn read_resource(
    backend: &dyn McpBackend,
    uri: &str,
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>> {
    let result = backend.read_resource(uri).await?;
    writeln!(out, "{}", resource_markdown(&result))?;
    Ok(())
}
