//! htbmcp is a terminal client for the HackTheBox CTF MCP server.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns application state, the metadata cache, the typewriter
//!   reveal engine, configuration, selection persistence and exports.
//! - [`mcp`] speaks the Model Context Protocol over streamable HTTP,
//!   including SSE-framed responses and session handling.
//! - [`ui`] renders the terminal interface and runs the event loop that
//!   turns key presses into actions and background tasks.
//! - [`cli`] parses arguments and runs the non-interactive subcommands.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod cli;
pub mod core;
pub mod mcp;
pub mod ui;
pub mod utils;
