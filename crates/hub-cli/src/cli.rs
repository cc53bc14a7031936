use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hub-cli", version)]
#[command(about = "Operator CLI for the MCP Tool Dispatch Hub")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the hub config file (server map + executor policy)
    #[arg(long, global = true, default_value = "hub.toml")]
    pub config: std::path::PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect to every configured server and report status
    ListConnections,

    /// List the tools advertised by one connected server
    ListTools {
        /// Server name, as configured
        server: String,
    },

    /// Invoke a single tool through the Tool Executor
    CallTool {
        server: String,
        tool: String,
        /// JSON object of call arguments
        #[arg(default_value = "{}")]
        arguments: String,
    },

    /// Run a composed tool from a definition file
    RunComposed {
        /// Path to a JSON `ComposedTool` definition
        definition: std::path::PathBuf,
        /// JSON object of composed-tool params
        #[arg(default_value = "{}")]
        params: String,
    },
}
