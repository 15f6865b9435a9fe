use clap::{Parser, Subcommand};
use serde_json::json;

mod commands;
mod util;

#[derive(Parser)]
#[command(
    name = "attache",
    version,
    about = "Attache CLI: ask the agent, review pending actions, approve or execute them"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "ATTACHE_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Send a message to the agent
    Ask {
        #[arg(long)]
        user_id: i64,
        /// The message, verbatim
        message: String,
    },
    /// List a user's pending actions
    Pending {
        #[arg(long)]
        user_id: i64,
    },
    /// Approve and execute a pending action
    Approve {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        action_id: i64,
    },
    /// Execute an action directly, bypassing the approval flow
    Execute {
        #[arg(long)]
        user_id: i64,
        /// Canonical provider ("google" or "asana")
        #[arg(long)]
        provider: String,
        /// Tool name (e.g. "send_gmail", "create_asana_task")
        #[arg(long)]
        tool: String,
        /// Tool parameters as a JSON object string
        #[arg(long, default_value = "{}")]
        parameters: String,
    },
}

fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", serde_json::to_string_pretty(&err).unwrap());
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Ask { user_id, message } => {
            commands::agent::ask(&cli.api_url, user_id, &message).await
        }
        Commands::Pending { user_id } => commands::agent::pending(&cli.api_url, user_id).await,
        Commands::Approve { user_id, action_id } => {
            commands::agent::approve(&cli.api_url, user_id, action_id).await
        }
        Commands::Execute {
            user_id,
            provider,
            tool,
            parameters,
        } => {
            let parameters: serde_json::Value = match serde_json::from_str(&parameters) {
                Ok(v) => v,
                Err(e) => exit_error(
                    &format!("Invalid JSON in --parameters: {e}"),
                    Some("Pass a JSON object, e.g. '{\"to\":\"a@b.com\"}'"),
                ),
            };
            commands::agent::execute(&cli.api_url, user_id, &provider, &tool, parameters).await
        }
    };

    std::process::exit(exit_code);
}
