use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use windowworks_api::{
    auth::{AuthConfig, AuthService, Role},
    config::{self, AppConfig},
    db,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);

    match cli.command {
        Commands::Migrate => handle_migrate(&config).await?,
        Commands::IssueToken(args) => handle_issue_token(&config, args, cli.json)?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "windowworks-cli", about = "WindowWorks maintenance and development tooling", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Mint an access token for a user (development and tooling)
    IssueToken(IssueTokenArgs),
}

#[derive(Args)]
struct IssueTokenArgs {
    /// User id placed in the `sub` claim
    #[arg(long)]
    user_id: Uuid,
    /// Role to grant; repeat for several (e.g. --role manager --role installer)
    #[arg(long = "role", required = true)]
    roles: Vec<Role>,
    /// Display name placed in the `name` claim
    #[arg(long)]
    name: Option<String>,
}

#[derive(Serialize)]
struct IssuedToken {
    user_id: Uuid,
    roles: Vec<Role>,
    token: String,
    expires_in_secs: usize,
}

async fn handle_migrate(config: &AppConfig) -> Result<()> {
    let pool = db::establish_connection_with_config(&db::DbConfig::from(config))
        .await
        .context("failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;
    println!("Migrations applied");
    Ok(())
}

fn handle_issue_token(config: &AppConfig, args: IssueTokenArgs, json: bool) -> Result<()> {
    let auth = AuthService::new(AuthConfig::from(config));
    let token = auth
        .issue_token(args.user_id, args.name, &args.roles)
        .context("failed to issue token")?;

    if json {
        let issued = IssuedToken {
            user_id: args.user_id,
            roles: args.roles,
            token,
            expires_in_secs: config.jwt_expiration,
        };
        println!("{}", serde_json::to_string_pretty(&issued)?);
    } else {
        println!("{}", token);
    }
    Ok(())
}
