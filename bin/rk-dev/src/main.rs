//! RosterKit Development Tool
//!
//! Drives the provisioning facade from the command line:
//! - `demo` runs a first and a second sign-up against the in-memory service
//! - `sign-up`, `log-in`, `verify`, `delete` and `list` talk to the
//!   configured remote service
//! - `print-config` emits an example configuration file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use rk_config::{AppConfig, ConfigLoader};
use rk_provisioning::{
    Account, Group, MemoryDataService, Provisioning, ProvisioningSettings, RetryPolicy, RoleName,
    SignUpRequest,
};

/// RosterKit Development Tool
#[derive(Parser, Debug)]
#[command(name = "rk-dev")]
#[command(about = "RosterKit development tool - account provisioning from the command line")]
struct Args {
    /// Configuration file (otherwise ROSTERKIT_CONFIG or the default locations)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap an in-memory application and show the result
    Demo,

    /// Create and provision an account
    SignUp {
        username: String,
        #[arg(long, env = "ROSTERKIT_PASSWORD")]
        password: String,
        #[arg(long)]
        email: Option<String>,
        /// Index of a configured group to preselect
        #[arg(long)]
        group: Option<u32>,
    },

    /// Log in through the verification gate
    LogIn {
        username: String,
        #[arg(long, env = "ROSTERKIT_PASSWORD")]
        password: String,
    },

    /// Mark an account verified
    Verify { account_id: String },

    /// Delete an account
    Delete { account_id: String },

    /// List accounts ordered by member index
    List {
        /// Include accounts that are not verified yet
        #[arg(long)]
        all: bool,
    },

    /// Print an example configuration file
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (JSON if LOG_FORMAT=json, text otherwise)
    rk_common::init_logging("rk-dev");

    let args = Args::parse();

    let result = match args.command {
        Command::Demo => run_demo().await,
        Command::PrintConfig => {
            print!("{}", AppConfig::example_toml());
            Ok(())
        }
        command => match load_config(args.config) {
            Ok(config) => {
                info!(server_url = %config.service.server_url, "Using remote data service");
                match Provisioning::from_config(&config) {
                    Ok(provisioning) => run_remote(&provisioning, &config, command).await,
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err),
        },
    };

    if let Err(ref err) = result {
        if let Some(message) = user_facing(err) {
            eprintln!("{}", message);
            std::process::exit(1);
        }
    }
    result
}

/// Provisioning failures are reported with their end-user message; anything
/// else keeps the full error chain.
fn user_facing(err: &anyhow::Error) -> Option<String> {
    err.downcast_ref::<rk_provisioning::Error>()
        .map(rk_provisioning::Error::user_message)
}

fn load_config(path: Option<PathBuf>) -> Result<AppConfig> {
    let loader = match path {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    Ok(loader.load()?)
}

async fn run_remote(
    provisioning: &Provisioning,
    config: &AppConfig,
    command: Command,
) -> Result<()> {
    match command {
        Command::SignUp {
            username,
            password,
            email,
            group,
        } => {
            let mut request = SignUpRequest::new(username, password);
            if let Some(email) = email {
                request = request.with_email(email);
            }
            if let Some(index) = group {
                let group = config
                    .groups
                    .iter()
                    .find(|g| g.index == index)
                    .map(Group::from)
                    .ok_or_else(|| anyhow::anyhow!("No configured group with index {}", index))?;
                request = request.with_group(&group);
            }

            let account = provisioning.sign_up(request).await?;
            provisioning.request_verification().await?;
            print_account(&account)?;
        }
        Command::LogIn { username, password } => {
            let account = provisioning.log_in(&username, &password).await?;
            print_account(&account)?;
        }
        Command::Verify { account_id } => {
            provisioning.verify_account(&account_id).await?;
            println!("Verified {}", account_id);
        }
        Command::Delete { account_id } => {
            provisioning.delete_account(&account_id).await?;
            println!("Deleted {}", account_id);
        }
        Command::List { all } => {
            let accounts = provisioning.all_accounts(false, all).await?;
            print_listing(&accounts);
        }
        Command::Demo | Command::PrintConfig => {}
    }
    Ok(())
}

async fn run_demo() -> Result<()> {
    let service = Arc::new(MemoryDataService::new());
    let settings = ProvisioningSettings {
        retry: RetryPolicy::default(),
        groups: vec![Group::new(0, "Core"), Group::new(1, "Ops")],
    };
    let provisioning = Provisioning::new(service.clone(), settings);

    info!("Signing up the first account");
    let alice = provisioning
        .sign_up(SignUpRequest::new("alice", "alice-password"))
        .await?;
    print_account(&alice)?;

    info!("Signing up a second account");
    let bob = provisioning
        .sign_up(SignUpRequest::new("bob", "bob-password").with_group(&Group::new(1, "Ops")))
        .await?;
    print_account(&bob)?;

    // Verification is an administrator action; simulate it here
    provisioning.verify_account(&alice.id).await?;
    provisioning.verify_account(&bob.id).await?;
    provisioning.log_in("bob", "bob-password").await?;

    println!(
        "administrator: {:?}",
        service.role_members(RoleName::Administrator)
    );
    println!("normal: {:?}", service.role_members(RoleName::Normal));
    println!(
        "groups: {}",
        service
            .groups()
            .iter()
            .map(|g| format!("{}:{}", g.index, g.name))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let accounts = provisioning.all_accounts(true, false).await?;
    print_listing(&accounts);
    Ok(())
}

fn print_account(account: &Account) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(account)?);
    Ok(())
}

fn print_listing(accounts: &[Account]) {
    for account in accounts {
        println!(
            "{:>4}  {:<24} {:<8} {}",
            account
                .member_index
                .map(|i| i.to_string())
                .unwrap_or_else(|| "-".to_string()),
            account.username,
            if account.is_admin { "admin" } else { "member" },
            account.group_name.as_deref().unwrap_or("-"),
        );
    }
}
