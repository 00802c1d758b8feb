use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use stockroom_core::api::{ApiError, Collection};
use stockroom_core::auth::{AuthState, Role};
use stockroom_core::{AppContext, Config};

/// Secret used by `login` instead of prompting, for scripted runs
const SECRET_ENV: &str = "STOCKROOM_SECRET";

pub const USAGE: &str = "\
Usage: stockroom <command>

Commands:
  login [identifier]        Sign in and store the session in the OS keychain
  logout                    Forget the stored session
  status                    Show who is signed in
  forgot-password <email>   Request a password reset message
  list <collection>         List users, products, catalogues or audit-logs
  get <path>                GET an API path (e.g. /api/products/7) and print the JSON
  help                      Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { identifier: Option<String> },
    Logout,
    Status,
    ForgotPassword { email: String },
    List { collection: Collection },
    Get { path: String },
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut args = args.iter().map(String::as_str);
        let command = match args.next() {
            None | Some("help") | Some("--help") | Some("-h") => Command::Help,
            Some("login") => Command::Login {
                identifier: args.next().map(str::to_string),
            },
            Some("logout") => Command::Logout,
            Some("status") => Command::Status,
            Some("forgot-password") => Command::ForgotPassword {
                email: args
                    .next()
                    .ok_or_else(|| anyhow!("forgot-password needs an email address"))?
                    .to_string(),
            },
            Some("list") => {
                let name = args
                    .next()
                    .ok_or_else(|| anyhow!("list needs a collection name"))?;
                let collection = Collection::from_name(name)
                    .ok_or_else(|| anyhow!("Unknown collection: {}", name))?;
                Command::List { collection }
            }
            Some("get") => Command::Get {
                path: args
                    .next()
                    .ok_or_else(|| anyhow!("get needs an API path"))?
                    .to_string(),
            },
            Some(other) => bail!("Unknown command: {}", other),
        };

        if let Some(extra) = args.next() {
            bail!("Unexpected argument: {}", extra);
        }
        Ok(command)
    }
}

pub async fn run(ctx: &AppContext, config: &mut Config, command: Command) -> Result<()> {
    match command {
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        Command::Login { identifier } => login(ctx, config, identifier).await,
        Command::Logout => {
            ctx.logout().await;
            println!("Signed out.");
            Ok(())
        }
        Command::Status => {
            print_status(ctx);
            Ok(())
        }
        Command::ForgotPassword { email } => {
            ctx.api
                .forgot_password(&email)
                .await
                .map_err(user_facing)?;
            println!("If {} has an account, a reset message is on its way.", email);
            Ok(())
        }
        Command::List { collection } => {
            require_session(ctx)?;
            let records: Vec<Value> = ctx
                .api
                .resource::<Value>(collection.path())
                .list()
                .await
                .map_err(user_facing)?;
            debug!(collection = collection.name(), count = records.len(), "Listed collection");
            print_json(&Value::Array(records))
        }
        Command::Get { path } => {
            require_session(ctx)?;
            let path = if path.starts_with("/api/") {
                path
            } else {
                format!("/api/{}", path.trim_start_matches('/'))
            };
            let body: Value = ctx.api.get(&path).await.map_err(user_facing)?;
            print_json(&body)
        }
    }
}

async fn login(ctx: &AppContext, config: &mut Config, identifier: Option<String>) -> Result<()> {
    let identifier = match identifier.or_else(|| config.last_identifier.clone()) {
        Some(identifier) => identifier,
        None => prompt_line("Username: ")?,
    };
    if identifier.is_empty() {
        bail!("Username and password required");
    }

    let secret = match std::env::var(SECRET_ENV) {
        Ok(secret) if !secret.is_empty() => secret,
        _ => rpassword::prompt_password(format!("Password for {}: ", identifier))
            .context("Failed to read password")?,
    };
    if secret.is_empty() {
        bail!("Username and password required");
    }

    ctx.login(&identifier, &secret)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    config.last_identifier = Some(identifier);
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }

    print_status(ctx);
    Ok(())
}

fn print_status(ctx: &AppContext) {
    match ctx.session.state() {
        AuthState::Authenticated(credential) => {
            let role = Role::from_authority(credential.role());
            if role.is_recognized() {
                println!("Signed in as {:?} ({})", role, credential.role());
            } else {
                // Unknown roles still get a session, just no elevated access
                println!("Signed in with unrecognized role {}", credential.role());
            }
        }
        AuthState::Unauthenticated => println!("Not signed in."),
        AuthState::Bootstrapping => println!("Session not loaded yet."),
    }
    println!("Server: {}", ctx.api.base_url());
}

fn require_session(ctx: &AppContext) -> Result<()> {
    if ctx.session.is_authenticated() {
        Ok(())
    } else {
        bail!("Not signed in. Run `stockroom login` first.")
    }
}

/// Replace transport detail with the message a person should see.
fn user_facing(err: ApiError) -> anyhow::Error {
    debug!(error = %err, "Request failed");
    let mut message = err.user_message();
    if err.is_authentication_expired() {
        message.push_str(" Run `stockroom login`.");
    }
    anyhow!(message)
}

fn print_json(value: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{}", text);
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
