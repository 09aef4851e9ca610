//! Account commands: register, login, logout, whoami.

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::client::{ApiClient, TokenPair};
use crate::output::{self, OutputFormat};
use crate::session::Session;

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account
    Register {
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "TASKGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Log in and save the session
    Login {
        username: String,
        #[arg(short, long, env = "TASKGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Revoke the saved refresh token and forget the session
    Logout,

    /// Show the logged-in user with current roles
    Whoami,
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize, Serialize)]
struct RegisteredUser {
    id: Uuid,
    username: String,
    email: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

pub async fn execute(cmd: AuthCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        AuthCommands::Register {
            username,
            email,
            password,
        } => {
            let body = RegisterRequest {
                username: &username,
                email: &email,
                password: &password,
            };
            let user: RegisteredUser = client.post("/api/v1/auth/register", &body).await?;

            match format {
                OutputFormat::Table => {
                    output::print_success(&format!("Registered {}", user.username));
                    output::print_detail("ID", &user.id.to_string());
                }
                _ => output::print_item(&user, format)?,
            }
        }

        AuthCommands::Login { username, password } => {
            let pair: TokenPair = client
                .post_public(
                    "/api/v1/auth/login",
                    &Credentials {
                        username: &username,
                        password: &password,
                    },
                )
                .await?;

            client
                .set_session(Some(Session {
                    username: username.clone(),
                    user_id: None,
                    access_token: pair.access_token,
                    refresh_token: pair.refresh_token,
                }))
                .await?;

            let profile: Profile = client.get("/api/v1/users/profile").await?;
            let mut session = client.session().await.context("Session lost after login")?;
            session.user_id = Some(profile.id);
            client.set_session(Some(session)).await?;

            match format {
                OutputFormat::Table => {
                    output::print_success(&format!("Logged in as {}", profile.username));
                    output::print_detail("Roles", &profile.roles.join(", "));
                    output::print_detail("Token lifetime", &format!("{}s", pair.expires_in));
                }
                _ => output::print_item(&profile, format)?,
            }
        }

        AuthCommands::Logout => {
            let Some(session) = client.session().await else {
                output::print_info("Not logged in.");
                return Ok(());
            };

            let revoked = client
                .post_public_empty(
                    "/api/v1/auth/logout",
                    &serde_json::json!({ "refresh_token": session.refresh_token }),
                )
                .await;
            client.set_session(None).await?;

            match revoked {
                Ok(()) => output::print_success("Logged out"),
                // Already spent or expired; the local session is gone either way.
                Err(e) => output::print_info(&format!("Session cleared ({:#})", e)),
            }
        }

        AuthCommands::Whoami => {
            let profile: Profile = client.get("/api/v1/users/profile").await?;
            match format {
                OutputFormat::Table => {
                    output::print_header(&profile.username);
                    output::print_detail("ID", &profile.id.to_string());
                    output::print_detail("Email", &profile.email);
                    output::print_detail("Roles", &profile.roles.join(", "));
                    output::print_detail("Permissions", &profile.permissions.join(", "));
                }
                _ => output::print_item(&profile, format)?,
            }
        }
    }

    Ok(())
}
