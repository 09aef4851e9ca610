//! User administration commands (admin role required server-side).

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use uuid::Uuid;

use super::auth::Profile;
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all users
    List,

    /// Show a user with roles and permissions
    Show { user_id: Uuid },

    /// Delete a user and revoke their refresh tokens
    Delete { user_id: Uuid },

    /// Grant a role
    Grant { user_id: Uuid, role: String },

    /// Revoke a role
    Revoke { user_id: Uuid, role: String },
}

#[derive(Debug, Deserialize, Serialize)]
struct UserInfo {
    id: Uuid,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct RoleChange {
    user_id: Uuid,
    role: String,
    changed: bool,
}

fn print_role_change(change: &RoleChange, verb: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table if change.changed => {
            output::print_success(&format!("Role '{}' {} for {}", change.role, verb, change.user_id));
            Ok(())
        }
        OutputFormat::Table => {
            output::print_info(&format!("No change to role '{}' for {}", change.role, change.user_id));
            Ok(())
        }
        _ => output::print_item(change, format),
    }
}

pub async fn execute(cmd: UserCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        UserCommands::List => {
            let users: Vec<UserInfo> = client.get("/api/v1/users").await?;
            let rows: Vec<UserRow> = users
                .into_iter()
                .map(|u| UserRow {
                    id: output::short_id(&u.id),
                    username: u.username,
                    email: u.email,
                    created_at: u.created_at.format("%Y-%m-%d %H:%M").to_string(),
                })
                .collect();
            output::print_list(&rows, format)?;
        }

        UserCommands::Show { user_id } => {
            let profile: Profile = client
                .get(&format!("/api/v1/users/profile/{}", user_id))
                .await?;
            match format {
                OutputFormat::Table => {
                    output::print_header(&profile.username);
                    output::print_detail("ID", &profile.id.to_string());
                    output::print_detail("Email", &profile.email);
                    output::print_detail("Roles", &profile.roles.join(", "));
                }
                _ => output::print_item(&profile, format)?,
            }
        }

        UserCommands::Delete { user_id } => {
            client.delete(&format!("/api/v1/users/{}", user_id)).await?;
            output::print_success(&format!("User {} deleted", user_id));
        }

        UserCommands::Grant { user_id, role } => {
            let change: RoleChange = client
                .post(
                    &format!("/api/v1/users/{}/roles", user_id),
                    &serde_json::json!({ "role": role }),
                )
                .await?;
            print_role_change(&change, "granted", format)?;
        }

        UserCommands::Revoke { user_id, role } => {
            let change: RoleChange = client
                .delete_with(&format!("/api/v1/users/{}/roles/{}", user_id, role))
                .await?;
            print_role_change(&change, "revoked", format)?;
        }
    }

    Ok(())
}
