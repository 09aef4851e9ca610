//! Task management commands.
//!
//! Provides create, list, get, update, and delete operations for tasks.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task
    Create {
        /// Task title
        title: String,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long, value_enum)]
        priority: Option<Priority>,

        /// Due date (RFC 3339)
        #[arg(long)]
        due: Option<DateTime<Utc>>,

        /// Owner (admins only)
        #[arg(long)]
        owner: Option<Uuid>,
    },

    /// List tasks (your own unless --all or --user is given)
    List {
        /// Every task in the system (admins only)
        #[arg(long, conflicts_with = "user")]
        all: bool,

        /// Tasks owned by this user
        #[arg(long)]
        user: Option<Uuid>,
    },

    /// Show a task
    Get { task_id: Uuid },

    /// Update fields of a task
    Update {
        task_id: Uuid,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long, value_enum)]
        status: Option<Status>,

        #[arg(short, long, value_enum)]
        priority: Option<Priority>,

        #[arg(long)]
        due: Option<DateTime<Utc>>,

        /// Reassign (admins only)
        #[arg(long)]
        owner: Option<Uuid>,
    },

    /// Delete a task
    Delete { task_id: Uuid },
}

#[derive(Debug, Clone, Copy, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

// ── API types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CreateTaskRequest {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
}

#[derive(Serialize)]
struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TaskInfo {
    id: Uuid,
    title: String,
    #[serde(default)]
    description: String,
    status: String,
    priority: String,
    due_date: Option<DateTime<Utc>>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Owner")]
    owner: String,
}

impl From<TaskInfo> for TaskRow {
    fn from(t: TaskInfo) -> Self {
        Self {
            id: output::short_id(&t.id),
            title: t.title,
            status: t.status,
            priority: t.priority,
            due: t.due_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            owner: output::short_id(&t.user_id),
        }
    }
}

fn print_task(task: &TaskInfo, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            output::print_header(&task.title);
            output::print_detail("ID", &task.id.to_string());
            output::print_detail("Status", &task.status);
            output::print_detail("Priority", &task.priority);
            if !task.description.is_empty() {
                output::print_detail("Description", &task.description);
            }
            if let Some(due) = task.due_date {
                output::print_detail("Due", &due.to_rfc3339());
            }
            output::print_detail("Owner", &task.user_id.to_string());
            output::print_detail("Created", &task.created_at.to_rfc3339());
            Ok(())
        }
        _ => output::print_item(task, format),
    }
}

// ── Execution ───────────────────────────────────────────────────────────────

pub async fn execute(cmd: TaskCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        TaskCommands::Create {
            title,
            description,
            priority,
            due,
            owner,
        } => {
            let body = CreateTaskRequest {
                title,
                description,
                priority,
                due_date: due,
                user_id: owner,
            };
            let task: TaskInfo = client.post("/api/v1/tasks", &body).await?;
            if let OutputFormat::Table = format {
                output::print_success("Task created");
            }
            print_task(&task, format)?;
        }

        TaskCommands::List { all, user } => {
            let path = if all {
                "/api/v1/tasks".to_string()
            } else {
                let user_id = match user {
                    Some(id) => id,
                    None => client
                        .session()
                        .await
                        .and_then(|s| s.user_id)
                        .context("Not logged in; run `taskgate auth login` first")?,
                };
                format!("/api/v1/users/{}/tasks", user_id)
            };

            let tasks: Vec<TaskInfo> = client.get(&path).await?;
            let rows: Vec<TaskRow> = tasks.into_iter().map(TaskRow::from).collect();
            output::print_list(&rows, format)?;
        }

        TaskCommands::Get { task_id } => {
            let task: TaskInfo = client.get(&format!("/api/v1/tasks/{}", task_id)).await?;
            print_task(&task, format)?;
        }

        TaskCommands::Update {
            task_id,
            title,
            description,
            status,
            priority,
            due,
            owner,
        } => {
            let body = UpdateTaskRequest {
                title,
                description,
                status,
                priority,
                due_date: due,
                user_id: owner,
            };
            let task: TaskInfo = client
                .put(&format!("/api/v1/tasks/{}", task_id), &body)
                .await?;
            if let OutputFormat::Table = format {
                output::print_success("Task updated");
            }
            print_task(&task, format)?;
        }

        TaskCommands::Delete { task_id } => {
            client.delete(&format!("/api/v1/tasks/{}", task_id)).await?;
            output::print_success(&format!("Task {} deleted", task_id));
        }
    }

    Ok(())
}
