//! Role-based access control with an ownership overlay.
//!
//! This module provides:
//! - **Models**: `resource:action` permissions
//! - **Predefined Roles**: `admin` and `user` with default permission sets
//! - **Policy Store**: resolves a user's roles and permissions for issuance
//! - **Authorization Middleware**: composable gates evaluated from token claims
//! - **Ownership**: handler-level checks once a record has been loaded
//!
//! # Usage
//!
//! ```rust,ignore
//! use taskgate_core::rbac::{Action, Gate, GateLayer};
//!
//! let app = Router::new()
//!     .route("/api/v1/tasks", get(list_tasks))
//!     .route_layer(GateLayer::new([
//!         Gate::role_and_permission("admin", "tasks", Action::Read),
//!     ]));
//! ```

pub mod middleware;
pub mod models;
pub mod ownership;
pub mod policy;
pub mod roles;

pub use middleware::{evaluate_chain, Gate, GateDenial, GateLayer, GateService};
pub use models::{Action, Permission};
pub use ownership::{authorize_resource, ensure_owner_or_admin, owner_for_create, Owned};
pub use policy::{PolicyStore, ResolvedGrants};
pub use roles::{PredefinedRole, ADMIN_ROLE, DEFAULT_ROLE};
