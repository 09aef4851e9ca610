//! V1 API routes for Taskgate.
//!
//! Every route outside `/auth` sits behind [`AuthLayer`]. Authorization is
//! attached per method with `route_layer`, so gates see the matched path
//! parameters and unmatched paths still fall through to 404.

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use super::{auth, tasks, users};
use crate::api::AppState;
use crate::middleware::auth::AuthLayer;
use crate::rbac::{Action, Gate, GateLayer, ADMIN_ROLE};

/// V1 API prefix.
pub const V1_PREFIX: &str = "/api/v1";

/// Route paths relative to [`V1_PREFIX`].
pub mod paths {
    pub const REGISTER: &str = "/auth/register";
    pub const LOGIN: &str = "/auth/login";
    pub const REFRESH: &str = "/auth/refresh";
    pub const LOGOUT: &str = "/auth/logout";

    pub const TASKS: &str = "/tasks";
    pub const TASK: &str = "/tasks/:id";

    pub const USERS: &str = "/users";
    pub const PROFILE: &str = "/users/profile";
    pub const PROFILE_BY_ID: &str = "/users/profile/:user_id";
    pub const USER: &str = "/users/:user_id";
    pub const USER_TASKS: &str = "/users/:user_id/tasks";
    pub const USER_ROLES: &str = "/users/:user_id/roles";
    pub const USER_ROLE: &str = "/users/:user_id/roles/:role";

    pub const ADMIN_DASHBOARD: &str = "/admin/dashboard";
}

fn gates(gates: impl IntoIterator<Item = Gate>) -> GateLayer {
    GateLayer::new(gates)
}

/// Build the V1 API router.
///
/// # Endpoints
///
/// ## Auth (public)
/// - `POST /auth/register`, `/auth/login`, `/auth/refresh`, `/auth/logout`
///
/// ## Tasks
/// - `POST /tasks` - `tasks:create`
/// - `GET /tasks` - admin with `tasks:read`
/// - `GET|PUT|DELETE /tasks/:id` - matching `tasks` permission, then ownership
///
/// ## Users
/// - `GET /users` - admin with `users:read`
/// - `GET /users/profile` - any authenticated caller
/// - `GET /users/profile/:user_id` - admin with `users:read`
/// - `DELETE /users/:user_id` - admin with `users:delete`
/// - `GET /users/:user_id/tasks` - `tasks:read`, owner or admin
/// - `POST /users/:user_id/roles` - admin with `roles:assign`
/// - `DELETE /users/:user_id/roles/:role` - admin with `roles:revoke`
///
/// ## Admin
/// - `GET /admin/dashboard` - admin role
pub fn v1_router(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route(paths::REGISTER, post(auth::register))
        .route(paths::LOGIN, post(auth::login))
        .route(paths::REFRESH, post(auth::refresh))
        .route(paths::LOGOUT, post(auth::logout));

    let protected = Router::new()
        // Tasks
        .route(
            paths::TASKS,
            post(tasks::create_task)
                .route_layer(gates([Gate::permission("tasks", Action::Create)]))
                .merge(get(tasks::list_tasks).route_layer(gates([
                    Gate::role_and_permission(ADMIN_ROLE, "tasks", Action::Read),
                ]))),
        )
        .route(
            paths::TASK,
            get(tasks::get_task)
                .route_layer(gates([Gate::permission("tasks", Action::Read)]))
                .merge(
                    put(tasks::update_task)
                        .route_layer(gates([Gate::permission("tasks", Action::Update)])),
                )
                .merge(
                    delete(tasks::delete_task)
                        .route_layer(gates([Gate::permission("tasks", Action::Delete)])),
                ),
        )
        // Users
        .route(
            paths::USERS,
            get(users::list_users).route_layer(gates([Gate::role_and_permission(
                ADMIN_ROLE,
                "users",
                Action::Read,
            )])),
        )
        .route(paths::PROFILE, get(users::get_profile))
        .route(
            paths::PROFILE_BY_ID,
            get(users::get_profile_by_id).route_layer(gates([Gate::role_and_permission(
                ADMIN_ROLE,
                "users",
                Action::Read,
            )])),
        )
        .route(
            paths::USER,
            delete(users::delete_user).route_layer(gates([Gate::role_and_permission(
                ADMIN_ROLE,
                "users",
                Action::Delete,
            )])),
        )
        .route(
            paths::USER_TASKS,
            get(users::list_user_tasks).route_layer(gates([
                Gate::permission("tasks", Action::Read),
                Gate::ownership_or_admin("user_id"),
            ])),
        )
        .route(
            paths::USER_ROLES,
            post(users::assign_role).route_layer(gates([Gate::role_and_permission(
                ADMIN_ROLE,
                "roles",
                Action::Assign,
            )])),
        )
        .route(
            paths::USER_ROLE,
            delete(users::revoke_role).route_layer(gates([Gate::role_and_permission(
                ADMIN_ROLE,
                "roles",
                Action::Revoke,
            )])),
        )
        // Admin
        .route(
            paths::ADMIN_DASHBOARD,
            get(users::admin_dashboard).route_layer(gates([Gate::role([ADMIN_ROLE])])),
        )
        .layer(AuthLayer::new(state.tokens.clone()));

    public.merge(protected)
}
