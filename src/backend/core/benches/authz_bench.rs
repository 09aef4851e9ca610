//! Authorization hot-path benchmarks. Run with: cargo bench --bench authz_bench
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskgate_core::auth::{AccessClaims, TokenConfig, TokenService};
use taskgate_core::db::{MemoryStore, Store};
use taskgate_core::middleware::Principal;
use taskgate_core::rbac::{evaluate_chain, Action, Gate, PolicyStore, PredefinedRole};
use uuid::Uuid;

fn token_service() -> TokenService {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let config = TokenConfig { secret: "benchmark-signing-secret-0123456789abcdef".into(), access_ttl: chrono::Duration::minutes(15), refresh_ttl: chrono::Duration::hours(1) };
    TokenService::new(config, store.clone(), PolicyStore::new(store))
}

fn principal(role: PredefinedRole) -> Principal {
    Principal { user_id: Uuid::new_v4(), username: "bench".into(), roles: vec![role.name().to_string()], permissions: role.permissions().iter().map(|p| p.to_string()).collect() }
}

fn claims(role: PredefinedRole) -> AccessClaims {
    let p = principal(role); let now = chrono::Utc::now().timestamp();
    AccessClaims { user_id: p.user_id, username: p.username, roles: p.roles, permissions: p.permissions, iat: now, exp: now + 900 }
}

fn bench_access_tokens(c: &mut Criterion) {
    let mut g = c.benchmark_group("access_tokens"); g.measurement_time(Duration::from_secs(5));
    let svc = token_service();
    for role in PredefinedRole::all() {
        let cl = claims(role);
        g.bench_function(BenchmarkId::new("encode", role.name()), |b| { b.iter(|| black_box(svc.encode_claims(&cl).unwrap())); });
        let token = svc.encode_claims(&cl).unwrap();
        g.bench_function(BenchmarkId::new("validate", role.name()), |b| { b.iter(|| black_box(svc.validate_access_token(&token).unwrap())); });
    }
    let mut tampered = svc.encode_claims(&claims(PredefinedRole::User)).unwrap(); tampered.push('x');
    g.bench_function("validate_tampered", |b| { b.iter(|| black_box(svc.validate_access_token(&tampered).is_err())); });
    g.finish();
}

fn bench_gates(c: &mut Criterion) {
    let mut g = c.benchmark_group("gates");
    let user = principal(PredefinedRole::User); let admin = principal(PredefinedRole::Admin);
    let none = HashMap::new();
    let own = HashMap::from([("user_id".to_string(), user.user_id.to_string())]);
    let other = HashMap::from([("user_id".to_string(), Uuid::new_v4().to_string())]);
    let admin_list = [Gate::role_and_permission("admin", "tasks", Action::Read)];
    let owned_list = [Gate::permission("tasks", Action::Read), Gate::ownership_or_admin("user_id")];
    g.bench_function("permission_allow", |b| { let gate = [Gate::permission("tasks", Action::Create)]; b.iter(|| black_box(evaluate_chain(&gate, &user, &none).is_ok())); });
    g.bench_function("role_and_permission_deny", |b| { b.iter(|| black_box(evaluate_chain(&admin_list, &user, &none).is_err())); });
    g.bench_function("role_and_permission_allow", |b| { b.iter(|| black_box(evaluate_chain(&admin_list, &admin, &none).is_ok())); });
    g.bench_function("ownership_own", |b| { b.iter(|| black_box(evaluate_chain(&owned_list, &user, &own).is_ok())); });
    g.bench_function("ownership_other", |b| { b.iter(|| black_box(evaluate_chain(&owned_list, &user, &other).is_err())); });
    g.bench_function("ownership_admin_bypass", |b| { b.iter(|| black_box(evaluate_chain(&owned_list, &admin, &other).is_ok())); });
    g.finish();
}

fn bench_policy_resolution(c: &mut Criterion) {
    let mut g = c.benchmark_group("policy_resolution"); g.measurement_time(Duration::from_secs(5));
    let rt = tokio::runtime::Runtime::new().unwrap();
    for &users in &[10usize, 100, 1000] {
        g.throughput(Throughput::Elements(1));
        let (policy, ids) = rt.block_on(async {
            let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
            let policy = PolicyStore::new(store.clone()); policy.seed_defaults().await.unwrap();
            let mut ids = Vec::with_capacity(users);
            for i in 0..users {
                let u = store.insert_user(taskgate_core::db::NewUser { username: format!("user{}", i), email: format!("user{}@example.com", i), password_hash: "x".into() }).await.unwrap();
                policy.assign_default_role(u.id).await.unwrap();
                if i % 10 == 0 { policy.assign_role(u.id, "admin").await.unwrap(); }
                ids.push(u.id);
            }
            (policy, ids)
        });
        g.bench_with_input(BenchmarkId::new("resolve", users), &users, |b, _| {
            let mut i = 0usize;
            b.to_async(&rt).iter(|| { i = (i + 1) % ids.len(); let (policy, id) = (policy.clone(), ids[i]); async move { black_box(policy.resolve(id).await.unwrap()) } });
        });
    }
    g.finish();
}

criterion_group!(benches, bench_access_tokens, bench_gates, bench_policy_resolution);
criterion_main!(benches);
