//! 测试用的进程内 package-audit API

use super::{Manager, Package};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 卸载这个包时模拟底层命令失败
pub const FAILING_PACKAGE: &str = "locked-pkg";

#[derive(Default)]
struct MockState {
    managers: Vec<Manager>,
    packages: HashMap<String, Vec<Package>>,
    /// 快照 id -> (管理器, 当时已安装的包名)
    snapshots: HashMap<String, (String, Vec<String>)>,
    requests: usize,
    list_calls: usize,
}

impl MockState {
    /// 卸载前记录一次快照，id 依次为 snap-1、snap-2 ...
    fn snapshot(&mut self, manager: &str) -> String {
        let names = self
            .packages
            .get(manager)
            .map(|pkgs| pkgs.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default();
        let id = format!("snap-{}", self.snapshots.len() + 1);
        self.snapshots.insert(id.clone(), (manager.to_string(), names));
        id
    }
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockApi {
    pub base_url: String,
    state: Shared,
}

impl MockApi {
    pub fn add_package(&self, manager: &str, name: &str, version: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .packages
            .entry(manager.to_string())
            .or_default()
            .push(Package {
                name: name.to_string(),
                version: version.to_string(),
            });
    }

    pub fn requests(&self) -> usize {
        self.state.lock().unwrap().requests
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }
}

/// 启动服务：发现结果只有 npm 10.2.0，npm 装了 left-pad 1.3.0，pip 装了 flask 2.0
pub async fn spawn() -> MockApi {
    let mut seeded = MockState {
        managers: vec![Manager {
            id: "npm".to_string(),
            name: "npm".to_string(),
            version: "10.2.0".to_string(),
        }],
        ..Default::default()
    };
    seeded.packages.insert(
        "npm".to_string(),
        vec![Package {
            name: "left-pad".to_string(),
            version: "1.3.0".to_string(),
        }],
    );
    seeded.packages.insert(
        "pip".to_string(),
        vec![Package {
            name: "flask".to_string(),
            version: "2.0".to_string(),
        }],
    );
    let state: Shared = Arc::new(Mutex::new(seeded));

    let app = Router::new()
        .route("/api/discover", post(discover))
        .route("/api/managers/:id/packages", get(list_packages))
        .route("/api/managers/:id/packages/:name", delete(uninstall))
        .route("/api/advanced/:id/batch-uninstall", post(batch_uninstall))
        .route("/api/advanced/:id/rollback/:snapshot_id", post(rollback))
        .route("/api/advanced/:id/lockfile", get(lockfile))
        .route("/api/advanced/:id/vulnerabilities", get(vulnerabilities))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockApi {
        base_url: format!("http://{addr}"),
        state,
    }
}

fn not_found(detail: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": detail }))).into_response()
}

async fn discover(State(state): State<Shared>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.requests += 1;
    Json(json!({ "managers": state.managers }))
}

async fn list_packages(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    state.requests += 1;
    state.list_calls += 1;
    match state.packages.get(&id) {
        Some(packages) => Json(json!({
            "manager_id": id,
            "manager_name": id,
            "total": packages.len(),
            "packages": packages,
        }))
        .into_response(),
        None => not_found(format!("Manager {id} not found.")),
    }
}

async fn uninstall(
    State(state): State<Shared>,
    Path((id, name)): Path<(String, String)>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests += 1;
    let Some(packages) = state.packages.get(&id) else {
        return not_found(format!("Manager {id} not found."));
    };
    let Some(pos) = packages.iter().position(|p| p.name == name) else {
        return not_found(format!("Package {name} not installed."));
    };
    if name == FAILING_PACKAGE {
        return Json(json!({
            "manager": id,
            "package": name,
            "success": false,
            "command": { "stdout": "", "stderr": "EACCES: permission denied\n", "returncode": 243 },
        }))
        .into_response();
    }
    let snapshot_id = state.snapshot(&id);
    if let Some(packages) = state.packages.get_mut(&id) {
        packages.remove(pos);
    }
    Json(json!({
        "manager": id,
        "package": name,
        "force": false,
        "success": true,
        "snapshot_id": snapshot_id,
    }))
    .into_response()
}

#[derive(Deserialize)]
struct BatchBody {
    packages: Vec<String>,
}

async fn batch_uninstall(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<BatchBody>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests += 1;
    if !state.packages.contains_key(&id) {
        return not_found(format!("Manager {id} not found."));
    }
    let snapshot_id = state.snapshot(&id);
    let Some(installed) = state.packages.get_mut(&id) else {
        return not_found(format!("Manager {id} not found."));
    };
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for name in &body.packages {
        match installed.iter().position(|p| &p.name == name) {
            Some(pos) => {
                installed.remove(pos);
                succeeded.push(name.clone());
            }
            None => failed.push(json!({ "package": name, "error": "not installed" })),
        }
    }
    Json(json!({
        "manager": id,
        "total": body.packages.len(),
        "succeeded": succeeded,
        "failed": failed,
        "snapshot_id": snapshot_id,
    }))
    .into_response()
}

async fn rollback(
    State(state): State<Shared>,
    Path((id, snapshot_id)): Path<(String, String)>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests += 1;
    let Some((manager, kept)) = state.snapshots.get(&snapshot_id).cloned() else {
        return not_found(format!("Snapshot {snapshot_id} not found"));
    };
    let Some(installed) = state.packages.get_mut(&id) else {
        return not_found(format!("Manager {id} not found."));
    };
    let mut uninstalled = Vec::new();
    if manager == id {
        installed.retain(|p| {
            let keep = kept.contains(&p.name);
            if !keep {
                uninstalled.push(p.name.clone());
            }
            keep
        });
    }
    Json(json!({
        "snapshot_id": snapshot_id,
        "manager": id,
        "uninstalled": uninstalled,
        "failed": [],
        "note": "Only uninstall rollback is implemented. Install functionality needed for full rollback.",
    }))
    .into_response()
}

async fn lockfile(State(state): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    state.lock().unwrap().requests += 1;
    Json(match id.as_str() {
        "pip" => json!({ "format": "requirements.txt", "lockfile": "flask==2.0\n" }),
        "npm" => json!({
            "format": "npm-list-json",
            "lockfile": { "dependencies": { "left-pad": { "version": "1.3.0" } } },
        }),
        _ => json!({ "error": format!("Lockfile export not supported for {id}") }),
    })
}

async fn vulnerabilities(State(state): State<Shared>, Path(id): Path<String>) -> Json<Value> {
    state.lock().unwrap().requests += 1;
    Json(json!({
        "manager": id,
        "vulnerabilities": [
            { "package": "left-pad", "title": "Prototype pollution", "severity": "high" }
        ],
    }))
}
