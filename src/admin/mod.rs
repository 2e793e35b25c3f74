//! Read-only admin API.
//!
//! Serves JSON snapshots of the shared resolution table and every router's
//! table. There is no authentication; bind it to loopback.

pub mod handlers;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::routing::{RouterView, SharedResolutionTable};
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub shared: SharedResolutionTable,
    pub routers: Arc<Vec<RouterView>>,
    pub started: Instant,
}

impl AdminState {
    pub fn new(shared: SharedResolutionTable, routers: Vec<RouterView>) -> Self {
        Self {
            shared,
            routers: Arc::new(routers),
            started: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/resolution", get(get_resolution))
        .route("/admin/routers", get(get_routers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn serve<F>(listener: TcpListener, state: AdminState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::routing::{MemoryNetwork, Router as DvRouter};

    fn state() -> AdminState {
        let network = MemoryNetwork::new();
        let shared = SharedResolutionTable::new();
        shared.insert("example.test", "10.0.0.9".parse().unwrap());

        let address = "127.0.0.1:5201".parse().unwrap();
        let mut router = DvRouter::new("r1", "127.0.0.1".parse().unwrap(), network.attach(address));
        router.add_direct_host("example.test", "10.0.0.9".parse().unwrap(), 1);
        router.add_neighbor("127.0.0.1:5202".parse().unwrap());
        router.export_to(shared.clone());

        AdminState::new(shared, vec![router.view()])
    }

    async fn get_json(path: &str) -> (StatusCode, Value) {
        let response = setup_admin_router(state())
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn status_counts_routers_and_entries() {
        let (status, json) = get_json("/admin/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["routers"], 1);
        assert_eq!(json["resolution_entries"], 1);
    }

    #[tokio::test]
    async fn resolution_lists_shared_table() {
        let (_, json) = get_json("/admin/resolution").await;
        assert_eq!(json["example.test"], "10.0.0.9");
    }

    #[tokio::test]
    async fn routers_include_table_and_neighbors() {
        let (_, json) = get_json("/admin/routers").await;
        let router = &json[0];
        assert_eq!(router["name"], "r1");
        assert_eq!(router["exporter"], true);
        assert_eq!(router["neighbors"][0], "127.0.0.1:5202");
        assert_eq!(router["routes"]["example.test"]["cost"], 1);
        assert_eq!(router["routes"]["example.test"]["via"], "10.0.0.9");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = setup_admin_router(state())
            .oneshot(Request::builder().uri("/admin/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
