//! AuthZ gRPC Server
//!
//! Builds the credential store before binding; a store that cannot be built
//! stops startup.

use crate::{ExtAuthzService, Reloader, Result, ServerConfig};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tenant_authz::{CredentialSource, CredentialStore, DecisionPoint, DirectorySource, StoreHandle};
use tokio::sync::watch;
use tonic::transport::Server;
use tracing::info;

/// ext_authz server with its published store
pub struct AuthzServer {
    addr: SocketAddr,
    point: Arc<DecisionPoint>,
    reloader: Reloader,
    config: ServerConfig,
}

impl AuthzServer {
    /// Load credentials and prepare the decision point
    pub fn bootstrap(config: ServerConfig) -> Result<Self> {
        let addr = config.socket_addr()?;
        let source: Arc<dyn CredentialSource> =
            Arc::new(DirectorySource::from_config(&config.authz.source));

        let store = CredentialStore::load(source.as_ref(), &config.authz.store)?;
        info!(
            "Loaded {} tenants from {}",
            store.len(),
            config.authz.source.directory.display()
        );

        let handle = Arc::new(StoreHandle::new(store));
        let point = Arc::new(DecisionPoint::new(
            handle.clone(),
            config.authz.decision.clone(),
        )?);
        let reloader = Reloader::new(handle, source, config.authz.store.clone());

        Ok(Self {
            addr,
            point,
            reloader,
            config,
        })
    }

    /// Decision point backing the service
    pub fn point(&self) -> &Arc<DecisionPoint> {
        &self.point
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut reload_stop = stop_rx.clone();
        let reloads = tokio::spawn(self.reloader.clone().run(
            self.config.reload_interval(),
            async move {
                let _ = reload_stop.changed().await;
            },
        ));

        let service = ExtAuthzService::new(self.point.clone());
        info!("AuthZ gRPC server listening on {}", self.addr);

        let served = Server::builder()
            .add_service(service.into_server())
            .serve_with_shutdown(self.addr, async move {
                shutdown.await;
                let _ = stop_tx.send(true);
            })
            .await;

        drop(stop_rx);
        let _ = reloads.await;

        let stats = self.point.stats();
        info!(
            "AuthZ server stopped: {} decisions, {} allowed, {} denied",
            stats.total,
            stats.allowed,
            stats.denied()
        );
        served.map_err(Into::into)
    }
}
