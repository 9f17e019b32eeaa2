//! Store reload triggers
//!
//! Rebuilds the credential store on a timer and on SIGHUP. A failed rebuild
//! keeps the previously published store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tenant_authz::{CredentialSource, StoreConfig, StoreHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Rebuilds and republishes the credential store
#[derive(Clone)]
pub struct Reloader {
    handle: Arc<StoreHandle>,
    source: Arc<dyn CredentialSource>,
    config: StoreConfig,
}

impl Reloader {
    /// Create reloader
    pub fn new(
        handle: Arc<StoreHandle>,
        source: Arc<dyn CredentialSource>,
        config: StoreConfig,
    ) -> Self {
        Self {
            handle,
            source,
            config,
        }
    }

    /// Rebuild once; returns the new version, or `None` if the old store stays
    pub fn reload_now(&self) -> Option<u64> {
        match self.handle.reload(self.source.as_ref(), &self.config) {
            Ok(version) => Some(version),
            Err(e) => {
                error!("Credential reload failed, keeping version {}: {}", self.handle.version(), e);
                None
            }
        }
    }

    /// Reload on every `interval` tick and on SIGHUP until `shutdown` resolves
    pub async fn run<F>(self, interval: Option<Duration>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = interval.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        let mut hangup = Hangup::new();

        match interval {
            Some(period) => info!("Credential reload every {:?} and on SIGHUP", period),
            None => info!("Credential reload on SIGHUP only"),
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tick(&mut ticker) => {}
                _ = hangup.recv() => info!("SIGHUP received, reloading credentials"),
            }

            let this = self.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || this.reload_now()).await {
                warn!("Credential reload task failed: {}", e);
            }
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(unix)]
struct Hangup(Option<tokio::signal::unix::Signal>);

#[cfg(unix)]
impl Hangup {
    fn new() -> Self {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::hangup()) {
            Ok(signal) => Self(Some(signal)),
            Err(e) => {
                warn!("SIGHUP reload unavailable: {}", e);
                Self(None)
            }
        }
    }

    async fn recv(&mut self) {
        match self.0.as_mut() {
            Some(signal) => {
                if signal.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(not(unix))]
struct Hangup;

#[cfg(not(unix))]
impl Hangup {
    fn new() -> Self {
        Self
    }

    async fn recv(&mut self) {
        std::future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenant_authz::{CredentialStore, DirectorySource, TenantCase, TenantId};
    use tempfile::TempDir;

    fn acme() -> TenantId {
        TenantId::parse("acme", TenantCase::Insensitive).unwrap()
    }

    fn setup(dir: &TempDir, config: StoreConfig) -> (Arc<StoreHandle>, Reloader) {
        let source = Arc::new(DirectorySource::new(dir.path()));
        let store = CredentialStore::load(source.as_ref(), &config).unwrap();
        let handle = Arc::new(StoreHandle::new(store));
        let reloader = Reloader::new(handle.clone(), source, config);
        (handle, reloader)
    }

    #[test]
    fn test_reload_picks_up_rotation() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("acme"), "old\n").unwrap();
        let (handle, reloader) = setup(&dir, StoreConfig::default());

        std::fs::write(dir.path().join("acme"), "new\n").unwrap();
        assert_eq!(reloader.reload_now(), Some(2));

        let store = handle.snapshot();
        assert!(store.validate(&acme(), b"new"));
        assert!(!store.validate(&acme(), b"old"));
    }

    #[test]
    fn test_unreadable_source_keeps_store() {
        let dir = TempDir::new().unwrap();
        let creds = dir.path().join("creds");
        std::fs::create_dir(&creds).unwrap();
        std::fs::write(creds.join("acme"), "secretA").unwrap();

        let source = Arc::new(DirectorySource::new(&creds));
        let store = CredentialStore::load(source.as_ref(), &StoreConfig::default()).unwrap();
        let handle = Arc::new(StoreHandle::new(store));
        let reloader = Reloader::new(handle.clone(), source, StoreConfig::default());

        std::fs::remove_dir_all(&creds).unwrap();
        assert_eq!(reloader.reload_now(), None);
        assert_eq!(handle.version(), 1);
        assert!(handle.snapshot().validate(&acme(), b"secretA"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_reload() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("acme"), "secretA").unwrap();
        let (handle, reloader) = setup(&dir, StoreConfig::default());

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(reloader.run(Some(Duration::from_secs(10)), async move {
            let _ = stop_rx.await;
        }));

        std::fs::remove_file(dir.path().join("acme")).unwrap();
        // Paused clock: wait until the reload has been published
        while handle.version() < 2 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert!(!handle.snapshot().validate(&acme(), b"secretA"));

        stop_tx.send(()).unwrap();
        task.await.unwrap();
    }
}
