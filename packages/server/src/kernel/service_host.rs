//! Long-running background services.
//!
//! A [`Service`] owns its loop and checks the shared shutdown token between
//! batches. [`ServiceHost`] spawns every registered service, waits for a
//! shutdown signal, cancels the token and joins them so in-flight batches
//! finish before the process exits.

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[async_trait]
pub trait Service: Send + 'static {
    fn name(&self) -> &'static str;

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()>;
}

#[derive(Default)]
pub struct ServiceHost {
    services: Vec<Box<dyn Service>>,
    shutdown: CancellationToken,
}

impl ServiceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, service: impl Service) -> Self {
        self.services.push(Box::new(service));
        self
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Run until Ctrl-C or SIGTERM.
    pub async fn run_until_shutdown(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` resolves or the token is cancelled from elsewhere.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let shutdown = self.shutdown;
        let mut handles = Vec::with_capacity(self.services.len());

        for service in self.services {
            let name = service.name();
            let token = shutdown.clone();
            info!(service = name, "starting service");
            handles.push((name, tokio::spawn(async move { service.run(token).await })));
        }

        tokio::select! {
            _ = signal => info!("shutdown signal received"),
            _ = shutdown.cancelled() => {}
        }
        shutdown.cancel();

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = futures::future::join_all(handles).await;

        let mut failed = 0usize;
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(Ok(())) => info!(service = name, "service stopped"),
                Ok(Err(e)) => {
                    failed += 1;
                    error!(service = name, error = %e, "service exited with error");
                }
                Err(e) => {
                    failed += 1;
                    error!(service = name, error = %e, "service task panicked");
                }
            }
        }

        if failed > 0 {
            anyhow::bail!("{} service(s) failed", failed);
        }
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Ticker {
        ticks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Service for Ticker {
        fn name(&self) -> &'static str {
            "ticker"
        }

        async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
            loop {
                self.ticks.fetch_add(1, Ordering::SeqCst);
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_millis(5)) => {}
                }
            }
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Service for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
            shutdown.cancelled().await;
            anyhow::bail!("boom")
        }
    }

    #[tokio::test]
    async fn test_services_stop_when_signal_fires() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let host = ServiceHost::new().with_service(Ticker {
            ticks: ticks.clone(),
        });

        host.run_until(tokio::time::sleep(Duration::from_millis(30)))
            .await
            .unwrap();

        assert!(ticks.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn test_failed_service_is_reported() {
        let host = ServiceHost::new().with_service(Failing);
        let result = host.run_until(async {}).await;
        assert!(result.is_err());
    }
}
