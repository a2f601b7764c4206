use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const CERT_FILES: [&str; 2] = ["tls.crt", "tls.key"];

/// Watches a cert directory and flags when the server loop should rebuild
/// its TLS config, since `axum_server` has no built-in hot-reload.
pub struct CertificateReloader {
    dirty: Arc<AtomicBool>,
}

impl CertificateReloader {
    pub fn new() -> Self {
        Self { dirty: Arc::new(AtomicBool::new(false)) }
    }

    pub fn needs_restart(&self) -> bool {
        self.dirty.swap(false, Ordering::Relaxed)
    }

    pub async fn watch(&self, cert_dir: &str) -> Result<()> {
        let dirty = self.dirty.clone();
        let cert_dir = cert_dir.to_string();
        tokio::spawn(async move {
            if let Err(e) = run(&cert_dir, dirty).await {
                error!("certificate watcher exited: {e}");
            }
        });
        Ok(())
    }
}

async fn run(cert_dir: &str, dirty: Arc<AtomicBool>) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(100);

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Err(e) = tx.blocking_send(res) {
                error!("certificate watcher channel closed: {e}");
            }
        },
        Config::default(),
    )?;
    watcher.watch(Path::new(cert_dir), RecursiveMode::NonRecursive)?;
    info!(dir = cert_dir, "watching for certificate rotation");

    while let Some(event) = rx.recv().await {
        match event {
            Ok(event) if touches_cert_files(&event) => {
                info!("certificate files changed, scheduling TLS reload");
                dirty.store(true, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(e) => warn!("certificate watcher error: {e}"),
        }
    }
    Ok(())
}

fn touches_cert_files(event: &Event) -> bool {
    event
        .paths
        .iter()
        .filter_map(|p| p.file_name())
        .filter_map(|n| n.to_str())
        .any(|name| CERT_FILES.contains(&name))
}
