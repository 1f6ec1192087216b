//! Shared helpers for strongbox integration tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use strongbox_crypto::{AsymmetricCrypto, KdfParams, X25519Provider};

/// Crypto provider with test-grade KDF parameters.
pub fn fast_crypto() -> Arc<dyn AsymmetricCrypto> {
    Arc::new(X25519Provider::with_kdf_params(KdfParams::insecure_fast()))
}

/// Initialize tracing output for a test binary. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or a generous deadline passes.
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
