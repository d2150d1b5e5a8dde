//! Structured logging for yetty using the `tracing` crate.
//!
//! All yetty crates log through `tracing` macros; call [`init()`] once at
//! startup. The default filter keeps yetty crates at `debug` while silencing
//! the chattier GPU and windowing dependencies. Override with `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber with default filters.
///
/// # Panics
///
/// Panics if a global subscriber was already installed. Call exactly once
/// from `main()`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("debug,wgpu_core=info,wgpu_hal=info,naga=info,winit=info,fontdb=info")
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Like [`init()`], but never panics when a subscriber already exists.
///
/// Used by tests where several cases may race to install the subscriber.
pub fn try_init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("debug,wgpu_core=info,wgpu_hal=info,naga=info,winit=info,fontdb=info")
    });
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
