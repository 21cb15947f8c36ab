//! Tracing initialization.
//!
//! Use `RUST_LOG` to configure, e.g. `RUST_LOG=debug,tower_http=info`.

pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();
}
