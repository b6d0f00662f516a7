/// Tracing initialization for binaries and tests embedding the core.
///
/// `RUST_LOG` wins when set; otherwise the core logs at debug and
/// everything else at info. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_core=debug,parley_fetch=debug,info".into()),
        )
        .try_init();
}
