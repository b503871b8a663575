use std::sync::Arc;

use switchyard::app::{self, AppState};
use switchyard::config::Config;
use switchyard::server::{DispatchPolicy, Dispatcher, Registry, Server};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cfg.dispatch.runtime_threads.max(1))
        .max_blocking_threads(cfg.dispatch.max_workers.max(1))
        .enable_all()
        .build()?;

    let state = Arc::new(AppState::from_config(&cfg));
    let mut registry = Registry::new();
    app::register_routes(&mut registry, state.clone());

    let dispatcher = Dispatcher::new(
        runtime.handle().clone(),
        DispatchPolicy::from(&cfg.dispatch),
        state.service_gate(),
    );

    let server = Server::bind(&cfg.server, registry, dispatcher)?;
    let shutdown = server.shutdown_handle();

    runtime.block_on(async move {
        let mut event_loop = tokio::task::spawn_blocking(move || server.run());

        tokio::select! {
            res = &mut event_loop => {
                res??;
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                shutdown.shutdown();
                event_loop.await??;
            }
        }

        Ok::<(), anyhow::Error>(())
    })
}
