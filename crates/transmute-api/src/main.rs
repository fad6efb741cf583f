use transmute_core::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = transmute_api::setup::initialize_app(config.clone()).await?;

    transmute_api::setup::server::start_server(&config, router).await?;

    state.scheduler.shutdown();
    tracing::info!("Shutdown complete");

    Ok(())
}
