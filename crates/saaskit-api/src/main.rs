use saaskit_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration (.env is read if present)
    let config = Config::from_env()?;

    // Initialize the application (database, providers, routes)
    let (_state, router) = saaskit_api::setup::initialize_app(config.clone()).await?;

    saaskit_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
