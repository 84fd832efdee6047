use contact_intake::configuration::Settings;
use contact_intake::startup::{get_pg_pool, Application};
use contact_intake::telemetry::config_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::get_configuration()?;

    config_tracing(&settings.application);

    let pg_pool = get_pg_pool(&settings.database);
    let application = Application::build(pg_pool, settings).await?;
    application.run_until_terminated().await?;
    Ok(())
}
