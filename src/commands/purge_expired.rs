use tracing::info;

use crate::App;

pub async fn run(app: App) -> anyhow::Result<()> {
    let count = app.service.purge_expired().await?;
    info!("purge finished: removed {count} expired pastes");
    Ok(())
}
