//! Hourglass Realm server binary

use hourglass_core::RoomConfig;
use hourglass_server::{api, build_service, cli, init_tracing, AppState, ServerConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let config = ServerConfig::from_matches(&matches)?;
    init_tracing(config.log_json);

    let room = RoomConfig::from_env()?;
    if room.admin_secret == RoomConfig::default().admin_secret {
        tracing::warn!("ADMIN_PASSPHRASE not set; using the default admin secret");
    }

    let service = build_service(&config, room).await?;
    tracing::info!(
        version = hourglass_server::VERSION,
        store = service.store().name(),
        bind = %config.bind,
        "hourglass server starting"
    );

    let routes = api(AppState::new(Arc::new(service), config.conflict_attempts()));
    warp::serve(routes).run(config.bind).await;
    Ok(())
}
