//! Hub server

use bitevibes_core::{Config, Error, Result};
use bitevibes_net::Hub;
use tracing::info;

pub async fn run(config: &Config, addr: Option<String>) -> Result<()> {
    let addr = match addr {
        Some(addr) => addr
            .parse()
            .map_err(|_| Error::InvalidInput(format!("bad address {}", addr)))?,
        None => config.hub.socket_addr()?,
    };

    let hub = Hub::start(addr).await?;
    println!("Hub listening on {}", hub.addr());

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            hub.shutdown();
        }
        _ = hub.closed() => {}
    }
    Ok(())
}
