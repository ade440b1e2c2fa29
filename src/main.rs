use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use signal_advisor::{
    server::{self, AppState},
    AreaType, PolicyConfig, TrafficAdvisor,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port: u16 = std::env::var("PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(8000);
    let area_type: AreaType = match std::env::var("AREA_TYPE") {
        Ok(s) => s.parse().context("invalid AREA_TYPE")?,
        Err(_) => AreaType::default(),
    };

    let policy = match std::env::var("POLICY_PATH") {
        Ok(path) => {
            tracing::info!("loading policy from {}", path);
            PolicyConfig::load(&path)?
        }
        Err(_) => PolicyConfig::default(),
    };

    let mut advisor = TrafficAdvisor::new(Arc::new(policy), area_type)
        .with_context(|| format!("policy cannot drive a {} intersection", area_type))?;
    if let Ok(ids) = std::env::var("APPROACHES") {
        let ids: Vec<String> = ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        tracing::info!("accepting approaches {:?}", ids);
        advisor = advisor.with_allowed_approaches(ids);
    }

    let state = AppState {
        advisor: Arc::new(advisor),
    };
    let app = server::router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("area type {}; listening on {}", area_type, addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
