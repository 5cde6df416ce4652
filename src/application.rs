use crate::config::Settings;
use crate::gateway::GatewayService;
use crate::Result;
use std::net::SocketAddr;
use tracing::{info, instrument};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
}

impl Application {
    pub fn new() -> Result<Self> {
        let settings = Settings::new()?;
        Ok(Self { settings })
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self { settings }
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let addr = self.settings.bind_address();
        let service = GatewayService::new(&self.settings)?;
        let router = service.into_router();

        info!("Starting Portico gateway on {addr}");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        // ConnectInfo gives the rate limiter and audit trail a caller address
        // when no forwarding proxy sets x-forwarded-for.
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
