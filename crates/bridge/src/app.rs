//! Main application structure and lifecycle management

use crate::{
    api::ApiServer,
    database::Database,
    dispatcher::Dispatcher,
    intake::Intake,
    scheduler::Scheduler,
    storage::{BufferStore, SqliteBufferStore},
};
use anyhow::{Context, Result};
use config::{Config, GatewayMode, JDownloaderConfig};
use gateway::{ConnectivityMonitor, DeliveryGateway, LiveGateway};
use simulator::SimulatedGateway;
use std::sync::Arc;
use tracing::{info, warn};

/// Main application state
pub struct AppState {
    pub config: Config,
    pub database: Database,
    pub store: Arc<dyn BufferStore>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub intake: Intake,
    pub dispatcher: Dispatcher,
}

/// Main application that coordinates all components
pub struct Application {
    state: Arc<AppState>,
    api_server: ApiServer,
    scheduler: Scheduler,
}

/// Resolve the configured gateway mode into a concrete gateway
pub fn build_gateway(config: &JDownloaderConfig) -> Result<Arc<dyn DeliveryGateway>> {
    match config.mode {
        GatewayMode::Real => {
            let gateway = LiveGateway::new(config.api_url(), config.delivery_timeout())
                .context("Failed to create JDownloader client")?;
            info!(url = %gateway.base_url(), "Using live JDownloader gateway");
            Ok(Arc::new(gateway))
        }
        GatewayMode::Simulated => {
            warn!(
                online = config.simulated_online,
                "Using simulated JDownloader gateway, nothing reaches a real downloader"
            );
            Ok(Arc::new(SimulatedGateway::new(config.simulated_online)))
        }
    }
}

impl AppState {
    /// Wire the buffer, monitor, intake and dispatcher around one gateway
    pub fn new(config: Config, database: Database, gateway: Arc<dyn DeliveryGateway>) -> Self {
        let delivery_timeout = config.jdownloader.delivery_timeout();
        let store: Arc<dyn BufferStore> = Arc::new(SqliteBufferStore::new(database.clone()));
        let monitor = Arc::new(ConnectivityMonitor::new(gateway, delivery_timeout));
        let intake = Intake::new(store.clone(), monitor.clone(), delivery_timeout);
        let dispatcher = Dispatcher::new(store.clone(), monitor.clone(), delivery_timeout);

        Self {
            config,
            database,
            store,
            monitor,
            intake,
            dispatcher,
        }
    }
}

impl Application {
    /// Create a new application instance
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing application components...");

        // Initialize database
        let database = Database::new(&config.database)
            .await
            .context("Failed to initialize database")?;

        // Run database migrations
        database
            .migrate()
            .await
            .context("Failed to run database migrations")?;

        let gateway = build_gateway(&config.jdownloader)?;

        // Create shared application state
        let state = Arc::new(AppState::new(config, database, gateway));

        let buffered = state
            .store
            .count()
            .await
            .context("Failed to read buffer")?;
        if buffered > 0 {
            info!(buffered, "Buffered entries found, they will be replayed once JDownloader is reachable");
        }

        // Initialize API server
        let api_server = ApiServer::new(state.clone())
            .context("Failed to create API server")?;

        // Initialize scheduler
        let scheduler = Scheduler::new(state.clone())
            .await
            .context("Failed to create scheduler")?;

        info!("Application components initialized successfully");

        Ok(Self {
            state,
            api_server,
            scheduler,
        })
    }

    /// Run the application
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting application services...");

        // Start scheduler
        let scheduler_handle = {
            let mut scheduler = self.scheduler.clone();
            tokio::spawn(async move {
                if let Err(e) = scheduler.run().await {
                    tracing::error!("Scheduler error: {}", e);
                }
            })
        };

        info!("Background scheduler started");

        // Start API server (this will block until shutdown)
        info!("Starting API server on {}:{}",
            self.state.config.server.host,
            self.state.config.server.port
        );

        tokio::select! {
            result = self.api_server.run() => {
                result.context("API server error")?;
            }
            result = scheduler_handle => {
                result.context("Scheduler task error")?;
            }
        }

        Ok(())
    }

    /// Shutdown the application gracefully
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down application...");

        // Shutdown API server
        self.api_server.shutdown().await
            .context("Failed to shutdown API server")?;
        info!("API server shutdown complete");

        // Shutdown scheduler
        self.scheduler.shutdown().await
            .context("Failed to shutdown scheduler")?;
        info!("Scheduler shutdown complete");

        // Close database connections
        self.state.database.close().await
            .context("Failed to close database")?;
        info!("Database connections closed");

        info!("Application shutdown complete");
        Ok(())
    }

    /// Get application state
    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }
}
