//! Root dispatcher server.

use std::sync::Arc;
use tracing::info;

use crate::allocator::PortAllocator;
use crate::config::ServerConfig;
use crate::mocker::{create_route, Mocker, MockerContext, MockerError, MockerManager};
use crate::routes::RouteTable;

/// Handle to the running root dispatcher.
pub struct RootDispatcher {
    mocker: Mocker,
    manager: Arc<MockerManager>,
}

impl RootDispatcher {
    /// Bind the root port and start accepting `POST /create`.
    pub async fn start(config: &ServerConfig) -> Result<Self, MockerError> {
        let routes = Arc::new(RouteTable::new());
        let allocator =
            PortAllocator::new(config.mockers_ports_range).excluding(config.server_port);
        let manager = Arc::new(MockerManager::new(
            config.host.clone(),
            allocator,
            Arc::clone(&routes),
        ));

        let mocker = Mocker::new(&config.host, config.server_port, routes);
        mocker.add_route(create_route())?;

        let context = Arc::new(MockerContext::new(config.server_port, Arc::clone(&manager)));
        if let Err(e) = mocker.start(context).await {
            manager.routes().remove_namespace(config.server_port);
            return Err(e);
        }

        info!(
            "kitty-mocker listening on {} (mockers on {})",
            mocker.endpoint(),
            config.mockers_ports_range
        );
        Ok(Self { mocker, manager })
    }

    pub fn port(&self) -> u16 {
        self.mocker.port()
    }

    pub fn endpoint(&self) -> String {
        self.mocker.endpoint()
    }

    /// Manager of the mockers created through this dispatcher.
    pub fn manager(&self) -> &Arc<MockerManager> {
        &self.manager
    }

    /// Stop accepting `/create` requests.
    ///
    /// Mockers created earlier keep running; use [`MockerManager::stop_all`]
    /// to tear them down.
    pub async fn stop(self) -> Result<(), MockerError> {
        let port = self.mocker.port();
        self.mocker.stop().await?;
        self.manager.routes().remove_namespace(port);
        info!("Root dispatcher on port {} stopped", port);
        Ok(())
    }
}
