use crate::config::AppConfig;
use crate::raster::RasterRenderer;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub renderer: RasterRenderer,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: AppConfig, renderer: RasterRenderer) -> Self {
        Self {
            sessions: SessionStore::new(config.clone()),
            config,
            renderer,
        }
    }
}
