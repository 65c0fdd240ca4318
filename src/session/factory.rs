use std::sync::Arc;

use tokio::sync::mpsc;

use super::Session;
use crate::config::SessionConfig;
use crate::error::SessionResult;
use crate::media::MediaCapture;
use crate::peer::{EngineFactory, WebrtcEngineFactory};

/// Creates sessions wired to a fresh engine and a shared capture layer.
pub struct SessionFactory<F: EngineFactory, C: MediaCapture> {
    engines: F,
    capture: Arc<C>,
}

impl<F: EngineFactory, C: MediaCapture> SessionFactory<F, C> {
    pub fn new(engines: F, capture: Arc<C>) -> Self {
        Self { engines, capture }
    }

    /// Validates `config`, builds the engine and starts forwarding its
    /// callbacks. The caller still has to [`Session::initialize`] it.
    pub async fn create(&self, config: SessionConfig) -> SessionResult<Arc<Session<F::Engine, C>>> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let engine = self.engines.create(&config, tx).await?;

        let session = Arc::new(Session::new(config, engine, self.capture.clone()));
        Session::spawn_event_pump(&session, rx);
        Ok(session)
    }
}

/// Factory backed by webrtc-rs peer connections
pub fn webrtc_factory<C: MediaCapture>(capture: Arc<C>) -> SessionFactory<WebrtcEngineFactory, C> {
    SessionFactory::new(WebrtcEngineFactory, capture)
}
