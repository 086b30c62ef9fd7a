//! services/api/src/adapters/media.rs
//!
//! Server-side bookkeeping for media the browser captures. The tracks themselves
//! never reach the server; each grant is an id the browser reports back against,
//! most importantly when the user hits the browser's own "stop sharing" button.

use async_trait::async_trait;
use futures::channel::oneshot;
use kova_core::ports::{MediaPlatform, MediaStream, PortError, PortResult, ScreenCapture};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

type Registry = Arc<Mutex<HashMap<Uuid, Option<oneshot::Sender<()>>>>>;

pub struct RelayMediaPlatform {
    screen_capture_enabled: bool,
    live: Registry,
}

impl RelayMediaPlatform {
    pub fn new(screen_capture_enabled: bool) -> Self {
        Self {
            screen_capture_enabled,
            live: Arc::default(),
        }
    }

    fn register(&self, id: Uuid, ended: Option<oneshot::Sender<()>>) -> PortResult<()> {
        let mut live = self
            .live
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        live.insert(id, ended);
        Ok(())
    }

    /// The browser reported that the platform ended this stream.
    /// Returns `false` for unknown or already released streams.
    pub fn platform_stopped(&self, stream_id: Uuid) -> bool {
        let sender = match self.live.lock() {
            Ok(mut live) => live.remove(&stream_id),
            Err(e) => {
                warn!("Media registry unavailable: {}", e);
                return false;
            }
        };
        match sender {
            Some(Some(tx)) => tx.send(()).is_ok(),
            Some(None) => true,
            None => false,
        }
    }

    pub fn is_live(&self, stream_id: Uuid) -> bool {
        self.live
            .lock()
            .map(|live| live.contains_key(&stream_id))
            .unwrap_or(false)
    }
}

struct RelayStream {
    id: Uuid,
    live: Registry,
}

impl MediaStream for RelayStream {
    fn id(&self) -> Uuid {
        self.id
    }

    fn stop(&self) {
        if let Ok(mut live) = self.live.lock() {
            if live.remove(&self.id).is_some() {
                debug!("Released stream {}", self.id);
            }
        }
    }
}

#[async_trait]
impl MediaPlatform for RelayMediaPlatform {
    async fn open_user_media(&self) -> PortResult<Box<dyn MediaStream>> {
        let id = Uuid::new_v4();
        self.register(id, None)?;
        Ok(Box::new(RelayStream {
            id,
            live: self.live.clone(),
        }))
    }

    async fn request_screen_capture(&self) -> PortResult<ScreenCapture> {
        if !self.screen_capture_enabled {
            return Err(PortError::Unsupported);
        }
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.register(id, Some(tx))?;
        Ok(ScreenCapture {
            stream: Box::new(RelayStream {
                id,
                live: self.live.clone(),
            }),
            ended: rx,
        })
    }
}
