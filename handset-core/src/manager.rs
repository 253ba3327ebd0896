//! Active-game bookkeeping.
//!
//! The manager owns one [`Engine`] per active catalog entry and routes
//! lifecycle calls and key taps to it by game id. How many games must stay
//! active is left to the caller.

use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{BuiltinGame, GameDescriptor, Origin};
use crate::config::HandsetConfig;
use crate::display::FrameSink;
use crate::engine::{Engine, HostedEngine, SnakeEngine};
use crate::error::{HandsetError, HandsetResult};
use crate::input::Key;
use crate::runtime::RuntimeBootstrap;
use crate::session::EmulatorSession;
use crate::storage::KvStore;

struct ActiveGame {
    id: String,
    engine: Box<dyn Engine>,
}

pub struct SessionManager {
    bootstrap: RuntimeBootstrap,
    store: Arc<dyn KvStore>,
    config: HandsetConfig,
    active: Vec<ActiveGame>,
}

impl SessionManager {
    pub fn new(bootstrap: RuntimeBootstrap, store: Arc<dyn KvStore>, config: HandsetConfig) -> Self {
        Self {
            bootstrap,
            store,
            config,
            active: Vec::new(),
        }
    }

    pub fn bootstrap(&self) -> &RuntimeBootstrap {
        &self.bootstrap
    }

    /// Build the engine that plays `descriptor`, chosen by its origin.
    pub fn engine_for(
        &self,
        descriptor: &GameDescriptor,
        sink: Arc<dyn FrameSink>,
    ) -> HandsetResult<Box<dyn Engine>> {
        match descriptor.origin {
            Origin::Builtin => {
                let game = BuiltinGame::from_id(&descriptor.id)
                    .ok_or_else(|| HandsetError::UnknownGame(descriptor.id.clone()))?;
                match game {
                    BuiltinGame::Snake => Ok(Box::new(SnakeEngine::new(
                        self.config.snake.clone(),
                        Arc::clone(&self.store),
                        sink,
                    ))),
                }
            }
            Origin::Imported => {
                let session = EmulatorSession::new(descriptor, self.bootstrap.clone())
                    .with_key_release(self.config.runtime.key_release_delay());
                Ok(Box::new(HostedEngine::new(descriptor.clone(), session)))
            }
        }
    }

    /// Start `descriptor` unless it is already active.
    ///
    /// A game whose engine fails to start is not kept active.
    pub async fn activate(
        &mut self,
        descriptor: &GameDescriptor,
        sink: Arc<dyn FrameSink>,
    ) -> HandsetResult<()> {
        if self.is_active(&descriptor.id) {
            return Ok(());
        }

        let mut engine = self.engine_for(descriptor, sink)?;
        if let Err(e) = engine.start().await {
            warn!(id = %descriptor.id, error = %e, "activation failed");
            engine.stop();
            return Err(e);
        }

        info!(id = %descriptor.id, engine = engine.name(), "game activated");
        self.active.push(ActiveGame {
            id: descriptor.id.clone(),
            engine,
        });
        Ok(())
    }

    /// Stop and forget a game. Returns false if it was not active.
    pub fn deactivate(&mut self, id: &str) -> bool {
        let Some(idx) = self.active.iter().position(|g| g.id == id) else {
            return false;
        };
        let mut game = self.active.remove(idx);
        game.engine.stop();
        info!(id, "game deactivated");
        true
    }

    /// Deliver a key to an active game. Returns false if it is not active.
    pub fn send_key(&mut self, id: &str, key: &Key) -> bool {
        match self.engine_mut(id) {
            Some(engine) => {
                engine.handle_input(key);
                true
            }
            None => false,
        }
    }

    pub fn save_state(&mut self, id: &str) -> HandsetResult<()> {
        self.engine_mut(id)
            .ok_or_else(|| HandsetError::UnknownGame(id.to_string()))?
            .save_state()
    }

    pub fn load_state(&mut self, id: &str) -> HandsetResult<()> {
        self.engine_mut(id)
            .ok_or_else(|| HandsetError::UnknownGame(id.to_string()))?
            .load_state()
    }

    /// Whether the active game `id` can save. False if it is not active.
    pub fn supports_save(&self, id: &str) -> bool {
        self.active
            .iter()
            .find(|g| g.id == id)
            .is_some_and(|g| g.engine.supports_save())
    }

    /// Active game ids in activation order.
    pub fn active_ids(&self) -> Vec<String> {
        self.active.iter().map(|g| g.id.clone()).collect()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.iter().any(|g| g.id == id)
    }

    pub fn stop_all(&mut self) {
        for mut game in self.active.drain(..) {
            game.engine.stop();
        }
    }

    fn engine_mut(&mut self, id: &str) -> Option<&mut Box<dyn Engine>> {
        self.active
            .iter_mut()
            .find(|g| g.id == id)
            .map(|g| &mut g.engine)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}
