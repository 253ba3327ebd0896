//! Engine adapter for games hosted by the bytecode runtime.

use async_trait::async_trait;

use super::Engine;
use crate::catalog::GameDescriptor;
use crate::error::HandsetResult;
use crate::input::Key;
use crate::session::EmulatorSession;

/// Runs an imported archive through an [`EmulatorSession`].
///
/// The runtime draws on its own surface, so no frames are produced here.
pub struct HostedEngine {
    descriptor: GameDescriptor,
    session: EmulatorSession,
}

impl HostedEngine {
    pub fn new(descriptor: GameDescriptor, session: EmulatorSession) -> Self {
        Self {
            descriptor,
            session,
        }
    }

    pub fn session(&self) -> &EmulatorSession {
        &self.session
    }
}

#[async_trait]
impl Engine for HostedEngine {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    async fn start(&mut self) -> HandsetResult<()> {
        self.session.boot(&self.descriptor).await
    }

    fn stop(&mut self) {
        self.session.teardown();
    }

    fn handle_input(&mut self, key: &Key) {
        self.session.send_key(key);
    }

    fn is_running(&self) -> bool {
        self.session.is_booted()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::runtime::RuntimeBootstrap;
    use crate::session::BootState;
    use crate::test_helpers::{imported_descriptor, FakeHost, FakeRuntime, RuntimeCall};

    #[tokio::test]
    async fn test_hosted_engine_lifecycle() {
        let runtime = Arc::new(FakeRuntime::new());
        let host = Arc::new(FakeHost::with_runtime(runtime.clone()));
        let boot = RuntimeBootstrap::new(host, ["core"]);
        let game = imported_descriptor("g", "Galaxy", b"PK");
        let mut engine = HostedEngine::new(game.clone(), EmulatorSession::new(&game, boot));

        engine.start().await.unwrap();
        assert!(engine.is_running());
        assert!(!engine.supports_save());
        assert!(engine.save_state().is_err());

        engine.handle_input(&Key::Left);
        engine.stop();

        assert_eq!(engine.session().state(), BootState::TornDown);
        assert!(runtime.calls().contains(&RuntimeCall::KeyPress("LEFT".into())));
        assert_eq!(runtime.calls().last(), Some(&RuntimeCall::Stop));
    }
}
