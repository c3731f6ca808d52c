use std::collections::HashMap;
use std::sync::Arc;

use super::config::SessionSettings;
use crate::directory::Directory;
use crate::oauth::{ProviderClient, ProviderKind};
use crate::token::SessionTokenManager;

/// Shared state for the session route handlers.
pub(super) struct SessionState<D> {
    pub(super) tokens: Arc<SessionTokenManager>,
    pub(super) directory: Arc<D>,
    pub(super) providers: Arc<HashMap<ProviderKind, ProviderClient>>,
    pub(super) settings: SessionSettings,
}

// Manual Clone: avoid derive adding a `D: Clone` bound.
impl<D> Clone for SessionState<D> {
    fn clone(&self) -> Self {
        Self {
            tokens: self.tokens.clone(),
            directory: self.directory.clone(),
            providers: self.providers.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<D: Directory> SessionState<D> {
    pub(super) fn provider(&self, kind: ProviderKind) -> Option<&ProviderClient> {
        self.providers.get(&kind)
    }
}
