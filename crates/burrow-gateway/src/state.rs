use std::sync::Arc;

use burrow_core::Shortener;

use crate::auth::TokenSigner;

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    signer: Arc<TokenSigner>,
}

impl AppState {
    pub fn new(shortener: Arc<dyn Shortener>, signer: TokenSigner) -> Self {
        Self {
            shortener,
            signer: Arc::new(signer),
        }
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }
}
