//! Building ledger transports for environments.

use std::sync::Arc;

use lance_env::{EnvironmentConfig, EnvironmentKey, SessionSettings};
use lance_ledger::{HttpTransport, LedgerResult, LedgerTransport, SandboxLedger};

/// Produces the transport a session uses to reach an environment's ledger.
pub trait LedgerConnector: Send + Sync {
    fn connect(
        &self,
        key: EnvironmentKey,
        config: &EnvironmentConfig,
        settings: &SessionSettings,
    ) -> LedgerResult<Arc<dyn LedgerTransport>>;
}

/// Talks to `ledgerApiUrl` over HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl LedgerConnector for HttpConnector {
    fn connect(
        &self,
        _key: EnvironmentKey,
        config: &EnvironmentConfig,
        settings: &SessionSettings,
    ) -> LedgerResult<Arc<dyn LedgerTransport>> {
        let transport = HttpTransport::new(
            config.ledger_api_url.clone(),
            config.mode,
            settings.request_timeout(),
        )?;
        Ok(Arc::new(transport))
    }
}

/// Routes every environment to one in-process [`SandboxLedger`].
#[derive(Debug, Clone, Default)]
pub struct SandboxConnector {
    ledger: Arc<SandboxLedger>,
}

impl SandboxConnector {
    pub fn new(ledger: Arc<SandboxLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Arc<SandboxLedger> {
        &self.ledger
    }
}

impl LedgerConnector for SandboxConnector {
    fn connect(
        &self,
        _key: EnvironmentKey,
        _config: &EnvironmentConfig,
        _settings: &SessionSettings,
    ) -> LedgerResult<Arc<dyn LedgerTransport>> {
        let transport: Arc<dyn LedgerTransport> = self.ledger.clone();
        Ok(transport)
    }
}
