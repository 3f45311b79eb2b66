//! The workflow orchestrator.
//!
//! A [`Session`] owns the view of one identity on one environment at a time.
//! Every mutating operation follows the same sequence: check the acting
//! identity's role, validate input, claim a loading key, submit through the
//! [`LedgerClient`], then re-query the ledger so the snapshot reflects what
//! the identity is now allowed to see. The snapshot is never patched
//! locally.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use lance_env::{EnvironmentConfig, EnvironmentKey, EnvironmentRegistry, SessionSettings};
use lance_identity::IdentityRegistry;
use lance_ledger::{ApiCall, AuditTotals, LedgerClient, LedgerClientConfig, LedgerResult, SubmitOutcome};
use lance_types::numeric::encode_decimal;
use lance_types::{
    current_report_period, validate_payment, ContractRef, Party, ProposalTerms, RoleCategory,
    VisibleState,
};
use tracing::{debug, info, warn};

use crate::activity::{Activity, Notice, NoticeLevel};
use crate::connector::LedgerConnector;
use crate::error::{SessionError, SessionResult};
use crate::inflight::{contract_key, InFlight, CREATE_ACCOUNT, CREATE_PROPOSAL, GENERATE_AUDIT};

/// Identity a session starts as.
pub const DEFAULT_IDENTITY: &str = "client";

/// Tags a snapshot with the view it was requested for. A query result is
/// only applied if the context is unchanged when it arrives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewContext {
    pub generation: u64,
    pub environment: Option<EnvironmentKey>,
    pub identity: String,
}

#[derive(Debug)]
struct View {
    context: ViewContext,
    snapshot: VisibleState,
}

pub struct Session {
    settings: SessionSettings,
    environments: EnvironmentRegistry,
    identities: IdentityRegistry,
    connector: Arc<dyn LedgerConnector>,
    clients: Mutex<HashMap<EnvironmentKey, Arc<LedgerClient>>>,
    view: RwLock<View>,
    in_flight: InFlight,
    activity: Activity,
}

impl Session {
    /// Build a session on the preferred available environment.
    ///
    /// With no environment configured the session is created disconnected
    /// and ledger operations fail with [`SessionError::NotConnected`]. No
    /// query is made here; call [`Session::refresh`] to load the snapshot.
    pub fn connect(
        settings: SessionSettings,
        environments: EnvironmentRegistry,
        identities: IdentityRegistry,
        connector: Arc<dyn LedgerConnector>,
    ) -> SessionResult<Self> {
        let activity = Activity::new(settings.action_log_capacity);
        let session = Self {
            settings,
            environments,
            identities,
            connector,
            clients: Mutex::new(HashMap::new()),
            view: RwLock::new(View {
                context: ViewContext {
                    generation: 0,
                    environment: None,
                    identity: DEFAULT_IDENTITY.to_string(),
                },
                snapshot: VisibleState::default(),
            }),
            in_flight: InFlight::new(),
            activity,
        };

        match session.environments.default_key() {
            Some(key) => {
                let config = session.enter(key)?;
                info!(environment = %key, url = %config.ledger_api_url, "session connected");
                session.activity.log(format!(
                    "Connected to {} at {}",
                    config.mode.display_name(),
                    config.ledger_api_url
                ));
            }
            None => warn!("no ledger environment configured; session is disconnected"),
        }
        Ok(session)
    }

    // ---- views ----

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn environments(&self) -> &EnvironmentRegistry {
        &self.environments
    }

    pub fn identities(&self) -> &IdentityRegistry {
        &self.identities
    }

    pub fn context(&self) -> ViewContext {
        self.read().context.clone()
    }

    /// What the active identity could see at the last applied refresh.
    pub fn snapshot(&self) -> VisibleState {
        self.read().snapshot.clone()
    }

    pub fn active_environment(&self) -> Option<EnvironmentKey> {
        self.read().context.environment
    }

    pub fn active_config(&self) -> Option<&EnvironmentConfig> {
        self.active_environment().and_then(|key| self.environments.get(key))
    }

    pub fn active_identity(&self) -> Option<Party> {
        self.identities.get(&self.read().context.identity)
    }

    pub fn is_connected(&self) -> bool {
        self.active_environment().is_some()
    }

    /// Ledger client of the active environment.
    pub fn client(&self) -> Option<Arc<LedgerClient>> {
        let key = self.active_environment()?;
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).get(&key).cloned()
    }

    /// Wire calls made against the active environment, most recent first.
    pub fn api_calls(&self) -> Vec<ApiCall> {
        self.client().map(|c| c.api_calls()).unwrap_or_default()
    }

    pub fn action_log(&self) -> Vec<String> {
        self.activity.actions()
    }

    pub fn take_notices(&self) -> Vec<Notice> {
        self.activity.take_notices()
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.in_flight.contains(key)
    }

    // ---- switching ----

    /// Make `key` the active environment and reload the snapshot.
    pub async fn switch_environment(&self, key: EnvironmentKey) -> SessionResult<()> {
        if !self.environments.is_available(key) {
            return Err(SessionError::UnknownEnvironment(key));
        }
        let config = self.enter(key)?;
        info!(environment = %key, "switched environment");
        self.activity.log(format!(
            "Switched to {} at {}",
            config.mode.display_name(),
            config.ledger_api_url
        ));
        self.reload().await;
        Ok(())
    }

    /// Act as `id` from now on and reload the snapshot.
    pub async fn switch_identity(&self, id: &str) -> SessionResult<Party> {
        let party = self
            .identities
            .get(id)
            .ok_or_else(|| SessionError::UnknownIdentity(id.to_string()))?;
        {
            let mut view = self.write();
            view.context.generation += 1;
            view.context.identity = party.id.clone();
            view.snapshot = VisibleState::default();
        }
        debug!(identity = %party.id, "switched identity");
        self.activity.log(format!("Viewing as {}", party.label()));
        self.reload().await;
        Ok(party)
    }

    /// Re-query the active identity's visible state.
    ///
    /// Returns `false` when the result arrived after a switch and was
    /// discarded. Failures are logged and raised as a notice before being
    /// returned; the previous snapshot stays in place.
    pub async fn refresh(&self) -> SessionResult<bool> {
        match self.query().await {
            Ok(applied) => Ok(applied),
            Err(e) => {
                warn!(error = %e, "refresh failed");
                self.activity.log(format!("Error loading contracts: {e}"));
                self.activity
                    .notify(NoticeLevel::Danger, format!("Error loading contracts: {e}"));
                Err(e)
            }
        }
    }

    // ---- workflow operations ----

    /// Offer `terms` to the freelancer identity `freelancer_id`.
    pub async fn propose(&self, freelancer_id: &str, terms: ProposalTerms) -> SessionResult<SubmitOutcome> {
        let (context, client, party) = self.acting()?;
        permit(&party, party.role.can_propose(), "create proposals")?;
        terms.validate()?;
        let freelancer = self
            .identities
            .get(freelancer_id)
            .ok_or_else(|| SessionError::UnknownIdentity(freelancer_id.to_string()))?;
        if freelancer.role != RoleCategory::Freelancer {
            return Err(SessionError::InvalidCounterparty(
                freelancer.id,
                format!("proposals go to freelancers, not a {}", freelancer.role),
            ));
        }

        let _guard = self.in_flight.acquire(CREATE_PROPOSAL)?;
        let result = client
            .create_proposal(&context.identity, &freelancer.id, &terms)
            .await;
        let outcome = self.settle(result, "creating proposal")?;
        self.activity.log(format!(
            "Proposal \"{}\" sent to {}",
            terms.description,
            freelancer.label()
        ));
        self.activity.notify(
            NoticeLevel::Success,
            format!("Contract created with {}", freelancer.display_name),
        );
        self.reload().await;
        Ok(outcome)
    }

    pub async fn accept_proposal(&self, proposal: &ContractRef) -> SessionResult<SubmitOutcome> {
        let (context, client, party) = self.acting()?;
        permit(&party, party.role.can_respond_to_proposal(), "accept proposals")?;

        let _guard = self.in_flight.acquire(contract_key("acceptProposal", proposal.as_str()))?;
        let result = client.accept_proposal(&context.identity, proposal).await;
        let outcome = self.settle(result, "accepting proposal")?;
        self.activity
            .log(format!("{} accepted proposal {}...", party.display_name, proposal.short()));
        self.activity
            .notify(NoticeLevel::Success, "Proposal accepted, contract is now active");
        self.reload().await;
        Ok(outcome)
    }

    pub async fn reject_proposal(&self, proposal: &ContractRef) -> SessionResult<SubmitOutcome> {
        let (context, client, party) = self.acting()?;
        permit(&party, party.role.can_respond_to_proposal(), "reject proposals")?;

        let _guard = self.in_flight.acquire(contract_key("rejectProposal", proposal.as_str()))?;
        let result = client.reject_proposal(&context.identity, proposal).await;
        let outcome = self.settle(result, "rejecting proposal")?;
        self.activity
            .log(format!("{} rejected proposal {}...", party.display_name, proposal.short()));
        self.activity.notify(NoticeLevel::Info, "Proposal rejected");
        self.reload().await;
        Ok(outcome)
    }

    pub async fn submit_milestone(&self, contract: &ContractRef) -> SessionResult<SubmitOutcome> {
        let (context, client, party) = self.acting()?;
        permit(&party, party.role.can_submit_milestone(), "submit milestones")?;

        let _guard = self.in_flight.acquire(contract_key("submitMilestone", contract.as_str()))?;
        let result = client.submit_milestone(&context.identity, contract).await;
        let outcome = self.settle(result, "submitting milestone")?;
        self.activity
            .log(format!("{} submitted a milestone on {}...", party.display_name, contract.short()));
        self.activity
            .notify(NoticeLevel::Info, "Milestone submitted successfully");
        self.reload().await;
        Ok(outcome)
    }

    /// Approve the pending milestone on `contract`, paying `payment`.
    pub async fn approve_milestone(&self, contract: &ContractRef, payment: f64) -> SessionResult<SubmitOutcome> {
        let (context, client, party) = self.acting()?;
        permit(&party, party.role.can_review_milestone(), "approve milestones")?;
        validate_payment(payment)?;
        self.require_pending(contract)?;

        let _guard = self.in_flight.acquire(contract_key("approveMilestone", contract.as_str()))?;
        let result = client
            .approve_milestone(&context.identity, contract, payment)
            .await;
        let outcome = self.settle(result, "approving milestone")?;
        let amount = encode_decimal(payment);
        self.activity
            .log(format!("Approved milestone on {}... and paid ${amount}", contract.short()));
        self.activity
            .notify(NoticeLevel::Success, format!("Milestone approved — ${amount} paid"));
        self.reload().await;
        Ok(outcome)
    }

    /// Send the pending milestone back without payment. The completed
    /// milestone count is unchanged.
    pub async fn reject_milestone(&self, contract: &ContractRef) -> SessionResult<SubmitOutcome> {
        let (context, client, party) = self.acting()?;
        permit(&party, party.role.can_review_milestone(), "reject milestones")?;
        self.require_pending(contract)?;

        let _guard = self.in_flight.acquire(contract_key("rejectMilestone", contract.as_str()))?;
        let result = client.reject_milestone(&context.identity, contract).await;
        let outcome = self.settle(result, "rejecting milestone")?;
        self.activity
            .log(format!("Sent milestone on {}... back for rework", contract.short()));
        self.activity
            .notify(NoticeLevel::Info, "Milestone sent back to the freelancer");
        self.reload().await;
        Ok(outcome)
    }

    pub async fn cancel_contract(&self, contract: &ContractRef) -> SessionResult<SubmitOutcome> {
        let (context, client, party) = self.acting()?;
        permit(&party, party.role.can_cancel(), "cancel contracts")?;

        let _guard = self.in_flight.acquire(contract_key("cancelContract", contract.as_str()))?;
        let result = client.cancel_contract(&context.identity, contract).await;
        let outcome = self.settle(result, "cancelling contract")?;
        self.activity
            .log(format!("Cancelled contract {}...", contract.short()));
        self.activity.notify(NoticeLevel::Warning, "Contract cancelled");
        self.reload().await;
        Ok(outcome)
    }

    /// Share contract and payment totals from the current snapshot with the
    /// first Auditor. `period` defaults to the current quarter.
    pub async fn generate_audit(&self, period: Option<&str>) -> SessionResult<SubmitOutcome> {
        let (context, client, party) = self.acting()?;
        permit(&party, party.role.can_generate_audit(), "generate audit summaries")?;
        let Some(auditor) = self.identities.first_with_role(RoleCategory::Auditor) else {
            let message = "no auditor identity exists to receive the summary";
            warn!("{message}");
            self.activity.notify(NoticeLevel::Warning, format!("Cannot generate audit: {message}"));
            return Err(SessionError::Policy(message.to_string()));
        };

        let totals = {
            let view = self.read();
            AuditTotals {
                total_contracts_count: u32::try_from(view.snapshot.contracts.len()).unwrap_or(u32::MAX),
                total_amount_paid: view.snapshot.total_paid(),
                report_period: period
                    .map(str::to_string)
                    .unwrap_or_else(current_report_period),
            }
        };

        let _guard = self.in_flight.acquire(GENERATE_AUDIT)?;
        let result = client
            .create_audit_summary(&context.identity, &auditor.id, &totals)
            .await;
        let outcome = self.settle(result, "generating audit summary")?;
        self.activity.log(format!(
            "Audit summary for {} shared with {}: {} contracts, ${} paid",
            totals.report_period,
            auditor.label(),
            totals.total_contracts_count,
            encode_decimal(totals.total_amount_paid)
        ));
        self.activity
            .notify(NoticeLevel::Success, "Audit summary generated for auditor");
        self.reload().await;
        Ok(outcome)
    }

    /// Allocate a new identity on the active environment's ledger.
    pub async fn create_identity(&self, display_name: &str, role: RoleCategory) -> SessionResult<Party> {
        let (context, client) = self.current()?;
        let key = context.environment.ok_or(SessionError::NotConnected)?;
        let config = self
            .environments
            .get(key)
            .ok_or(SessionError::UnknownEnvironment(key))?;

        let _guard = self.in_flight.acquire(CREATE_ACCOUNT)?;
        match self.identities.allocate(display_name, role, config, &client).await {
            Ok(party) => {
                self.activity
                    .log(format!("Created account {} on {}", party.label(), config.mode.display_name()));
                self.activity.notify(
                    NoticeLevel::Success,
                    format!("Account created for {}", party.display_name),
                );
                Ok(party)
            }
            Err(e) => {
                warn!(error = %e, "account creation failed");
                self.activity.log(format!("Error creating account: {e}"));
                self.activity
                    .notify(NoticeLevel::Danger, format!("Error creating account: {e}"));
                Err(e.into())
            }
        }
    }

    // ---- internals ----

    fn read(&self) -> std::sync::RwLockReadGuard<'_, View> {
        self.view.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, View> {
        self.view.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Activate `key`: connect its client, load its identities, and start a
    /// fresh view. The active identity falls back to the default if it does
    /// not exist there.
    fn enter(&self, key: EnvironmentKey) -> SessionResult<&EnvironmentConfig> {
        let config = self
            .environments
            .get(key)
            .ok_or(SessionError::UnknownEnvironment(key))?;
        let client = self.client_for(key, config)?;
        self.identities.activate(key, &client)?;

        let mut view = self.write();
        view.context.generation += 1;
        view.context.environment = Some(key);
        if !self.identities.contains(&view.context.identity) {
            view.context.identity = DEFAULT_IDENTITY.to_string();
        }
        view.snapshot = VisibleState::default();
        Ok(config)
    }

    // Clients are kept per environment so switching back retains the call
    // log and the learned package id.
    fn client_for(&self, key: EnvironmentKey, config: &EnvironmentConfig) -> LedgerResult<Arc<LedgerClient>> {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }
        let transport = self.connector.connect(key, config, &self.settings)?;
        let client_config = LedgerClientConfig::new(config.mode, config.dar_package_id.clone())
            .with_package_id(config.package_id.clone())
            .with_application_id(self.settings.application_id.clone());
        let client = Arc::new(
            LedgerClient::new(client_config, transport).with_credentials(config.parties.clone()),
        );
        clients.insert(key, client.clone());
        Ok(client)
    }

    fn current(&self) -> SessionResult<(ViewContext, Arc<LedgerClient>)> {
        let context = self.context();
        let key = context.environment.ok_or(SessionError::NotConnected)?;
        let client = self
            .clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
            .ok_or(SessionError::NotConnected)?;
        Ok((context, client))
    }

    fn acting(&self) -> SessionResult<(ViewContext, Arc<LedgerClient>, Party)> {
        let (context, client) = self.current()?;
        let party = self
            .identities
            .get(&context.identity)
            .ok_or_else(|| SessionError::UnknownIdentity(context.identity.clone()))?;
        Ok((context, client, party))
    }

    fn require_pending(&self, contract: &ContractRef) -> SessionResult<()> {
        let view = self.read();
        match view.snapshot.contract(contract) {
            Some(c) if c.milestone_pending == Some(false) => {
                Err(SessionError::NoPendingMilestone(contract.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Replace the snapshot if `context` is still current.
    fn apply(&self, context: &ViewContext, state: VisibleState) -> bool {
        let mut view = self.write();
        if view.context != *context {
            debug!(
                requested = context.generation,
                current = view.context.generation,
                "discarding stale snapshot"
            );
            return false;
        }
        view.snapshot = state;
        true
    }

    async fn query(&self) -> SessionResult<bool> {
        let (context, client) = self.current()?;
        let state = client.query_visible_state(&context.identity).await?;
        Ok(self.apply(&context, state))
    }

    // A failed reload after a successful submission does not undo the
    // submission. `refresh` has already reported the error.
    async fn reload(&self) {
        let _ = self.refresh().await;
    }

    fn settle<T>(&self, result: LedgerResult<T>, what: &str) -> SessionResult<T> {
        result.map_err(|e| {
            warn!(error = %e, "{what} failed");
            self.activity.log(format!("Error {what}: {e}"));
            self.activity
                .notify(NoticeLevel::Danger, format!("Error {what}: {e}"));
            SessionError::from(e)
        })
    }
}

fn permit(party: &Party, allowed: bool, action: &'static str) -> SessionResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(SessionError::NotPermitted {
            role: party.role,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use lance_identity::MemoryIdentityStore;
    use lance_ledger::{endpoints, LedgerRequest, LedgerTransport, SandboxLedger};
    use lance_types::LedgerMode;
    use tokio::sync::Notify;

    use crate::connector::SandboxConnector;

    fn local_session() -> (Arc<SandboxLedger>, Session) {
        let ledger = Arc::new(SandboxLedger::new());
        let mut config = EnvironmentConfig::new(LedgerMode::Local, "http://localhost:6870", "cantonlance");
        config.parties = ledger.seed_presets();
        let environments = EnvironmentRegistry::from_configs([(EnvironmentKey::Local, config)]).unwrap();
        let session = Session::connect(
            SessionSettings::default(),
            environments,
            IdentityRegistry::in_memory(),
            Arc::new(SandboxConnector::new(ledger.clone())),
        )
        .unwrap();
        (ledger, session)
    }

    #[test]
    fn connects_to_default_environment_as_client() {
        let (ledger, session) = local_session();
        let context = session.context();
        assert_eq!(context.environment, Some(EnvironmentKey::Local));
        assert_eq!(context.identity, DEFAULT_IDENTITY);
        assert_eq!(context.generation, 1);
        assert_eq!(session.active_identity().unwrap().role, RoleCategory::Client);
        assert!(session.action_log()[0].ends_with("Connected to Local Sandbox at http://localhost:6870"));
        assert_eq!(ledger.request_count(), 0);
    }

    #[tokio::test]
    async fn without_environments_operations_are_not_connected() {
        let session = Session::connect(
            SessionSettings::default(),
            EnvironmentRegistry::new(),
            IdentityRegistry::in_memory(),
            Arc::new(SandboxConnector::default()),
        )
        .unwrap();
        assert!(!session.is_connected());
        assert!(matches!(session.refresh().await, Err(SessionError::NotConnected)));
        let terms = ProposalTerms::new("Audit", 100.0, 1000.0, 2);
        assert!(matches!(
            session.propose("freelancerA", terms).await,
            Err(SessionError::NotConnected)
        ));
    }

    /// Holds the next active-contracts query until released, so a switch can
    /// land while it is in flight.
    #[derive(Default)]
    struct Gate {
        armed: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    struct GatedTransport {
        ledger: Arc<SandboxLedger>,
        gate: Arc<Gate>,
    }

    #[async_trait]
    impl LedgerTransport for GatedTransport {
        async fn send(&self, request: LedgerRequest) -> LedgerResult<serde_json::Value> {
            if request.endpoint == endpoints::ACTIVE_CONTRACTS && self.gate.armed.swap(false, Ordering::SeqCst) {
                self.gate.entered.notify_one();
                self.gate.release.notified().await;
            }
            self.ledger.send(request).await
        }
    }

    struct GatedConnector {
        ledger: Arc<SandboxLedger>,
        gate: Arc<Gate>,
    }

    impl LedgerConnector for GatedConnector {
        fn connect(
            &self,
            _key: EnvironmentKey,
            _config: &EnvironmentConfig,
            _settings: &SessionSettings,
        ) -> LedgerResult<Arc<dyn LedgerTransport>> {
            let transport: Arc<dyn LedgerTransport> = Arc::new(GatedTransport {
                ledger: self.ledger.clone(),
                gate: self.gate.clone(),
            });
            Ok(transport)
        }
    }

    #[tokio::test]
    async fn refresh_landing_after_identity_switch_is_discarded() {
        let ledger = Arc::new(SandboxLedger::new());
        let gate = Arc::new(Gate::default());
        let mut config = EnvironmentConfig::new(LedgerMode::Local, "http://localhost:6870", "cantonlance");
        config.parties = ledger.seed_presets();
        let environments = EnvironmentRegistry::from_configs([(EnvironmentKey::Local, config)]).unwrap();
        let session = Session::connect(
            SessionSettings::default(),
            environments,
            IdentityRegistry::in_memory(),
            Arc::new(GatedConnector {
                ledger: ledger.clone(),
                gate: gate.clone(),
            }),
        )
        .unwrap();
        session
            .propose("freelancerA", ProposalTerms::new("Brand kit", 90.0, 900.0, 3))
            .await
            .unwrap();
        assert_eq!(session.snapshot().proposals.len(), 1);

        // The client's query is held while the view moves to the auditor.
        gate.armed.store(true, Ordering::SeqCst);
        let switch = async {
            gate.entered.notified().await;
            let party = session.switch_identity("auditor").await.unwrap();
            gate.release.notify_one();
            party
        };
        let (applied, party) = tokio::join!(session.refresh(), switch);

        assert!(!applied.unwrap());
        assert_eq!(party.role, RoleCategory::Auditor);
        assert_eq!(session.context().identity, "auditor");
        assert!(session.snapshot().is_empty());
    }

    #[tokio::test]
    async fn audit_without_an_auditor_is_refused_with_a_notice() {
        let ledger = Arc::new(SandboxLedger::new());
        let mut config = EnvironmentConfig::new(LedgerMode::Local, "http://localhost:6870", "cantonlance");
        config.parties = ledger.seed_presets();
        let environments = EnvironmentRegistry::from_configs([(EnvironmentKey::Local, config)]).unwrap();
        let presets = lance_types::preset_parties()
            .into_iter()
            .filter(|p| p.role != RoleCategory::Auditor)
            .collect();
        let identities = IdentityRegistry::with_presets(Arc::new(MemoryIdentityStore::new()), presets);
        let session = Session::connect(
            SessionSettings::default(),
            environments,
            identities,
            Arc::new(SandboxConnector::new(ledger.clone())),
        )
        .unwrap();

        let err = session.generate_audit(Some("2026-Q1")).await.unwrap_err();
        assert!(matches!(err, SessionError::Policy(_)));
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert_eq!(ledger.request_count(), 0);
    }

    #[tokio::test]
    async fn failed_refresh_is_logged_and_announced() {
        let (ledger, session) = local_session();
        ledger.fail_endpoint(endpoints::ACTIVE_CONTRACTS, 503, "query service down");

        let err = session.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Ledger(lance_ledger::LedgerError::Transport { status: 503, .. })
        ));
        assert!(session.action_log()[0].contains("Error loading contracts"));
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Danger);
        assert!(notices[0].message.contains("query service down"));
    }

    #[test]
    fn stale_snapshots_are_discarded() {
        let (_, session) = local_session();
        let before = session.context();
        {
            let mut view = session.write();
            view.context.generation += 1;
            view.context.identity = "auditor".into();
        }
        let mut state = VisibleState::default();
        state.payments.push(lance_types::Payment {
            contract_ref: ContractRef::new("00aa"),
            client: "c".into(),
            freelancer: "f".into(),
            amount: 500.0,
            milestone_number: 1,
            timestamp: String::new(),
            project_description: "leak".into(),
        });
        assert!(!session.apply(&before, state.clone()));
        assert!(session.snapshot().is_empty());

        assert!(session.apply(&session.context(), state));
        assert_eq!(session.snapshot().payments.len(), 1);
    }

    #[tokio::test]
    async fn switching_identity_bumps_generation_and_clears_snapshot() {
        let (_, session) = local_session();
        session
            .propose("freelancerA", ProposalTerms::new("Logo", 80.0, 800.0, 2))
            .await
            .unwrap();
        assert_eq!(session.snapshot().proposals.len(), 1);

        let before = session.context().generation;
        let party = session.switch_identity("auditor").await.unwrap();
        assert_eq!(party.role, RoleCategory::Auditor);
        assert!(session.context().generation > before);
        assert!(session.snapshot().is_empty());
    }

    #[tokio::test]
    async fn role_checks_run_before_any_ledger_call() {
        let (ledger, session) = local_session();
        session.switch_identity("freelancerA").await.unwrap();
        let requests = ledger.request_count();

        let err = session
            .propose("freelancerB", ProposalTerms::new("x", 1.0, 1.0, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::NotPermitted { role: RoleCategory::Freelancer, .. }
        ));
        let err = session
            .approve_milestone(&ContractRef::new("00aa"), 10.0)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "a Freelancer cannot approve milestones");
        assert_eq!(ledger.request_count(), requests);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_locally() {
        let (ledger, session) = local_session();
        let err = session
            .propose("freelancerA", ProposalTerms::new("Too many", 10.0, 100.0, 21))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Invalid(_)));
        let err = session
            .propose("auditor", ProposalTerms::new("Wrong target", 10.0, 100.0, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidCounterparty(..)));
        let err = session
            .approve_milestone(&ContractRef::new("00aa"), -5.0)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Invalid(_)));
        assert_eq!(ledger.request_count(), 0);
    }

    #[tokio::test]
    async fn unknown_identity_and_environment() {
        let (_, session) = local_session();
        assert!(matches!(
            session.switch_identity("mallory").await,
            Err(SessionError::UnknownIdentity(_))
        ));
        assert!(matches!(
            session.switch_environment(EnvironmentKey::Devnet).await,
            Err(SessionError::UnknownEnvironment(EnvironmentKey::Devnet))
        ));
    }
}
