//! Per-environment ledger client.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use lance_types::numeric::encode_decimal;
use lance_types::{ContractRef, LedgerMode, PartyCredential, ProposalTerms, VisibleState};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::api_log::{ApiCall, ApiCallLog};
use crate::commands::{envelope, extract_created_ref, Choice, CommandIds, LedgerCommand, Template, TEMPLATE_MODULE};
use crate::decode::decode_active_contracts;
use crate::endpoints;
use crate::error::{LedgerError, LedgerResult};
use crate::transport::{HttpMethod, LedgerRequest, LedgerTransport};

/// Identity key recorded for party and user administration calls.
pub const ADMIN_IDENTITY: &str = "admin";

const DEFAULT_APPLICATION_ID: &str = "cantonlance";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerClientConfig {
    pub mode: LedgerMode,
    /// Package name used in `#name` template references until the concrete
    /// package id is learned.
    pub dar_package_id: String,
    pub package_id: Option<String>,
    pub application_id: String,
}

impl LedgerClientConfig {
    pub fn new(mode: LedgerMode, dar_package_id: impl Into<String>) -> Self {
        Self {
            mode,
            dar_package_id: dar_package_id.into(),
            package_id: None,
            application_id: DEFAULT_APPLICATION_ID.to_string(),
        }
    }

    pub fn with_package_id(mut self, package_id: Option<String>) -> Self {
        self.package_id = package_id.filter(|p| !p.is_empty());
        self
    }

    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = application_id.into();
        self
    }
}

/// What a successful submission produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Reference of the last record created, for transaction-detail
    /// submissions.
    pub created: Option<ContractRef>,
    pub update_id: Option<String>,
    pub description: String,
}

/// Aggregates shared with an Auditor.
#[derive(Clone, Debug, PartialEq)]
pub struct AuditTotals {
    pub total_contracts_count: u32,
    pub total_amount_paid: f64,
    pub report_period: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Wait {
    Completion,
    Transaction,
}

/// Client for one ledger environment.
///
/// Holds the credentials of every identity that may act on this ledger and a
/// capped log of every call made. It keeps no cached ledger state apart from
/// the learned package id: each query fetches a fresh ledger end first.
pub struct LedgerClient {
    config: LedgerClientConfig,
    transport: Arc<dyn LedgerTransport>,
    credentials: RwLock<HashMap<String, PartyCredential>>,
    package_id: RwLock<Option<String>>,
    log: ApiCallLog,
}

impl LedgerClient {
    pub fn new(config: LedgerClientConfig, transport: Arc<dyn LedgerTransport>) -> Self {
        let package_id = config.package_id.clone();
        Self {
            config,
            transport,
            credentials: RwLock::new(HashMap::new()),
            package_id: RwLock::new(package_id),
            log: ApiCallLog::new(),
        }
    }

    pub fn with_credentials<I>(self, credentials: I) -> Self
    where
        I: IntoIterator<Item = (String, PartyCredential)>,
    {
        {
            let mut map = self.credentials.write().unwrap_or_else(|e| e.into_inner());
            map.extend(credentials);
        }
        self
    }

    pub fn mode(&self) -> LedgerMode {
        self.config.mode
    }

    pub fn config(&self) -> &LedgerClientConfig {
        &self.config
    }

    /// Add or replace the credential an identity acts with.
    pub fn register_credential(&self, identity: &str, credential: PartyCredential) {
        debug!(identity, party = %credential.party_id, "registering credential");
        let mut map = self.credentials.write().unwrap_or_else(|e| e.into_inner());
        map.insert(identity.to_string(), credential);
    }

    pub fn credential(&self, identity: &str) -> LedgerResult<PartyCredential> {
        let map = self.credentials.read().unwrap_or_else(|e| e.into_inner());
        map.get(identity)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownIdentity(identity.to_string()))
    }

    pub fn has_credential(&self, identity: &str) -> bool {
        let map = self.credentials.read().unwrap_or_else(|e| e.into_inner());
        map.contains_key(identity)
    }

    /// Registered identity keys, sorted.
    pub fn identities(&self) -> Vec<String> {
        let map = self.credentials.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn package_id(&self) -> Option<String> {
        self.package_id.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn template_id(&self, template: Template) -> String {
        match self.package_id() {
            Some(pkg) => format!("{pkg}:{TEMPLATE_MODULE}:{}", template.entity_name()),
            None => format!(
                "#{}:{TEMPLATE_MODULE}:{}",
                self.config.dar_package_id,
                template.entity_name()
            ),
        }
    }

    pub fn api_log(&self) -> &ApiCallLog {
        &self.log
    }

    /// Call log, newest first.
    pub fn api_calls(&self) -> Vec<ApiCall> {
        self.log.entries()
    }

    /// Current ledger end as seen by `identity`.
    pub async fn ledger_end(&self, identity: &str) -> LedgerResult<i64> {
        let credential = self.credential(identity)?;
        self.fetch_ledger_end(identity, &credential).await
    }

    async fn fetch_ledger_end(&self, identity: &str, credential: &PartyCredential) -> LedgerResult<i64> {
        let request = LedgerRequest::get(endpoints::LEDGER_END).with_token(&credential.token);
        match self.transport.send(request).await {
            Ok(response) => Ok(response.get("offset").and_then(Value::as_i64).unwrap_or(0)),
            Err(e) => {
                self.record_failure(identity, HttpMethod::Get, endpoints::LEDGER_END, None, &e, "Ledger end fetch");
                Err(e)
            }
        }
    }

    /// Everything `identity` can currently see.
    ///
    /// The ledger performs the privacy filtering; this only asks for all
    /// templates visible to the identity's party at the current ledger end.
    pub async fn query_visible_state(&self, identity: &str) -> LedgerResult<VisibleState> {
        let credential = self.credential(identity)?;
        let offset = self.fetch_ledger_end(identity, &credential).await?;

        let mut filters = Map::new();
        filters.insert(
            credential.party_id.clone(),
            json!({
                "cumulative": [{
                    "identifierFilter": {
                        "WildcardFilter": { "value": { "includeCreatedEventBlob": false } }
                    }
                }]
            }),
        );
        let body = json!({
            "filter": { "filtersByParty": filters },
            "verbose": true,
            "activeAtOffset": offset,
        });

        let request = LedgerRequest::post(endpoints::ACTIVE_CONTRACTS, body.clone()).with_token(&credential.token);
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                self.record_failure(identity, HttpMethod::Post, endpoints::ACTIVE_CONTRACTS, Some(body), &e, "Query");
                return Err(e);
            }
        };

        let snapshot = decode_active_contracts(&response);
        if let Some(learned) = snapshot.package_id.as_deref() {
            let mut package_id = self.package_id.write().unwrap_or_else(|e| e.into_inner());
            if package_id.is_none() {
                info!(package_id = learned, "resolved contract package id");
                *package_id = Some(learned.to_string());
            }
        }

        let label = self.config.mode.label();
        let state = snapshot.state;
        self.log.record(ApiCall {
            timestamp: Utc::now().to_rfc3339(),
            identity: identity.to_string(),
            method: HttpMethod::Post.to_string(),
            endpoint: endpoints::ACTIVE_CONTRACTS.to_string(),
            request_body: Some(body),
            response_body: json!({
                "totalContracts": snapshot.entry_count,
                "projectContracts": state.contracts.len(),
                "proposals": state.proposals.len(),
                "paymentRecords": state.payments.len(),
                "auditSummaries": state.audit_summaries.len(),
                "skipped": snapshot.skipped,
                "source": format!("Canton JSON Ledger API v2 ({label})"),
                "note": format!(
                    "Authenticated as {}: response contains only contracts visible to this party",
                    credential.party_id
                ),
            }),
            response_count: snapshot.entry_count,
            description: format!(
                "[{label}] Query contracts visible to {identity} ({} results)",
                snapshot.entry_count
            ),
        });
        debug!(identity, offset, records = state.total_records(), "queried visible state");
        Ok(state)
    }

    /// Package ids uploaded to the ledger.
    pub async fn list_packages(&self, identity: &str) -> LedgerResult<Vec<String>> {
        let credential = self.credential(identity)?;
        let request = LedgerRequest::get(endpoints::PACKAGES).with_token(&credential.token);
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                self.record_failure(identity, HttpMethod::Get, endpoints::PACKAGES, None, &e, "Package listing");
                return Err(e);
            }
        };
        let ids: Vec<String> = response
            .get("packageIds")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        self.record(
            identity,
            HttpMethod::Get,
            endpoints::PACKAGES,
            None,
            response,
            ids.len(),
            format!("List uploaded packages ({} found)", ids.len()),
        );
        Ok(ids)
    }

    /// Offer `terms` from `identity` to the freelancer identity.
    pub async fn create_proposal(
        &self,
        identity: &str,
        freelancer_identity: &str,
        terms: &ProposalTerms,
    ) -> LedgerResult<SubmitOutcome> {
        let client = self.credential(identity)?;
        let freelancer = self.credential(freelancer_identity)?;
        let command = LedgerCommand::create(
            Template::ProjectProposal,
            json!({
                "client": client.party_id,
                "freelancer": freelancer.party_id,
                "description": terms.description,
                "hourlyRate": encode_decimal(terms.hourly_rate),
                "totalBudget": encode_decimal(terms.total_budget),
                "milestonesTotal": terms.milestones_total,
            }),
        );
        self.submit(
            identity,
            vec![command],
            "proposal",
            "create-proposal",
            Wait::Transaction,
            format!("Client created proposal for {freelancer_identity}"),
        )
        .await
    }

    pub async fn accept_proposal(&self, identity: &str, proposal: &ContractRef) -> LedgerResult<SubmitOutcome> {
        let command = LedgerCommand::exercise(proposal, Choice::AcceptProposal, json!({}));
        self.submit(
            identity,
            vec![command],
            "accept",
            "accept-proposal",
            Wait::Transaction,
            format!("{identity} accepted proposal → ProjectContract created"),
        )
        .await
    }

    pub async fn reject_proposal(&self, identity: &str, proposal: &ContractRef) -> LedgerResult<SubmitOutcome> {
        let command = LedgerCommand::exercise(proposal, Choice::RejectProposal, json!({}));
        self.submit(
            identity,
            vec![command],
            "reject",
            "reject-proposal",
            Wait::Completion,
            format!("{identity} rejected proposal {}...", proposal.short()),
        )
        .await
    }

    pub async fn submit_milestone(&self, identity: &str, contract: &ContractRef) -> LedgerResult<SubmitOutcome> {
        let command = LedgerCommand::exercise(contract, Choice::SubmitMilestone, json!({}));
        self.submit(
            identity,
            vec![command],
            "milestone",
            "submit-milestone",
            Wait::Transaction,
            format!("{identity} submitted milestone on {}...", contract.short()),
        )
        .await
    }

    /// Approve the pending milestone and pay `payment` for it.
    pub async fn approve_milestone(
        &self,
        identity: &str,
        contract: &ContractRef,
        payment: f64,
    ) -> LedgerResult<SubmitOutcome> {
        let amount = encode_decimal(payment);
        let command = LedgerCommand::exercise(
            contract,
            Choice::ApproveMilestone,
            json!({ "milestonePayment": amount }),
        );
        self.submit(
            identity,
            vec![command],
            "approve",
            "approve-milestone",
            Wait::Transaction,
            format!("Client approved milestone — ${amount} payment"),
        )
        .await
    }

    pub async fn reject_milestone(&self, identity: &str, contract: &ContractRef) -> LedgerResult<SubmitOutcome> {
        let command = LedgerCommand::exercise(contract, Choice::RejectMilestone, json!({}));
        self.submit(
            identity,
            vec![command],
            "reject-milestone",
            "reject-milestone",
            Wait::Completion,
            format!("Client sent milestone on {}... back for rework", contract.short()),
        )
        .await
    }

    pub async fn cancel_contract(&self, identity: &str, contract: &ContractRef) -> LedgerResult<SubmitOutcome> {
        let command = LedgerCommand::exercise(contract, Choice::CancelContract, json!({}));
        self.submit(
            identity,
            vec![command],
            "cancel",
            "cancel-contract",
            Wait::Completion,
            format!("Client cancelled contract {}...", contract.short()),
        )
        .await
    }

    /// Share `totals` with the auditor identity.
    pub async fn create_audit_summary(
        &self,
        identity: &str,
        auditor_identity: &str,
        totals: &AuditTotals,
    ) -> LedgerResult<SubmitOutcome> {
        let client = self.credential(identity)?;
        let auditor = self.credential(auditor_identity)?;
        let command = LedgerCommand::create(
            Template::AuditSummary,
            json!({
                "client": client.party_id,
                "auditor": auditor.party_id,
                "totalContractsCount": totals.total_contracts_count,
                "totalAmountPaid": encode_decimal(totals.total_amount_paid),
                "reportPeriod": totals.report_period,
            }),
        );
        self.submit(
            identity,
            vec![command],
            "audit",
            "audit-summary",
            Wait::Completion,
            format!(
                "Audit summary for {} created, visible to client + {auditor_identity} only",
                totals.report_period
            ),
        )
        .await
    }

    /// Allocate a new party and return its ledger-native id.
    pub async fn allocate_party(&self, hint: &str) -> LedgerResult<String> {
        let body = json!({ "partyIdHint": hint, "identityProviderId": "" });
        let request = LedgerRequest::post(endpoints::PARTIES, body.clone());
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                self.record_failure(ADMIN_IDENTITY, HttpMethod::Post, endpoints::PARTIES, Some(body), &e, "Party allocation");
                return Err(e);
            }
        };
        let party = response
            .get("partyDetails")
            .and_then(|d| d.get("party"))
            .and_then(Value::as_str)
            .map(str::to_string);
        self.record(
            ADMIN_IDENTITY,
            HttpMethod::Post,
            endpoints::PARTIES,
            Some(body),
            response,
            usize::from(party.is_some()),
            format!("[{}] Allocated party {hint}", self.config.mode.label()),
        );
        party.ok_or_else(|| LedgerError::InvalidResponse("party allocation returned no party id".into()))
    }

    /// Create a user that can act and read as `party_id`.
    pub async fn create_user(&self, user_id: &str, party_id: &str) -> LedgerResult<()> {
        let body = json!({
            "user": {
                "id": user_id,
                "primaryParty": party_id,
                "isDeactivated": false,
                "identityProviderId": "",
            },
            "rights": [
                { "kind": { "CanActAs": { "value": { "party": party_id } } } },
                { "kind": { "CanReadAs": { "value": { "party": party_id } } } },
            ],
        });
        let request = LedgerRequest::post(endpoints::USERS, body.clone());
        match self.transport.send(request).await {
            Ok(response) => {
                self.record(
                    ADMIN_IDENTITY,
                    HttpMethod::Post,
                    endpoints::USERS,
                    Some(body),
                    response,
                    1,
                    format!("[{}] Created user {user_id} acting as new party", self.config.mode.label()),
                );
                Ok(())
            }
            Err(e) => {
                self.record_failure(ADMIN_IDENTITY, HttpMethod::Post, endpoints::USERS, Some(body), &e, "User creation");
                Err(e)
            }
        }
    }

    async fn submit(
        &self,
        identity: &str,
        commands: Vec<LedgerCommand>,
        workflow: &str,
        intent: &str,
        wait: Wait,
        description: String,
    ) -> LedgerResult<SubmitOutcome> {
        let credential = self.credential(identity)?;
        let wire: Vec<Value> = commands
            .iter()
            .map(|cmd| cmd.to_json(&self.template_id(cmd.template())))
            .collect();
        let ids = CommandIds::generate(workflow, intent);
        let envelope = envelope(wire, &credential, &self.config.application_id, &ids);

        let (endpoint, body) = match wait {
            Wait::Transaction => (
                endpoints::SUBMIT_AND_WAIT_FOR_TRANSACTION,
                json!({ "commands": envelope }),
            ),
            Wait::Completion => (endpoints::SUBMIT_AND_WAIT, envelope),
        };

        let request = LedgerRequest::post(endpoint, body.clone()).with_token(&credential.token);
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(identity, intent, error = %e, "submission failed");
                self.record_failure(identity, HttpMethod::Post, endpoint, Some(body), &e, &description);
                return Err(e);
            }
        };

        let created = match wait {
            Wait::Transaction => extract_created_ref(&response),
            Wait::Completion => None,
        };
        let update_id = response
            .get("updateId")
            .or_else(|| response.get("transaction").and_then(|tx| tx.get("updateId")))
            .and_then(Value::as_str)
            .map(str::to_string);

        info!(identity, intent, command_id = %ids.command_id, "submission completed");
        self.record(identity, HttpMethod::Post, endpoint, Some(body), response, 1, description.clone());
        Ok(SubmitOutcome {
            created,
            update_id,
            description,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        identity: &str,
        method: HttpMethod,
        endpoint: &str,
        request_body: Option<Value>,
        response_body: Value,
        response_count: usize,
        description: String,
    ) {
        self.log.record(ApiCall {
            timestamp: Utc::now().to_rfc3339(),
            identity: identity.to_string(),
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            request_body,
            response_body,
            response_count,
            description,
        });
    }

    fn record_failure(
        &self,
        identity: &str,
        method: HttpMethod,
        endpoint: &str,
        request_body: Option<Value>,
        error: &LedgerError,
        what: &str,
    ) {
        let message = error.to_string();
        let brief: String = message.chars().take(80).collect();
        self.record(
            identity,
            method,
            endpoint,
            request_body,
            json!({ "error": message, "source": "Canton JSON Ledger API v2" }),
            0,
            format!("{what} failed: {brief}"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxLedger;
    use lance_types::ContractStatus;
    use std::time::Duration;

    fn sandbox_client() -> (Arc<SandboxLedger>, LedgerClient) {
        let sandbox = Arc::new(SandboxLedger::new());
        let credentials = sandbox.seed_presets();
        let client = LedgerClient::new(
            LedgerClientConfig::new(LedgerMode::Local, "cantonlance"),
            sandbox.clone(),
        )
        .with_credentials(credentials);
        (sandbox, client)
    }

    async fn active_contract(client: &LedgerClient) -> ContractRef {
        let terms = ProposalTerms::new("Website", 100.0, 1000.0, 2);
        let proposal = client.create_proposal("client", "freelancerA", &terms).await.unwrap();
        let accepted = client
            .accept_proposal("freelancerA", &proposal.created.unwrap())
            .await
            .unwrap();
        accepted.created.unwrap()
    }

    #[test]
    fn template_ids_use_hash_reference_until_learned() {
        let (_, client) = sandbox_client();
        assert_eq!(
            client.template_id(Template::ProjectProposal),
            "#cantonlance:Freelance:ProjectProposal"
        );

        let config = LedgerClientConfig::new(LedgerMode::Devnet, "cantonlance").with_package_id(Some("abc".into()));
        let client = LedgerClient::new(config, Arc::new(SandboxLedger::new()));
        assert_eq!(client.template_id(Template::AuditSummary), "abc:Freelance:AuditSummary");
    }

    #[tokio::test]
    async fn unknown_identity_is_rejected_without_network() {
        let (sandbox, client) = sandbox_client();
        let before = sandbox.request_count();
        let err = client.query_visible_state("nobody").await.unwrap_err();
        assert_eq!(err, LedgerError::UnknownIdentity("nobody".into()));
        assert_eq!(sandbox.request_count(), before);
    }

    #[tokio::test]
    async fn proposal_round_trip_keeps_terms() {
        let (_, client) = sandbox_client();
        let terms = ProposalTerms::new("Build a DEX frontend", 150.0, 5000.0, 4);
        let proposal = client.create_proposal("client", "freelancerA", &terms).await.unwrap();
        let proposal_ref = proposal.created.clone().unwrap();

        let seen = client.query_visible_state("freelancerA").await.unwrap();
        assert_eq!(seen.proposals.len(), 1);
        assert_eq!(seen.proposals[0].contract_ref, proposal_ref);

        let accepted = client.accept_proposal("freelancerA", &proposal_ref).await.unwrap();
        let contract_ref = accepted.created.unwrap();

        let state = client.query_visible_state("client").await.unwrap();
        assert!(state.proposals.is_empty());
        let contract = state.contract(&contract_ref).unwrap();
        assert_eq!(contract.hourly_rate, 150.0);
        assert_eq!(contract.total_budget, 5000.0);
        assert_eq!(contract.milestones_total, 4);
        assert_eq!(contract.milestones_completed, 0);
        assert_eq!(contract.amount_paid, 0.0);
        assert_eq!(contract.status, ContractStatus::Active);
    }

    #[tokio::test]
    async fn ledger_end_and_packages() {
        let (sandbox, client) = sandbox_client();
        assert_eq!(client.ledger_end("client").await.unwrap(), 0);
        active_contract(&client).await;
        assert_eq!(client.ledger_end("auditor").await.unwrap(), 2);

        let packages = client.list_packages("client").await.unwrap();
        assert_eq!(packages, vec![sandbox.package_id().to_string()]);
        let latest = client.api_log().latest().unwrap();
        assert_eq!(latest.endpoint, endpoints::PACKAGES);
        assert_eq!(latest.response_count, 1);
    }

    #[tokio::test]
    async fn package_id_is_learned_from_first_query() {
        let (sandbox, client) = sandbox_client();
        active_contract(&client).await;
        assert!(client.package_id().is_none());
        client.query_visible_state("client").await.unwrap();
        assert_eq!(client.package_id(), Some(sandbox.package_id().to_string()));
        assert!(client
            .template_id(Template::ProjectContract)
            .starts_with(sandbox.package_id()));
    }

    #[tokio::test]
    async fn approval_extracts_successor_not_payment() {
        let (_, client) = sandbox_client();
        let contract = active_contract(&client).await;
        client.submit_milestone("freelancerA", &contract).await.unwrap();
        let state = client.query_visible_state("client").await.unwrap();
        let pending = state.contracts[0].contract_ref.clone();

        let outcome = client.approve_milestone("client", &pending, 500.0).await.unwrap();
        assert_eq!(outcome.description, "Client approved milestone — $500 payment");

        let state = client.query_visible_state("client").await.unwrap();
        assert_eq!(outcome.created.as_ref(), Some(&state.contracts[0].contract_ref));
        assert_eq!(state.payments.len(), 1);
    }

    #[tokio::test]
    async fn completion_only_submissions_return_no_reference() {
        let (_, client) = sandbox_client();
        let contract = active_contract(&client).await;
        let outcome = client.cancel_contract("client", &contract).await.unwrap();
        assert!(outcome.created.is_none());
        assert!(outcome.update_id.is_some());
        let state = client.query_visible_state("client").await.unwrap();
        assert!(state.contracts.is_empty());
    }

    #[tokio::test]
    async fn every_call_is_logged_newest_first() {
        let (_, client) = sandbox_client();
        active_contract(&client).await;
        client.query_visible_state("client").await.unwrap();

        let calls = client.api_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].endpoint, endpoints::ACTIVE_CONTRACTS);
        assert_eq!(calls[0].description, "[SANDBOX] Query contracts visible to client (1 results)");
        assert_eq!(calls[1].identity, "freelancerA");
        assert_eq!(calls[1].endpoint, endpoints::SUBMIT_AND_WAIT_FOR_TRANSACTION);
        assert_eq!(calls[2].description, "Client created proposal for freelancerA");
        let body = calls[2].request_body.as_ref().unwrap();
        assert_eq!(body["commands"]["actAs"][0], client.credential("client").unwrap().party_id);
        assert_eq!(
            body["commands"]["commands"][0]["CreateCommand"]["createArguments"]["hourlyRate"],
            "100"
        );
    }

    #[tokio::test]
    async fn failed_submission_is_logged_before_propagating() {
        let (sandbox, client) = sandbox_client();
        sandbox.fail_endpoint(endpoints::SUBMIT_AND_WAIT, 503, "unavailable");
        let err = client
            .cancel_contract("client", &ContractRef::new("00dead"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));

        let latest = client.api_log().latest().unwrap();
        assert!(latest.is_error());
        assert_eq!(latest.response_count, 0);
        assert!(latest.description.starts_with("Client cancelled contract"));
    }

    #[tokio::test]
    async fn rejected_command_surfaces_ledger_status() {
        let (_, client) = sandbox_client();
        let contract = active_contract(&client).await;
        // No milestone has been submitted yet.
        let err = client.approve_milestone("client", &contract, 100.0).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn allocation_creates_usable_identity() {
        let (_, client) = sandbox_client();
        let party = client.allocate_party("Freelancer_Ravi_a1b2c3").await.unwrap();
        assert!(party.starts_with("Freelancer_Ravi_a1b2c3::"));
        client.create_user("user-0badf00d", &party).await.unwrap();
        client.register_credential("user-0badf00d", PartyCredential::new(party, "user-0badf00d", ""));

        let state = client.query_visible_state("user-0badf00d").await.unwrap();
        assert!(state.is_empty());
        assert_eq!(client.api_calls()[2].identity, ADMIN_IDENTITY);
    }

    #[tokio::test]
    async fn duplicate_user_creation_fails() {
        let (_, client) = sandbox_client();
        let party = client.allocate_party("Auditor_Zed_000001").await.unwrap();
        client.create_user("user-1", &party).await.unwrap();
        let err = client.create_user("user-1", &party).await.unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert!(client.api_log().latest().unwrap().is_error());
    }

    #[tokio::test]
    async fn http_transport_round_trip_against_mock() {
        use crate::http::HttpTransport;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(endpoints::LEDGER_END))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"offset": 42})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(endpoints::ACTIVE_CONTRACTS))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "contractEntry": {"JsActiveContract": {"createdEvent": {
                    "contractId": "00aa",
                    "templateId": "deadbeef:Freelance:AuditSummary",
                    "createArgument": {"totalContractsCount": "3", "totalAmountPaid": "1200.5", "reportPeriod": "2026-Q1"}
                }}}
            }])))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), LedgerMode::Devnet, Duration::from_secs(5)).unwrap();
        let client = LedgerClient::new(
            LedgerClientConfig::new(LedgerMode::Devnet, "cantonlance"),
            Arc::new(transport),
        )
        .with_credentials([("auditor".to_string(), PartyCredential::new("Auditor::1", "auditor-user", "jwt"))]);

        let state = client.query_visible_state("auditor").await.unwrap();
        assert_eq!(state.audit_summaries.len(), 1);
        assert_eq!(state.audit_summaries[0].total_contracts_count, 3);
        assert_eq!(state.audit_summaries[0].total_amount_paid, 1200.5);
        assert_eq!(client.package_id().as_deref(), Some("deadbeef"));

        let requests = server.received_requests().await.unwrap();
        let query: Value = serde_json::from_slice(&requests[1].body).unwrap();
        assert_eq!(query["activeAtOffset"], 42);
        assert!(query["filter"]["filtersByParty"]["Auditor::1"].is_object());
        assert_eq!(
            requests[1].headers.get("authorization").unwrap().to_str().unwrap(),
            "Bearer jwt"
        );
        assert!(client.api_calls()[0].description.starts_with("[DEVNET]"));
    }

    #[tokio::test]
    async fn ledger_end_failure_is_logged() {
        let (sandbox, client) = sandbox_client();
        sandbox.fail_endpoint(endpoints::LEDGER_END, 500, "down");
        let err = client.query_visible_state("client").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(client.api_log().latest().unwrap().endpoint, endpoints::LEDGER_END);
    }
}
