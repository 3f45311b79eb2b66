//! In-process ledger speaking the JSON Ledger API v2 shapes.
//!
//! `SandboxLedger` implements [`LedgerTransport`] directly, so a
//! [`crate::LedgerClient`] can run against it unchanged. It enforces the
//! freelance template rules and stakeholder visibility: a query only returns
//! contracts on which one of the requested parties is a signatory or
//! observer. Archived contracts are dropped; no history is kept.

mod rules;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use lance_types::{preset_parties, PartyCredential};
use serde_json::{json, Value};
use tracing::debug;

use crate::commands::{Template, TEMPLATE_MODULE};
use crate::endpoints;
use crate::error::{LedgerError, LedgerResult};
use crate::transport::{HttpMethod, LedgerRequest, LedgerTransport};

use rules::{ActiveContract, NewContract, Rejection};

const PACKAGE_SEED: &[u8] = b"cantonlance-freelance-sandbox";
const NAMESPACE_SEED: &[u8] = b"cantonlance-sandbox-participant";

#[derive(Debug, Default)]
struct UserRights {
    act_as: HashSet<String>,
    read_as: HashSet<String>,
}

#[derive(Debug, Default)]
struct SandboxState {
    offset: i64,
    contracts: Vec<ActiveContract>,
    parties: BTreeSet<String>,
    users: HashMap<String, UserRights>,
    command_ids: HashSet<String>,
    failures: HashMap<String, (u16, String)>,
}

/// In-memory ledger for tests, local demos, and embedding.
#[derive(Debug)]
pub struct SandboxLedger {
    state: RwLock<SandboxState>,
    requests: AtomicUsize,
    package_id: String,
    namespace: String,
}

impl SandboxLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SandboxState::default()),
            requests: AtomicUsize::new(0),
            package_id: hex::encode(blake3::hash(PACKAGE_SEED).as_bytes()),
            namespace: format!("1220{}", hex::encode(blake3::hash(NAMESPACE_SEED).as_bytes())),
        }
    }

    /// Allocate the preset identities and a user for each, returning their
    /// credentials keyed by identity id. Calling this again returns the same
    /// credentials.
    pub fn seed_presets(&self) -> BTreeMap<String, PartyCredential> {
        let mut credentials = BTreeMap::new();
        let mut state = self.write();
        for party in preset_parties() {
            let party_id = self.party_id_for(&party.raw_ledger_name);
            let user_id = format!("{}-user", party.id);
            state.parties.insert(party_id.clone());
            let rights = state.users.entry(user_id.clone()).or_default();
            rights.act_as.insert(party_id.clone());
            rights.read_as.insert(party_id.clone());
            credentials.insert(party.id.clone(), PartyCredential::new(party_id, user_id, ""));
        }
        credentials
    }

    /// Allocate a party outside the wire protocol.
    pub fn allocate(&self, hint: &str) -> LedgerResult<String> {
        self.allocate_party(hint).map_err(LedgerError::from)
    }

    /// Concrete package id of the freelance templates.
    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Number of requests received, including failed ones.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Answer every request to `endpoint` with `status` until cleared.
    pub fn fail_endpoint(&self, endpoint: &str, status: u16, body: &str) {
        self.write()
            .failures
            .insert(endpoint.to_string(), (status, body.to_string()));
    }

    pub fn clear_failures(&self) {
        self.write().failures.clear();
    }

    pub fn active_contract_count(&self) -> usize {
        self.read().contracts.len()
    }

    pub fn offset(&self) -> i64 {
        self.read().offset
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SandboxState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SandboxState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn party_id_for(&self, hint: &str) -> String {
        format!("{hint}::{}", self.namespace)
    }

    fn template_id(&self, template: Template) -> String {
        format!("{}:{TEMPLATE_MODULE}:{}", self.package_id, template.entity_name())
    }

    fn allocate_party(&self, hint: &str) -> Result<String, Rejection> {
        if hint.is_empty()
            || !hint
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Rejection::malformed(format!("invalid party id hint `{hint}`")));
        }
        let party_id = self.party_id_for(hint);
        let mut state = self.write();
        if !state.parties.insert(party_id.clone()) {
            return Err(Rejection::conflict(
                "PARTY_ALREADY_EXISTS",
                format!("party {party_id} already allocated"),
            ));
        }
        debug!(party = %party_id, "sandbox allocated party");
        Ok(party_id)
    }

    fn handle_parties(&self, body: &Value) -> Result<Value, Rejection> {
        let hint = body.get("partyIdHint").and_then(Value::as_str).unwrap_or_default();
        let party = self.allocate_party(hint)?;
        Ok(json!({
            "partyDetails": {
                "party": party,
                "isLocal": true,
                "localMetadata": { "resourceVersion": "0", "annotations": {} },
                "identityProviderId": ""
            }
        }))
    }

    fn handle_users(&self, body: &Value) -> Result<Value, Rejection> {
        let user = body.get("user").ok_or_else(|| Rejection::malformed("missing user"))?;
        let user_id = user
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Rejection::malformed("missing user id"))?;

        let mut rights = UserRights::default();
        for right in body.get("rights").and_then(Value::as_array).into_iter().flatten() {
            let kind = right.get("kind");
            if let Some(p) = kind.and_then(|k| k.pointer("/CanActAs/value/party")).and_then(Value::as_str) {
                rights.act_as.insert(p.to_string());
            }
            if let Some(p) = kind.and_then(|k| k.pointer("/CanReadAs/value/party")).and_then(Value::as_str) {
                rights.read_as.insert(p.to_string());
            }
        }

        let mut state = self.write();
        if let Some(unknown) = rights
            .act_as
            .iter()
            .chain(&rights.read_as)
            .find(|p| !state.parties.contains(*p))
        {
            return Err(Rejection::not_found(
                "PARTY_NOT_KNOWN_ON_LEDGER",
                format!("party {unknown} is not allocated"),
            ));
        }
        if state.users.contains_key(user_id) {
            return Err(Rejection::conflict(
                "USER_ALREADY_EXISTS",
                format!("user {user_id} already exists"),
            ));
        }
        state.users.insert(user_id.to_string(), rights);
        Ok(json!({ "user": user }))
    }

    fn handle_query(&self, body: &Value) -> Result<Value, Rejection> {
        let requested: Vec<&String> = body
            .pointer("/filter/filtersByParty")
            .and_then(Value::as_object)
            .map(|filters| filters.keys().collect())
            .unwrap_or_default();

        let state = self.read();
        if let Some(at) = body.get("activeAtOffset").and_then(Value::as_i64) {
            if at > state.offset {
                return Err(Rejection::malformed(format!(
                    "activeAtOffset {at} is beyond ledger end {}",
                    state.offset
                )));
            }
        }

        let entries: Vec<Value> = state
            .contracts
            .iter()
            .filter(|c| requested.iter().any(|p| c.is_stakeholder(p)))
            .map(|c| {
                json!({
                    "workflowId": "",
                    "contractEntry": {
                        "JsActiveContract": {
                            "createdEvent": self.created_event(c),
                            "synchronizerId": "sandbox::local",
                            "reassignmentCounter": 0
                        }
                    }
                })
            })
            .collect();
        Ok(Value::Array(entries))
    }

    fn handle_submit(&self, body: &Value, with_transaction: bool) -> Result<Value, Rejection> {
        let envelope = if with_transaction {
            body.get("commands")
                .filter(|c| c.is_object())
                .ok_or_else(|| Rejection::malformed("missing commands envelope"))?
        } else {
            body
        };

        let command_id = envelope
            .get("commandId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Rejection::malformed("missing commandId"))?;
        let user_id = envelope.get("userId").and_then(Value::as_str).unwrap_or_default();
        let workflow_id = envelope.get("workflowId").and_then(Value::as_str).unwrap_or_default();
        let act_as: Vec<String> = envelope
            .get("actAs")
            .and_then(Value::as_array)
            .map(|parties| parties.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let commands = envelope
            .get("commands")
            .and_then(Value::as_array)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Rejection::malformed("no commands submitted"))?;

        let mut state = self.write();
        if state.command_ids.contains(command_id) {
            return Err(Rejection::conflict(
                "DUPLICATE_COMMAND",
                format!("command {command_id} was already submitted"),
            ));
        }
        let rights = state
            .users
            .get(user_id)
            .ok_or_else(|| Rejection::unauthorized(format!("unknown user {user_id}")))?;
        if act_as.is_empty() {
            return Err(Rejection::malformed("actAs must name at least one party"));
        }
        if let Some(party) = act_as.iter().find(|p| !rights.act_as.contains(*p)) {
            return Err(Rejection::unauthorized(format!(
                "user {user_id} has no right to act as {party}"
            )));
        }
        let read_as = envelope.get("readAs").and_then(Value::as_array).into_iter().flatten();
        if let Some(party) = read_as
            .filter_map(Value::as_str)
            .find(|p| !rights.read_as.contains(*p) && !rights.act_as.contains(*p))
        {
            return Err(Rejection::unauthorized(format!(
                "user {user_id} has no right to read as {party}"
            )));
        }

        // Work on a copy so a failing command leaves the ledger untouched.
        let offset = state.offset + 1;
        let mut active = state.contracts.clone();
        let mut events = Vec::new();
        for (index, command) in commands.iter().enumerate() {
            let created = if let Some(create) = command.get("CreateCommand") {
                let template = self.resolve_template(create)?;
                let args = create
                    .get("createArguments")
                    .and_then(Value::as_object)
                    .ok_or_else(|| Rejection::malformed("createArguments must be an object"))?;
                vec![rules::create(template, args, &act_as)?]
            } else if let Some(exercise) = command.get("ExerciseCommand") {
                let template = self.resolve_template(exercise)?;
                let contract_id = exercise.get("contractId").and_then(Value::as_str).unwrap_or_default();
                let choice = exercise.get("choice").and_then(Value::as_str).unwrap_or_default();
                let argument = exercise.get("choiceArgument").cloned().unwrap_or(Value::Null);

                let position = active
                    .iter()
                    .position(|c| c.contract_id == contract_id)
                    .ok_or_else(|| {
                        Rejection::not_found(
                            "CONTRACT_NOT_FOUND",
                            format!("contract {contract_id} is not active"),
                        )
                    })?;
                if active[position].template != template {
                    return Err(Rejection::malformed(format!(
                        "contract {contract_id} is not a {template}"
                    )));
                }
                let created = rules::exercise(&active[position], choice, &argument, &act_as)?;
                let archived = active.remove(position);
                events.push(json!({
                    "ArchivedEvent": {
                        "offset": offset,
                        "contractId": archived.contract_id,
                        "templateId": self.template_id(archived.template),
                        "witnessParties": act_as,
                    }
                }));
                created
            } else {
                return Err(Rejection::malformed("command is neither a create nor an exercise"));
            };

            for (n, new) in created.into_iter().enumerate() {
                let contract = self.activate(new, command_id, offset, index, n);
                events.push(json!({ "CreatedEvent": self.created_event(&contract) }));
                active.push(contract);
            }
        }

        state.contracts = active;
        state.offset = offset;
        state.command_ids.insert(command_id.to_string());
        let update_id = format!(
            "1220{}",
            hex::encode(blake3::hash(format!("{offset}:{command_id}").as_bytes()).as_bytes())
        );
        debug!(command_id, offset, events = events.len(), "sandbox committed transaction");

        if with_transaction {
            Ok(json!({
                "transaction": {
                    "updateId": update_id,
                    "commandId": command_id,
                    "workflowId": workflow_id,
                    "offset": offset,
                    "events": events,
                    "synchronizerId": "sandbox::local"
                }
            }))
        } else {
            Ok(json!({ "updateId": update_id, "completionOffset": offset }))
        }
    }

    fn resolve_template(&self, command: &Value) -> Result<Template, Rejection> {
        let template_id = command.get("templateId").and_then(Value::as_str).unwrap_or_default();
        Template::from_template_id(template_id).ok_or_else(|| {
            Rejection::not_found("TEMPLATES_OR_INTERFACES_NOT_FOUND", format!("unknown template {template_id}"))
        })
    }

    fn activate(&self, new: NewContract, command_id: &str, offset: i64, command: usize, n: usize) -> ActiveContract {
        let digest = blake3::hash(format!("{command_id}:{offset}:{command}:{n}").as_bytes());
        let NewContract {
            template,
            arguments,
            signatories,
            observers,
        } = new;
        ActiveContract {
            contract_id: format!("00{}", hex::encode(digest.as_bytes())),
            template,
            arguments,
            signatories,
            observers,
            created_at: offset,
        }
    }

    fn created_event(&self, contract: &ActiveContract) -> Value {
        json!({
            "offset": contract.created_at,
            "nodeId": 0,
            "contractId": contract.contract_id,
            "templateId": self.template_id(contract.template),
            "createArgument": Value::Object(contract.arguments.clone()),
            "createdEventBlob": "",
            "interfaceViews": [],
            "witnessParties": contract.signatories,
            "signatories": contract.signatories,
            "observers": contract.observers,
            "packageName": "cantonlance"
        })
    }

    fn route(&self, request: &LedgerRequest) -> Result<Value, Rejection> {
        let body = request.body.as_ref().unwrap_or(&Value::Null);
        match (request.method, request.endpoint) {
            (HttpMethod::Get, endpoints::LEDGER_END) => Ok(json!({ "offset": self.read().offset })),
            (HttpMethod::Get, endpoints::PACKAGES) => Ok(json!({ "packageIds": [self.package_id] })),
            (HttpMethod::Post, endpoints::ACTIVE_CONTRACTS) => self.handle_query(body),
            (HttpMethod::Post, endpoints::SUBMIT_AND_WAIT) => self.handle_submit(body, false),
            (HttpMethod::Post, endpoints::SUBMIT_AND_WAIT_FOR_TRANSACTION) => self.handle_submit(body, true),
            (HttpMethod::Post, endpoints::PARTIES) => self.handle_parties(body),
            (HttpMethod::Post, endpoints::USERS) => self.handle_users(body),
            (method, endpoint) => Err(Rejection::not_found(
                "NOT_FOUND",
                format!("no route for {method} {endpoint}"),
            )),
        }
    }
}

impl Default for SandboxLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerTransport for SandboxLedger {
    async fn send(&self, request: LedgerRequest) -> LedgerResult<Value> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let injected = self.read().failures.get(request.endpoint).cloned();
        if let Some((status, body)) = injected {
            return Err(LedgerError::Transport { status, body });
        }
        self.route(&request).map_err(LedgerError::from)
    }
}
