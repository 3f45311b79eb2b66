//! Command envelopes, template identifiers, and result extraction.

use std::fmt;

use lance_types::{ContractRef, PartyCredential};
use serde_json::{json, Value};
use uuid::Uuid;

/// Daml module holding the freelance templates.
pub const TEMPLATE_MODULE: &str = "Freelance";

/// Ledger templates the client knows how to create and decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Template {
    ProjectProposal,
    ProjectContract,
    PaymentRecord,
    AuditSummary,
}

impl Template {
    pub const ALL: [Template; 4] = [
        Self::ProjectProposal,
        Self::ProjectContract,
        Self::PaymentRecord,
        Self::AuditSummary,
    ];

    pub fn entity_name(&self) -> &'static str {
        match self {
            Self::ProjectProposal => "ProjectProposal",
            Self::ProjectContract => "ProjectContract",
            Self::PaymentRecord => "PaymentRecord",
            Self::AuditSummary => "AuditSummary",
        }
    }

    /// Resolve a `<package>:<module>:<entity>` template id.
    ///
    /// Only entities of [`TEMPLATE_MODULE`] are recognised; anything else is
    /// `None`.
    pub fn from_template_id(template_id: &str) -> Option<Self> {
        let (_, module, entity) = split_template_id(template_id)?;
        if module != TEMPLATE_MODULE {
            return None;
        }
        Self::ALL.into_iter().find(|t| t.entity_name() == entity)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_name())
    }
}

/// Split a template id into package, module, and entity. Module names may
/// contain dots but not colons.
pub fn split_template_id(template_id: &str) -> Option<(&str, &str, &str)> {
    let mut parts = template_id.rsplitn(3, ':');
    let entity = parts.next()?;
    let module = parts.next()?;
    let package = parts.next()?;
    Some((package, module, entity))
}

/// Package id carried by a freelance template id, if it is a concrete id
/// rather than a `#name` reference.
pub fn package_id_of(template_id: &str) -> Option<&str> {
    let (package, module, _) = split_template_id(template_id)?;
    if module != TEMPLATE_MODULE || package.is_empty() || package.starts_with('#') {
        return None;
    }
    Some(package)
}

/// Choices exercised on freelance templates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Choice {
    AcceptProposal,
    RejectProposal,
    SubmitMilestone,
    ApproveMilestone,
    RejectMilestone,
    CancelContract,
}

impl Choice {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AcceptProposal => "AcceptProposal",
            Self::RejectProposal => "RejectProposal",
            Self::SubmitMilestone => "SubmitMilestone",
            Self::ApproveMilestone => "ApproveMilestone",
            Self::RejectMilestone => "RejectMilestone",
            Self::CancelContract => "CancelContract",
        }
    }

    pub fn template(&self) -> Template {
        match self {
            Self::AcceptProposal | Self::RejectProposal => Template::ProjectProposal,
            _ => Template::ProjectContract,
        }
    }
}

/// A single create or exercise command.
#[derive(Clone, Debug, PartialEq)]
pub enum LedgerCommand {
    Create {
        template: Template,
        arguments: Value,
    },
    Exercise {
        contract_ref: ContractRef,
        choice: Choice,
        argument: Value,
    },
}

impl LedgerCommand {
    pub fn create(template: Template, arguments: Value) -> Self {
        Self::Create {
            template,
            arguments,
        }
    }

    pub fn exercise(contract_ref: &ContractRef, choice: Choice, argument: Value) -> Self {
        Self::Exercise {
            contract_ref: contract_ref.clone(),
            choice,
            argument,
        }
    }

    pub fn template(&self) -> Template {
        match self {
            Self::Create { template, .. } => *template,
            Self::Exercise { choice, .. } => choice.template(),
        }
    }

    /// Wire form, given the resolved template id for [`Self::template`].
    pub fn to_json(&self, template_id: &str) -> Value {
        match self {
            Self::Create { arguments, .. } => json!({
                "CreateCommand": {
                    "templateId": template_id,
                    "createArguments": arguments,
                }
            }),
            Self::Exercise {
                contract_ref,
                choice,
                argument,
            } => json!({
                "ExerciseCommand": {
                    "templateId": template_id,
                    "contractId": contract_ref.as_str(),
                    "choice": choice.name(),
                    "choiceArgument": argument,
                }
            }),
        }
    }
}

/// Idempotency identifiers for one submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandIds {
    pub workflow_id: String,
    pub command_id: String,
    pub submission_id: String,
}

impl CommandIds {
    /// Fresh, time-ordered identifiers. Every call yields distinct ids.
    pub fn generate(workflow: &str, intent: &str) -> Self {
        Self {
            workflow_id: format!("cantonlance-{workflow}"),
            command_id: format!("{intent}-{}", Uuid::now_v7()),
            submission_id: format!("{workflow}-{}", Uuid::now_v7()),
        }
    }
}

/// Build the `JsCommands` envelope for the acting identity.
pub fn envelope(
    commands: Vec<Value>,
    credential: &PartyCredential,
    application_id: &str,
    ids: &CommandIds,
) -> Value {
    json!({
        "commands": commands,
        "userId": credential.user_id,
        "workflowId": ids.workflow_id,
        "applicationId": application_id,
        "commandId": ids.command_id,
        "deduplicationPeriod": { "Empty": {} },
        "actAs": [credential.party_id],
        "readAs": [credential.party_id],
        "submissionId": ids.submission_id,
        "disclosedContracts": [],
        "domainId": "",
        "packageIdSelectionPreference": [],
    })
}

/// The reference produced by a submission: the last creation in its event
/// list, since a choice's result is emitted after any by-products.
///
/// Falls back to a top-level `contractId`, then to `pending-<updateId>`.
pub fn extract_created_ref(response: &Value) -> Option<ContractRef> {
    if let Some(events) = response
        .get("transaction")
        .and_then(|tx| tx.get("events"))
        .and_then(Value::as_array)
    {
        for event in events.iter().rev() {
            let created = event.get("CreatedEvent").or_else(|| event.get("created"));
            if let Some(id) = created
                .and_then(|c| c.get("contractId"))
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
            {
                return Some(ContractRef::new(id));
            }
        }
    }

    if let Some(id) = response.get("contractId").and_then(Value::as_str) {
        return Some(ContractRef::new(id));
    }
    response
        .get("updateId")
        .and_then(Value::as_str)
        .map(|update| ContractRef::new(format!("pending-{update}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_ids_resolve_by_entity() {
        assert_eq!(
            Template::from_template_id("abc123:Freelance:ProjectContract"),
            Some(Template::ProjectContract)
        );
        assert_eq!(
            Template::from_template_id("#cantonlance:Freelance:ProjectProposal"),
            Some(Template::ProjectProposal)
        );
        assert_eq!(Template::from_template_id("abc:Other:ProjectContract"), None);
        assert_eq!(Template::from_template_id("abc:Freelance:Unknown"), None);
        assert_eq!(Template::from_template_id("garbage"), None);
    }

    #[test]
    fn package_id_extraction() {
        assert_eq!(package_id_of("abc123:Freelance:AuditSummary"), Some("abc123"));
        assert_eq!(package_id_of("#pkg:Freelance:AuditSummary"), None);
        assert_eq!(package_id_of("abc:Splice.Amulet:Amulet"), None);
    }

    #[test]
    fn dotted_modules_split_correctly() {
        assert_eq!(
            split_template_id("pkg:Splice.Amulet:Amulet"),
            Some(("pkg", "Splice.Amulet", "Amulet"))
        );
    }

    #[test]
    fn choices_map_to_templates() {
        assert_eq!(Choice::AcceptProposal.template(), Template::ProjectProposal);
        assert_eq!(Choice::RejectProposal.template(), Template::ProjectProposal);
        assert_eq!(Choice::ApproveMilestone.template(), Template::ProjectContract);
        assert_eq!(Choice::CancelContract.name(), "CancelContract");
    }

    #[test]
    fn exercise_command_shape() {
        let cmd = LedgerCommand::exercise(
            &ContractRef::new("00ab"),
            Choice::ApproveMilestone,
            json!({"milestonePayment": "500"}),
        );
        let wire = cmd.to_json("pkg:Freelance:ProjectContract");
        assert_eq!(wire["ExerciseCommand"]["contractId"], "00ab");
        assert_eq!(wire["ExerciseCommand"]["choice"], "ApproveMilestone");
        assert_eq!(wire["ExerciseCommand"]["choiceArgument"]["milestonePayment"], "500");
        assert_eq!(cmd.template(), Template::ProjectContract);
    }

    #[test]
    fn envelope_names_acting_identity() {
        let cred = PartyCredential::new("Client::1220", "client-user", "");
        let ids = CommandIds::generate("proposal", "create-proposal");
        let env = envelope(vec![json!({})], &cred, "cantonlance", &ids);
        assert_eq!(env["actAs"], json!(["Client::1220"]));
        assert_eq!(env["readAs"], json!(["Client::1220"]));
        assert_eq!(env["userId"], "client-user");
        assert_eq!(env["applicationId"], "cantonlance");
        assert_eq!(env["deduplicationPeriod"], json!({"Empty": {}}));
        assert!(env["commandId"].as_str().unwrap().starts_with("create-proposal-"));
    }

    #[test]
    fn command_ids_are_unique() {
        let a = CommandIds::generate("audit", "audit-summary");
        let b = CommandIds::generate("audit", "audit-summary");
        assert_ne!(a.command_id, b.command_id);
        assert_ne!(a.submission_id, b.submission_id);
        assert_eq!(a.workflow_id, "cantonlance-audit");
    }

    #[test]
    fn extraction_prefers_last_creation() {
        let response = json!({
            "transaction": {
                "events": [
                    {"ArchivedEvent": {"contractId": "old"}},
                    {"CreatedEvent": {"contractId": "payment"}},
                    {"CreatedEvent": {"contractId": "successor"}},
                    {"ArchivedEvent": {"contractId": "other"}}
                ]
            }
        });
        assert_eq!(extract_created_ref(&response), Some(ContractRef::new("successor")));
    }

    #[test]
    fn extraction_accepts_alternate_shape_and_fallbacks() {
        let alt = json!({"transaction": {"events": [{"created": {"contractId": "x1"}}]}});
        assert_eq!(extract_created_ref(&alt), Some(ContractRef::new("x1")));

        let top = json!({"contractId": "x2"});
        assert_eq!(extract_created_ref(&top), Some(ContractRef::new("x2")));

        let pending = json!({"updateId": "u9", "completionOffset": 3});
        assert_eq!(extract_created_ref(&pending), Some(ContractRef::new("pending-u9")));

        assert_eq!(extract_created_ref(&json!({})), None);
    }
}
