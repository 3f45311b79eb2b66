//! Decoding of active-contract query responses into domain records.

use lance_types::numeric::{parse_count, parse_decimal, parse_text};
use lance_types::{AuditSummary, Contract, ContractRef, ContractStatus, Payment, Proposal, VisibleState};
use serde_json::{Map, Value};
use tracing::debug;

use crate::commands::{package_id_of, Template};
use crate::error::DecodeError;

/// Result of decoding one active-contract response.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedSnapshot {
    pub state: VisibleState,
    /// Number of entries in the raw response.
    pub entry_count: usize,
    /// Concrete package id of the first freelance template seen, if any.
    pub package_id: Option<String>,
    /// Entries dropped because they were malformed.
    pub skipped: usize,
}

/// One decoded record, before it is sorted into a [`VisibleState`].
enum Record {
    Proposal(Proposal),
    Contract(Contract),
    Payment(Payment),
    Audit(AuditSummary),
}

/// Decode an `/v2/state/active-contracts` response.
///
/// A response that is not an array decodes as empty. Entries of templates
/// outside the freelance module are ignored, and malformed entries are
/// skipped without failing the rest of the response.
pub fn decode_active_contracts(response: &Value) -> DecodedSnapshot {
    let entries = response.as_array().map(Vec::as_slice).unwrap_or_default();
    let mut snapshot = DecodedSnapshot {
        entry_count: entries.len(),
        ..DecodedSnapshot::default()
    };

    for entry in entries {
        let event = match created_event(entry) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "skipping active-contract entry");
                snapshot.skipped += 1;
                continue;
            }
        };

        let template_id = event.get("templateId").and_then(Value::as_str).unwrap_or_default();
        if snapshot.package_id.is_none() {
            snapshot.package_id = package_id_of(template_id).map(str::to_string);
        }

        let Some(template) = Template::from_template_id(template_id) else {
            continue;
        };

        match decode_record(template, event) {
            Ok(Record::Proposal(p)) => snapshot.state.proposals.push(p),
            Ok(Record::Contract(c)) => snapshot.state.contracts.push(c),
            Ok(Record::Payment(p)) => snapshot.state.payments.push(p),
            Ok(Record::Audit(a)) => snapshot.state.audit_summaries.push(a),
            Err(e) => {
                debug!(error = %e, template = %template, "skipping malformed record");
                snapshot.skipped += 1;
            }
        }
    }

    snapshot
}

fn created_event(entry: &Value) -> Result<&Value, DecodeError> {
    let active = entry
        .get("contractEntry")
        .and_then(|c| c.get("JsActiveContract"))
        .ok_or(DecodeError::MissingActiveContract)?;
    active.get("createdEvent").ok_or(DecodeError::MissingCreatedEvent)
}

fn decode_record(template: Template, event: &Value) -> Result<Record, DecodeError> {
    let contract_ref = event
        .get("contractId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(ContractRef::new)
        .ok_or(DecodeError::MissingContractId)?;

    let empty = Map::new();
    let args = match event.get("createArgument") {
        Some(Value::Object(map)) => map,
        None | Some(Value::Null) => &empty,
        Some(_) => {
            return Err(DecodeError::InvalidArgument {
                template: template.entity_name().to_string(),
            })
        }
    };

    let record = match template {
        Template::ProjectProposal => Record::Proposal(Proposal {
            contract_ref,
            client: parse_text(args.get("client")),
            freelancer: parse_text(args.get("freelancer")),
            description: parse_text(args.get("description")),
            hourly_rate: parse_decimal(args.get("hourlyRate")),
            total_budget: parse_decimal(args.get("totalBudget")),
            milestones_total: parse_count(args.get("milestonesTotal")),
        }),
        Template::ProjectContract => Record::Contract(Contract {
            contract_ref,
            client: parse_text(args.get("client")),
            freelancer: parse_text(args.get("freelancer")),
            description: parse_text(args.get("description")),
            hourly_rate: parse_decimal(args.get("hourlyRate")),
            total_budget: parse_decimal(args.get("totalBudget")),
            milestones_total: parse_count(args.get("milestonesTotal")),
            milestones_completed: parse_count(args.get("milestonesCompleted")),
            amount_paid: parse_decimal(args.get("amountPaid")),
            status: parse_status(args.get("status")),
            milestone_pending: parse_flag(args.get("milestonePending")),
        }),
        Template::PaymentRecord => Record::Payment(Payment {
            contract_ref,
            client: parse_text(args.get("client")),
            freelancer: parse_text(args.get("freelancer")),
            amount: parse_decimal(args.get("amount")),
            milestone_number: parse_count(args.get("milestoneNumber")),
            timestamp: parse_text(args.get("timestamp")),
            project_description: parse_text(args.get("projectDescription")),
        }),
        Template::AuditSummary => Record::Audit(AuditSummary {
            contract_ref,
            client: parse_text(args.get("client")),
            auditor: parse_text(args.get("auditor")),
            total_contracts_count: parse_count(args.get("totalContractsCount")),
            total_amount_paid: parse_decimal(args.get("totalAmountPaid")),
            report_period: parse_text(args.get("reportPeriod")),
        }),
    };
    Ok(record)
}

// Enum payloads arrive either as a bare constructor name or as `{"tag": ..}`.
fn parse_status(value: Option<&Value>) -> ContractStatus {
    match value {
        Some(Value::String(s)) => ContractStatus::from_ledger(s),
        Some(Value::Object(map)) => map
            .get("tag")
            .and_then(Value::as_str)
            .map(ContractStatus::from_ledger)
            .unwrap_or(ContractStatus::Active),
        _ => ContractStatus::Active,
    }
}

fn parse_flag(value: Option<&Value>) -> Option<bool> {
    match value {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => match s.as_str() {
            "true" | "True" => Some(true),
            "false" | "False" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
