//! Freelance template rules: stakeholders, controllers, and choice effects.

use chrono::Utc;
use serde_json::{json, Map, Value};

use lance_types::numeric::{parse_count, parse_decimal};
use lance_types::MAX_MILESTONES;

use crate::commands::Template;
use crate::error::LedgerError;

/// A command rejected by the sandbox, reported the way a ledger would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rejection {
    pub status: u16,
    pub code: &'static str,
    pub cause: String,
}

impl Rejection {
    pub fn invalid(cause: impl Into<String>) -> Self {
        Self {
            status: 400,
            code: "DAML_INTERPRETATION_ERROR",
            cause: cause.into(),
        }
    }

    pub fn malformed(cause: impl Into<String>) -> Self {
        Self {
            status: 400,
            code: "INVALID_ARGUMENT",
            cause: cause.into(),
        }
    }

    pub fn unauthorized(cause: impl Into<String>) -> Self {
        Self {
            status: 403,
            code: "DAML_AUTHORIZATION_ERROR",
            cause: cause.into(),
        }
    }

    pub fn not_found(code: &'static str, cause: impl Into<String>) -> Self {
        Self {
            status: 404,
            code,
            cause: cause.into(),
        }
    }

    pub fn conflict(code: &'static str, cause: impl Into<String>) -> Self {
        Self {
            status: 409,
            code,
            cause: cause.into(),
        }
    }
}

impl From<Rejection> for LedgerError {
    fn from(r: Rejection) -> Self {
        LedgerError::Transport {
            status: r.status,
            body: json!({ "code": r.code, "cause": r.cause }).to_string(),
        }
    }
}

/// A contract about to be created, with its stakeholders resolved.
#[derive(Debug, Clone)]
pub(crate) struct NewContract {
    pub template: Template,
    pub arguments: Map<String, Value>,
    pub signatories: Vec<String>,
    pub observers: Vec<String>,
}

/// A contract in the active set.
#[derive(Debug, Clone)]
pub(crate) struct ActiveContract {
    pub contract_id: String,
    pub template: Template,
    pub arguments: Map<String, Value>,
    pub signatories: Vec<String>,
    pub observers: Vec<String>,
    pub created_at: i64,
}

impl ActiveContract {
    pub fn is_stakeholder(&self, party: &str) -> bool {
        self.signatories.iter().chain(&self.observers).any(|p| p == party)
    }
}

pub(crate) fn numeric(value: f64) -> Value {
    Value::String(format!("{value:.10}"))
}

fn int(value: u32) -> Value {
    Value::String(value.to_string())
}

fn party(args: &Map<String, Value>, field: &str) -> Result<String, Rejection> {
    args.get(field)
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Rejection::malformed(format!("missing party field `{field}`")))
}

fn text(args: &Map<String, Value>, field: &str) -> String {
    args.get(field).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn require(condition: bool, cause: &str) -> Result<(), Rejection> {
    if condition {
        Ok(())
    } else {
        Err(Rejection::invalid(format!("Template precondition violated: {cause}")))
    }
}

fn authorize(act_as: &[String], required: &[&str], what: &str) -> Result<(), Rejection> {
    for party in required {
        if !act_as.iter().any(|a| a == party) {
            return Err(Rejection::unauthorized(format!(
                "{what} requires authorization from {party}"
            )));
        }
    }
    Ok(())
}

/// Validate a create command and normalise its arguments.
pub(crate) fn create(
    template: Template,
    args: &Map<String, Value>,
    act_as: &[String],
) -> Result<NewContract, Rejection> {
    let new = match template {
        Template::ProjectProposal => {
            let client = party(args, "client")?;
            let freelancer = party(args, "freelancer")?;
            let rate = parse_decimal(args.get("hourlyRate"));
            let budget = parse_decimal(args.get("totalBudget"));
            let milestones = parse_count(args.get("milestonesTotal"));
            require(rate > 0.0, "hourlyRate > 0")?;
            require(budget > 0.0, "totalBudget > 0")?;
            require(
                (1..=MAX_MILESTONES).contains(&milestones),
                "milestonesTotal within bounds",
            )?;

            let mut arguments = Map::new();
            arguments.insert("client".into(), Value::String(client.clone()));
            arguments.insert("freelancer".into(), Value::String(freelancer.clone()));
            arguments.insert("description".into(), Value::String(text(args, "description")));
            arguments.insert("hourlyRate".into(), numeric(rate));
            arguments.insert("totalBudget".into(), numeric(budget));
            arguments.insert("milestonesTotal".into(), int(milestones));
            NewContract {
                template,
                arguments,
                signatories: vec![client],
                observers: vec![freelancer],
            }
        }
        Template::ProjectContract => {
            let client = party(args, "client")?;
            let freelancer = party(args, "freelancer")?;
            NewContract {
                template,
                arguments: args.clone(),
                signatories: vec![client, freelancer],
                observers: Vec::new(),
            }
        }
        Template::PaymentRecord => {
            let client = party(args, "client")?;
            let freelancer = party(args, "freelancer")?;
            require(parse_decimal(args.get("amount")) > 0.0, "amount > 0")?;
            NewContract {
                template,
                arguments: args.clone(),
                signatories: vec![client],
                observers: vec![freelancer],
            }
        }
        Template::AuditSummary => {
            let client = party(args, "client")?;
            let auditor = party(args, "auditor")?;
            let paid = parse_decimal(args.get("totalAmountPaid"));
            require(paid >= 0.0, "totalAmountPaid >= 0")?;

            let mut arguments = Map::new();
            arguments.insert("client".into(), Value::String(client.clone()));
            arguments.insert("auditor".into(), Value::String(auditor.clone()));
            arguments.insert(
                "totalContractsCount".into(),
                int(parse_count(args.get("totalContractsCount"))),
            );
            arguments.insert("totalAmountPaid".into(), numeric(paid));
            arguments.insert("reportPeriod".into(), Value::String(text(args, "reportPeriod")));
            NewContract {
                template,
                arguments,
                signatories: vec![client],
                observers: vec![auditor],
            }
        }
    };

    let signatories: Vec<&str> = new.signatories.iter().map(String::as_str).collect();
    authorize(act_as, &signatories, &format!("create of {template}"))?;
    Ok(new)
}

/// Exercise a consuming choice and return the contracts it creates, in
/// emission order. The exercised contract is always archived.
pub(crate) fn exercise(
    contract: &ActiveContract,
    choice: &str,
    argument: &Value,
    act_as: &[String],
) -> Result<Vec<NewContract>, Rejection> {
    let args = &contract.arguments;
    match (contract.template, choice) {
        (_, "Archive") => {
            let signatories: Vec<&str> = contract.signatories.iter().map(String::as_str).collect();
            authorize(act_as, &signatories, "Archive")?;
            Ok(Vec::new())
        }
        (Template::ProjectProposal, "AcceptProposal") => {
            let client = party(args, "client")?;
            let freelancer = party(args, "freelancer")?;
            authorize(act_as, &[freelancer.as_str()], choice)?;

            let mut terms = args.clone();
            terms.insert("milestonesCompleted".into(), int(0));
            terms.insert("amountPaid".into(), numeric(0.0));
            terms.insert("status".into(), Value::String("Active".into()));
            terms.insert("milestonePending".into(), Value::Bool(false));
            Ok(vec![NewContract {
                template: Template::ProjectContract,
                arguments: terms,
                signatories: vec![client, freelancer],
                observers: Vec::new(),
            }])
        }
        (Template::ProjectProposal, "RejectProposal") => {
            let freelancer = party(args, "freelancer")?;
            authorize(act_as, &[freelancer.as_str()], choice)?;
            Ok(Vec::new())
        }
        (Template::ProjectContract, "SubmitMilestone") => {
            let freelancer = party(args, "freelancer")?;
            authorize(act_as, &[freelancer.as_str()], choice)?;
            let completed = parse_count(args.get("milestonesCompleted"));
            let total = parse_count(args.get("milestonesTotal"));
            require(text(args, "status") == "Active", "contract is Active")?;
            require(!pending(args), "no milestone already awaiting approval")?;
            require(completed < total, "milestones remain")?;

            Ok(vec![successor(contract, |next| {
                next.insert("milestonePending".into(), Value::Bool(true));
            })])
        }
        (Template::ProjectContract, "ApproveMilestone") => {
            let client = party(args, "client")?;
            let freelancer = party(args, "freelancer")?;
            authorize(act_as, &[client.as_str()], choice)?;

            let payment = parse_decimal(argument.get("milestonePayment"));
            let paid = parse_decimal(args.get("amountPaid"));
            let budget = parse_decimal(args.get("totalBudget"));
            let completed = parse_count(args.get("milestonesCompleted"));
            let total = parse_count(args.get("milestonesTotal"));
            require(pending(args), "a milestone is awaiting approval")?;
            require(payment > 0.0, "milestonePayment > 0")?;
            require(paid + payment <= budget + 1e-9, "payment within remaining budget")?;

            let number = completed + 1;
            let mut record = Map::new();
            record.insert("client".into(), Value::String(client.clone()));
            record.insert("freelancer".into(), Value::String(freelancer.clone()));
            record.insert("amount".into(), numeric(payment));
            record.insert("milestoneNumber".into(), int(number));
            record.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
            record.insert("projectDescription".into(), Value::String(text(args, "description")));
            let payment_record = NewContract {
                template: Template::PaymentRecord,
                arguments: record,
                signatories: vec![client],
                observers: vec![freelancer],
            };

            let next = successor(contract, |next| {
                next.insert("milestonesCompleted".into(), int(number));
                next.insert("amountPaid".into(), numeric(paid + payment));
                next.insert("milestonePending".into(), Value::Bool(false));
                if number >= total {
                    next.insert("status".into(), Value::String("Completed".into()));
                }
            });
            Ok(vec![payment_record, next])
        }
        (Template::ProjectContract, "RejectMilestone") => {
            let client = party(args, "client")?;
            authorize(act_as, &[client.as_str()], choice)?;
            require(pending(args), "a milestone is awaiting approval")?;
            Ok(vec![successor(contract, |next| {
                next.insert("milestonePending".into(), Value::Bool(false));
            })])
        }
        (Template::ProjectContract, "CancelContract") => {
            let client = party(args, "client")?;
            authorize(act_as, &[client.as_str()], choice)?;
            Ok(Vec::new())
        }
        (template, _) => Err(Rejection::malformed(format!(
            "unknown choice {choice} on template {template}"
        ))),
    }
}

fn pending(args: &Map<String, Value>) -> bool {
    args.get("milestonePending").and_then(Value::as_bool).unwrap_or(false)
}

fn successor(contract: &ActiveContract, update: impl FnOnce(&mut Map<String, Value>)) -> NewContract {
    let mut arguments = contract.arguments.clone();
    update(&mut arguments);
    NewContract {
        template: contract.template,
        arguments,
        signatories: contract.signatories.clone(),
        observers: contract.observers.clone(),
    }
}
