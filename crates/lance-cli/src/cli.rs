use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lance",
    about = "CantonLance — private freelance hiring on a multi-party ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Session settings file (TOML)
    #[arg(long, global = true, default_value = "cantonlance.toml")]
    pub config: PathBuf,

    /// Environment to use instead of the default (local, devnet)
    #[arg(long, global = true)]
    pub env: Option<String>,

    /// Identity to act as (client, freelancerA, freelancerB, auditor, or a created account)
    #[arg(long = "as", global = true)]
    pub identity: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// List configured environments
    Envs,
    /// List known identities
    Parties,
    /// Show what the acting identity can see
    Query,
    /// Propose work to a freelancer
    Propose(ProposeArgs),
    /// Accept a proposal
    Accept(ContractArgs),
    /// Reject a proposal
    Reject(ContractArgs),
    /// Submit the next milestone on a contract
    Submit(ContractArgs),
    /// Approve the pending milestone and pay for it
    Approve(ApproveArgs),
    /// Send the pending milestone back for rework
    RejectMilestone(ContractArgs),
    /// Cancel a contract
    Cancel(ContractArgs),
    /// Share contract and payment totals with the auditor
    Audit(AuditArgs),
    /// Allocate a new identity on the sandbox
    CreateAccount(CreateAccountArgs),
    /// Show recent ledger API calls
    Calls(CallsArgs),
}

#[derive(Args)]
pub struct ProposeArgs {
    /// Freelancer identity to propose to
    #[arg(long)]
    pub to: String,
    #[arg(short, long)]
    pub description: String,
    #[arg(long)]
    pub rate: f64,
    #[arg(long)]
    pub budget: f64,
    #[arg(long, default_value = "1")]
    pub milestones: u32,
}

#[derive(Args)]
pub struct ContractArgs {
    pub contract: String,
}

#[derive(Args)]
pub struct ApproveArgs {
    pub contract: String,
    #[arg(long)]
    pub payment: f64,
}

#[derive(Args)]
pub struct AuditArgs {
    /// Report period, e.g. 2026-Q1; defaults to the current quarter
    #[arg(long)]
    pub period: Option<String>,
}

#[derive(Args)]
pub struct CreateAccountArgs {
    pub name: String,
    /// client, freelancer, or auditor
    #[arg(long, default_value = "freelancer")]
    pub role: String,
}

#[derive(Args)]
pub struct CallsArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    /// Print request and response bodies
    #[arg(long)]
    pub bodies: bool,
}
