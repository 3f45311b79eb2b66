use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use lance_env::{EnvironmentKey, EnvironmentRegistry, SessionSettings};
use lance_identity::{IdentityRegistry, JsonFileIdentityStore};
use lance_session::{HttpConnector, Notice, NoticeLevel, Session};
use lance_types::numeric::encode_decimal;
use lance_types::{ContractRef, ProposalTerms, RoleCategory, VisibleState};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let settings = SessionSettings::load(&cli.config)
        .with_context(|| format!("reading settings from {}", cli.config.display()))?;
    let environments = EnvironmentRegistry::discover(&settings.config_dir);

    if let Command::Envs = cli.command {
        return cmd_envs(&settings, &environments);
    }

    let identities = IdentityRegistry::new(Arc::new(JsonFileIdentityStore::new(&settings.data_dir)));
    let session = Session::connect(settings, environments, identities, Arc::new(HttpConnector))?;
    if !session.is_connected() {
        bail!(
            "no environment configured under {}; expected local-config.json or devnet-config.json",
            session.settings().config_dir.display()
        );
    }
    // Switching reloads the snapshot; otherwise load it once here.
    let mut loaded = false;
    if let Some(env) = &cli.env {
        let key: EnvironmentKey = env.parse()?;
        session.switch_environment(key).await?;
        loaded = true;
    }
    if let Some(id) = &cli.identity {
        session.switch_identity(id).await?;
        loaded = true;
    }
    if !loaded {
        session.refresh().await?;
    }

    let result: anyhow::Result<()> = match cli.command {
        Command::Envs => Ok(()),
        Command::Parties => cmd_parties(&session),
        Command::Query => cmd_query(&session),
        Command::Propose(args) => cmd_propose(&session, args).await,
        Command::Accept(args) => {
            let r = resolve(&session, &args.contract)?;
            session.accept_proposal(&r).await.map(drop).map_err(Into::into)
        }
        Command::Reject(args) => {
            let r = resolve(&session, &args.contract)?;
            session.reject_proposal(&r).await.map(drop).map_err(Into::into)
        }
        Command::Submit(args) => {
            let r = resolve(&session, &args.contract)?;
            session.submit_milestone(&r).await.map(drop).map_err(Into::into)
        }
        Command::Approve(args) => {
            let r = resolve(&session, &args.contract)?;
            session
                .approve_milestone(&r, args.payment)
                .await
                .map(drop)
                .map_err(Into::into)
        }
        Command::RejectMilestone(args) => {
            let r = resolve(&session, &args.contract)?;
            session.reject_milestone(&r).await.map(drop).map_err(Into::into)
        }
        Command::Cancel(args) => {
            let r = resolve(&session, &args.contract)?;
            session.cancel_contract(&r).await.map(drop).map_err(Into::into)
        }
        Command::Audit(args) => session
            .generate_audit(args.period.as_deref())
            .await
            .map(drop)
            .map_err(Into::into),
        Command::CreateAccount(args) => cmd_create_account(&session, args).await,
        Command::Calls(args) => cmd_calls(&session, args),
    };

    print_notices(session.take_notices());
    result
}

fn cmd_envs(settings: &SessionSettings, environments: &EnvironmentRegistry) -> anyhow::Result<()> {
    if environments.is_empty() {
        println!("No environments configured in {}", settings.config_dir.display());
        return Ok(());
    }
    let default = environments.default_key();
    for key in environments.available_environments() {
        let Some(config) = environments.get(key) else { continue };
        let marker = if Some(key) == default { "*".green().bold() } else { " ".normal() };
        println!(
            "{} {:<7} {:<8} {} ({} parties)",
            marker,
            key.to_string().bold(),
            config.mode_label().cyan(),
            config.ledger_api_url.blue(),
            config.parties.len()
        );
    }
    Ok(())
}

fn cmd_parties(session: &Session) -> anyhow::Result<()> {
    let acting = session.context().identity;
    for party in session.identities().all() {
        let marker = if party.id == acting { "*".green().bold() } else { " ".normal() };
        let origin = if party.is_preset { "preset".dimmed() } else { "created".yellow() };
        println!(
            "{} {:<14} {:<3} {:<22} {:<10} {}",
            marker,
            party.id.bold(),
            party.avatar_glyph,
            party.display_name,
            party.role.to_string().cyan(),
            origin
        );
    }
    Ok(())
}

fn cmd_query(session: &Session) -> anyhow::Result<()> {
    let who = session
        .active_identity()
        .map(|p| p.label())
        .unwrap_or_else(|| session.context().identity);
    println!("Visible to {}", who.bold());
    print_state(&session.snapshot());
    Ok(())
}

fn print_state(state: &VisibleState) {
    if state.is_empty() {
        println!("  {}", "nothing visible".dimmed());
        return;
    }
    for p in &state.proposals {
        println!(
            "  {} {}  {}  ${}/h, budget ${}, {} milestones",
            "proposal".magenta(),
            p.contract_ref.short().yellow(),
            p.description,
            encode_decimal(p.hourly_rate),
            encode_decimal(p.total_budget),
            p.milestones_total
        );
    }
    for c in &state.contracts {
        let pending = if c.milestone_pending == Some(true) { " (milestone pending)".yellow() } else { "".normal() };
        println!(
            "  {} {}  {}  {}/{} milestones, ${} of ${} paid, {}{}",
            "contract".green(),
            c.contract_ref.short().yellow(),
            c.description,
            c.milestones_completed,
            c.milestones_total,
            encode_decimal(c.amount_paid),
            encode_decimal(c.total_budget),
            c.status,
            pending
        );
    }
    for p in &state.payments {
        println!(
            "  {} {}  ${} for milestone {} of {}",
            "payment".blue(),
            p.contract_ref.short().yellow(),
            encode_decimal(p.amount),
            p.milestone_number,
            p.project_description
        );
    }
    for a in &state.audit_summaries {
        println!(
            "  {} {}  {}: {} contracts, ${} paid",
            "audit".red(),
            a.contract_ref.short().yellow(),
            a.report_period,
            a.total_contracts_count,
            encode_decimal(a.total_amount_paid)
        );
    }
}

async fn cmd_propose(session: &Session, args: ProposeArgs) -> anyhow::Result<()> {
    let terms = ProposalTerms::new(args.description, args.rate, args.budget, args.milestones);
    let outcome = session.propose(&args.to, terms).await?;
    if let Some(created) = outcome.created {
        println!("{} Proposal {}", "✓".green().bold(), created.to_string().yellow());
    }
    Ok(())
}

async fn cmd_create_account(session: &Session, args: CreateAccountArgs) -> anyhow::Result<()> {
    let role: RoleCategory = args.role.parse()?;
    let party = session.create_identity(&args.name, role).await?;
    println!(
        "{} Created {} as {} ({})",
        "✓".green().bold(),
        party.display_name.bold(),
        party.id.yellow(),
        party.raw_ledger_name.dimmed()
    );
    Ok(())
}

fn cmd_calls(session: &Session, args: CallsArgs) -> anyhow::Result<()> {
    for call in session.api_calls().into_iter().take(args.limit) {
        let status = if call.is_error() { "✗".red().bold() } else { "✓".green() };
        println!(
            "{} {} {:<4} {:<48} {}",
            status,
            call.timestamp.dimmed(),
            call.method,
            call.endpoint.cyan(),
            call.description
        );
        if args.bodies {
            if let Some(body) = &call.request_body {
                println!("    request:  {}", serde_json::to_string(body)?);
            }
            println!("    response: {}", serde_json::to_string(&call.response_body)?);
        }
    }
    Ok(())
}

/// Accept a full contract id or a unique prefix of one in the snapshot.
fn resolve(session: &Session, input: &str) -> anyhow::Result<ContractRef> {
    let state = session.snapshot();
    let refs = state
        .proposals
        .iter()
        .map(|p| &p.contract_ref)
        .chain(state.contracts.iter().map(|c| &c.contract_ref));
    let matches: Vec<&ContractRef> = refs.filter(|r| r.as_str().starts_with(input)).collect();
    match matches.as_slice() {
        [one] => Ok((*one).clone()),
        [] => Ok(ContractRef::new(input)),
        _ => bail!("`{input}` matches {} contracts; use a longer prefix", matches.len()),
    }
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        let line = match notice.level {
            NoticeLevel::Success => notice.message.green(),
            NoticeLevel::Info => notice.message.normal(),
            NoticeLevel::Warning => notice.message.yellow(),
            NoticeLevel::Danger => notice.message.red(),
        };
        println!("{line}");
    }
}
