//! ridership-runner: headless runner for the ridership analytics core.
//!
//! Usage:
//!   ridership-runner --db ridership.db import-realized counts.csv
//!   ridership-runner --db ridership.db import-predicted schedule.csv
//!   ridership-runner --db ridership.db summary --start 2024-01-01 --end 2024-01-31
//!   ridership-runner --db ridership.db ledger [--start 2024-01-01 --end 2024-03-31]
//!   ridership-runner --db ridership.db export --group 1 --start 2024-01-01 --end 2024-01-31 [--daily] [--out rows.csv]
//!   ridership-runner --db ridership.db --ipc-mode

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Weekday};
use ridership_core::{
    config::AnalyticsConfig,
    error::{RidershipError, RidershipResult},
    export::ExportRow,
    group_registry::MembershipAction,
    ingest::{parse_export, ImportKind},
    session::Session,
    store::RidershipDb,
    types::{parse_iso_date, ActionId, Actor, DateRange, GroupId, UserId},
};
use serde_json::{json, Value};
use std::env;
use std::io::{self, BufRead, Write};

type DbSession = Session<RidershipDb>;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Refresh {
        start: String,
        end:   String,
    },
    GetDashboard,
    ListGroups,
    SelectGroup {
        group_id: Option<GroupId>,
    },
    GroupTable,
    LineAvailability,
    CreateGroup {
        name: String,
    },
    RenameGroup {
        group_id: GroupId,
        name:     String,
    },
    DeleteGroup {
        group_id: GroupId,
    },
    SetMembership {
        group_id:  GroupId,
        line_code: String,
        action:    MembershipAction,
    },
    ListActions {
        line_code: String,
    },
    AddAction {
        line_code:           String,
        comment:             String,
        implementation_date: Option<String>,
        author_id:           Option<UserId>,
    },
    UpdateConclusion {
        action_id: ActionId,
        text:      String,
    },
    DeleteAction {
        action_id: ActionId,
        actor:     Actor,
    },
    LineImpact {
        line_code: String,
        base_date: Option<String>,
        window:    Option<i64>,
    },
    SystemImpact {
        base_date: Option<String>,
        window:    Option<i64>,
    },
    ComparativeImpact {
        line_code: String,
        base_date: Option<String>,
        window:    Option<i64>,
    },
    ActionImpact {
        action_id: ActionId,
        window:    Option<i64>,
    },
    ImpactLedger {
        start: Option<String>,
        end:   Option<String>,
    },
    LineDetail {
        line_code: String,
        weekday:   Option<String>,
    },
    CompanyDetail {
        company: String,
    },
    ExportGroup {
        group_id: GroupId,
        start:    String,
        end:      String,
        #[serde(default)]
        daily:    bool,
    },
    Wipe {
        actor: Actor,
    },
    Quit,
}

const COMMANDS: &[&str] = &["import-realized", "import-predicted", "summary", "ledger", "export"];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");

    let config = match AnalyticsConfig::load(data_dir) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("{e}; using default analytics config");
            AnalyticsConfig::default()
        }
    };

    let store = if db == ":memory:" {
        RidershipDb::in_memory()?
    } else {
        RidershipDb::open(db)?
    };
    store.migrate()?;
    let mut session = Session::open(config, store)?;

    if ipc_mode {
        return run_ipc_loop(&mut session);
    }

    let Some(pos) = args.iter().position(|a| COMMANDS.contains(&a.as_str())) else {
        bail!("expected one of {COMMANDS:?} or --ipc-mode");
    };
    match args[pos].as_str() {
        "import-realized" => import_file(&mut session, args.get(pos + 1), ImportKind::Realized),
        "import-predicted" => import_file(&mut session, args.get(pos + 1), ImportKind::Predicted),
        "summary" => print_summary(&mut session, &args),
        "ledger" => print_ledger(&mut session, &args),
        "export" => export(&mut session, &args),
        other => bail!("unknown command {other}"),
    }
}

// ── One-shot commands ──────────────────────────────────────────

fn import_file(session: &mut DbSession, path: Option<&String>, kind: ImportKind) -> Result<()> {
    let path = path.context("import needs a file path")?;
    let bytes = std::fs::read(path).with_context(|| format!("Cannot read {path}"))?;
    let (records, stats) = parse_export(&bytes, kind, &session.config().ingest)?;
    let written = session.import_records(&records, kind)?;

    println!("=== IMPORT {kind:?} ===");
    println!("  file:          {path}");
    println!("  rows read:     {}", stats.rows_read);
    println!("  rows excluded: {}", stats.rows_excluded);
    println!("  rows rejected: {}", stats.rows_rejected);
    println!("  rows written:  {written}");
    Ok(())
}

fn print_summary(session: &mut DbSession, args: &[String]) -> Result<()> {
    let range = required_range(args)?;
    let dashboard = session.refresh(range)?;
    let s = &dashboard.summary;

    println!("=== RIDERSHIP SUMMARY {} .. {} ===", range.start, range.end);
    println!("  predicted:   {:.0}", s.total_predicted);
    println!("  realized:    {:.0}", s.total_realized);
    println!("  diff:        {:+.0}", s.diff);
    println!("  performance: {:.1}%", s.performance);

    println!();
    println!("=== COMPANIES ===");
    for c in &dashboard.companies {
        println!(
            "  {:<24} real {:>10.0} | pred {:>10.0} | {:>6.1}% | {} lines",
            c.company,
            c.realized,
            c.predicted,
            c.performance(),
            c.line_codes.len()
        );
    }

    for (title, rows) in [("TOP GAINS", &dashboard.top_gains), ("TOP LOSSES", &dashboard.top_losses)] {
        println!();
        println!("=== {title} ===");
        if rows.is_empty() {
            println!("  (none)");
        }
        for r in rows {
            println!(
                "  {:<10} {:<16} {:>+10.0} ({:.1}%)",
                r.line_code,
                r.group_label(),
                r.diff,
                r.percent
            );
        }
    }
    Ok(())
}

fn print_ledger(session: &mut DbSession, args: &[String]) -> Result<()> {
    let range = optional_range(args)?;
    session.refresh_catalog()?;
    let ledger = session.impact_ledger(range.as_ref())?;

    println!("=== IMPACT LEDGER ===");
    for e in &ledger.entries {
        println!(
            "  {} {:<10} {:>10.1} -> {:>10.1} {:>+7.1}% {:<9} {}",
            e.date,
            e.line_code,
            e.avg_before,
            e.avg_after,
            e.percent,
            e.status.label(),
            e.comment
        );
    }
    let s = &ledger.summary;
    println!();
    println!("  actions:     {}", s.total_actions);
    println!("  improved:    {}", s.improved);
    println!("  total diff:  {:+.1}", s.total_diff);
    println!("  avg percent: {:+.1}%", s.avg_percent);
    Ok(())
}

#[derive(serde::Serialize)]
struct DailyExportRow<'a> {
    date:      NaiveDate,
    line_code: &'a str,
    company:   &'a str,
    predicted: f64,
    realized:  f64,
    diff:      f64,
    percent:   f64,
}

fn export(session: &mut DbSession, args: &[String]) -> Result<()> {
    let range = required_range(args)?;
    let group_id: GroupId = flag_value(args, "--group")
        .context("export needs --group")?
        .parse()
        .context("--group must be a number")?;
    session.refresh_catalog()?;

    let out: Box<dyn Write> = match flag_value(args, "--out") {
        Some(path) => Box::new(std::fs::File::create(path).with_context(|| format!("Cannot create {path}"))?),
        None => Box::new(io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(out);

    if args.iter().any(|a| a == "--daily") {
        for (date, rows) in session.export_group_daily(group_id, &range)? {
            for r in &rows {
                writer.serialize(daily_row(date, r))?;
            }
        }
    } else {
        for row in session.export_group(group_id, &range)? {
            writer.serialize(row)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn daily_row(date: NaiveDate, r: &ExportRow) -> DailyExportRow<'_> {
    DailyExportRow {
        date,
        line_code: &r.line_code,
        company:   &r.company,
        predicted: r.predicted,
        realized:  r.realized,
        diff:      r.diff,
        percent:   r.percent,
    }
}

// ── IPC ────────────────────────────────────────────────────────

/// One JSON command per line on stdin, one JSON response per line on
/// stdout. Commands are handled strictly in order.
fn run_ipc_loop(session: &mut DbSession) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Unreadable command: {e}");
                let err_json = json!({ "error": e.to_string(), "kind": "validation" });
                writeln!(stdout, "{err_json}")?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let response = match handle_command(session, cmd) {
            Ok(value) => value,
            Err(e) => json!({ "error": e.to_string(), "kind": e.kind() }),
        };
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(session: &mut DbSession, cmd: IpcCommand) -> RidershipResult<Value> {
    let value = match cmd {
        IpcCommand::Refresh { start, end } => {
            let range = DateRange::parse(&start, &end)?;
            serde_json::to_value(session.refresh(range)?)?
        }
        IpcCommand::GetDashboard => serde_json::to_value(session.dashboard())?,
        IpcCommand::ListGroups => serde_json::to_value(session.groups().groups_by_name())?,
        IpcCommand::SelectGroup { group_id } => {
            session.select_group(group_id)?;
            serde_json::to_value(session.group_table())?
        }
        IpcCommand::GroupTable => serde_json::to_value(session.group_table())?,
        IpcCommand::LineAvailability => serde_json::to_value(session.line_availability())?,
        IpcCommand::CreateGroup { name } => serde_json::to_value(session.create_group(&name)?)?,
        IpcCommand::RenameGroup { group_id, name } => {
            serde_json::to_value(session.rename_group(group_id, &name)?)?
        }
        IpcCommand::DeleteGroup { group_id } => {
            let outcome = session.delete_group(group_id)?;
            json!({ "removed": outcome.removed, "reset_selection": outcome.reset_selection })
        }
        IpcCommand::SetMembership { group_id, line_code, action } => {
            let outcome = session.set_membership(group_id, &line_code, action)?;
            json!({ "outcome": outcome })
        }
        IpcCommand::ListActions { line_code } => {
            serde_json::to_value(session.actions().list_for_line(line_code.trim()))?
        }
        IpcCommand::AddAction { line_code, comment, implementation_date, author_id } => {
            let date = optional_date(implementation_date.as_deref())?;
            serde_json::to_value(session.add_action(&line_code, &comment, date, author_id)?)?
        }
        IpcCommand::UpdateConclusion { action_id, text } => {
            serde_json::to_value(session.update_conclusion(action_id, &text)?)?
        }
        IpcCommand::DeleteAction { action_id, actor } => {
            serde_json::to_value(session.delete_action(&actor, action_id)?)?
        }
        IpcCommand::LineImpact { line_code, base_date, window } => {
            serde_json::to_value(session.line_impact(&line_code, base_date.as_deref(), window)?)?
        }
        IpcCommand::SystemImpact { base_date, window } => {
            serde_json::to_value(session.system_impact(base_date.as_deref(), window)?)?
        }
        IpcCommand::ComparativeImpact { line_code, base_date, window } => serde_json::to_value(
            session.comparative_impact(&line_code, base_date.as_deref(), window)?,
        )?,
        IpcCommand::ActionImpact { action_id, window } => {
            serde_json::to_value(session.action_impact(action_id, window)?)?
        }
        IpcCommand::ImpactLedger { start, end } => {
            let range = match (start.as_deref(), end.as_deref()) {
                (Some(s), Some(e)) => Some(DateRange::parse(s, e)?),
                (None, None) => None,
                _ => return Err(RidershipError::validation("ledger range needs both start and end")),
            };
            serde_json::to_value(session.impact_ledger(range.as_ref())?)?
        }
        IpcCommand::LineDetail { line_code, weekday } => {
            let weekday = weekday
                .as_deref()
                .map(|w| {
                    w.parse::<Weekday>()
                        .map_err(|_| RidershipError::validation(format!("invalid weekday '{w}'")))
                })
                .transpose()?;
            serde_json::to_value(session.line_detail(&line_code, weekday)?)?
        }
        IpcCommand::CompanyDetail { company } => serde_json::to_value(session.company_detail(&company)?)?,
        IpcCommand::ExportGroup { group_id, start, end, daily } => {
            let range = DateRange::parse(&start, &end)?;
            if daily {
                serde_json::to_value(session.export_group_daily(group_id, &range)?)?
            } else {
                serde_json::to_value(session.export_group(group_id, &range)?)?
            }
        }
        IpcCommand::Wipe { actor } => json!({ "removed": session.wipe(&actor)? }),
        IpcCommand::Quit => Value::Null,
    };
    Ok(value)
}

// ── Argument helpers ───────────────────────────────────────────

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn optional_range(args: &[String]) -> Result<Option<DateRange>> {
    match (flag_value(args, "--start"), flag_value(args, "--end")) {
        (Some(start), Some(end)) => Ok(Some(DateRange::parse(start, end)?)),
        (None, None) => Ok(None),
        _ => bail!("--start and --end must be given together"),
    }
}

fn required_range(args: &[String]) -> Result<DateRange> {
    optional_range(args)?.context("--start and --end are required")
}

fn optional_date(raw: Option<&str>) -> RidershipResult<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Ok(Some(parse_iso_date(s)?)),
        None => Ok(None),
    }
}
