use colored::*;
use tablesess_core::SessionConfig;
use tablesess_store::{GcReport, SessionData};

const REDACTED: &str = "********";

/// Print a session payload as pretty JSON
pub fn print_session(id: &str, data: &SessionData) -> anyhow::Result<()> {
    if data.is_empty() {
        println!("{} {}", id.bold(), "(empty session)".dimmed());
        return Ok(());
    }
    if data.as_value().is_object() {
        println!("{} ({} keys)", id.bold(), data.len());
    } else {
        println!("{} {}", id.bold(), "(opaque payload)".dimmed());
    }
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

pub fn print_gc_report(report: &GcReport) {
    println!("{}", "=== Session GC ===".bold());
    println!("  cutoff:  {}", report.cutoff);
    println!("  matched: {}", report.matched);
    println!("  deleted: {}", report.deleted.to_string().green());
    if report.failed > 0 {
        println!("  failed:  {}", report.failed.to_string().red().bold());
    } else {
        println!("  failed:  0");
    }
}

/// Copy of the config that is safe to print
pub fn redacted(config: &SessionConfig) -> SessionConfig {
    let mut shown = config.clone();
    if shown.account_key.is_some() {
        shown.account_key = Some(REDACTED.to_string());
    }
    if shown.connection_string.is_some() {
        shown.connection_string = Some(REDACTED.to_string());
    }
    shown
}

pub fn print_config(config: &SessionConfig) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&redacted(config))?);
    Ok(())
}
