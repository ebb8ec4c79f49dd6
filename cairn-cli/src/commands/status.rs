use anyhow::Result;

use cairn::migration::StatusReport;
use cairn::Config;

use super::open_runner;

/// Print applied and pending migrations
pub fn run_status(config: &Config, json: bool) -> Result<()> {
    let runner = open_runner(config)?;
    let report = runner.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_table(&report);
    Ok(())
}

fn print_table(report: &StatusReport) {
    println!();
    println!("{:<14} {:<40} {}", "VERSION", "NAME", "APPLIED");
    println!("--------------------------------------------------------------------------------");
    for migration in &report.migrations {
        let applied = match migration.applied_at {
            Some(at) => at.to_rfc3339(),
            None => "pending".to_string(),
        };
        let name = if migration.registered {
            migration.name.clone()
        } else {
            format!("{} (missing file)", migration.name)
        };
        println!("{:<14} {:<40} {}", migration.version, name, applied);
    }
    println!();
    println!("Current version:        {}", report.current());
    println!("Pending migrations:     {}", report.pending().len());
    println!("Queued index updates:   {}", report.pending_index_updates);
}
