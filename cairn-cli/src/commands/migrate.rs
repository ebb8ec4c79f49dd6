use anyhow::{anyhow, Result};

use cairn::{Config, Error, MigrationVersion, RunReport, Target};

use super::open_runner;

/// Apply pending migrations up to `to`, or all of them
pub async fn run_up(config: &Config, to: Option<MigrationVersion>) -> Result<()> {
    let mut runner = open_runner(config)?;
    let target = to.map(Target::Version).unwrap_or(Target::Latest);

    let report = runner.apply(target).await.map_err(describe_failure)?;
    print_report(&report);
    Ok(())
}

/// Revert every applied migration newer than `to`
pub async fn run_down(config: &Config, to: MigrationVersion) -> Result<()> {
    let mut runner = open_runner(config)?;

    let report = runner.revert(to).await.map_err(describe_failure)?;
    print_report(&report);
    Ok(())
}

/// Drain the index update outbox
pub async fn run_sync(config: &Config) -> Result<()> {
    let mut runner = open_runner(config)?;
    let pushed = runner.sync_index().await?;
    println!("Pushed {} queued index update(s)", pushed);
    Ok(())
}

fn print_report(report: &RunReport) {
    if report.completed.is_empty() {
        println!("Nothing to {}", report.direction);
        return;
    }
    for version in &report.completed {
        println!("  {} {}", report.direction, version);
    }
    println!(
        "{} migration(s) {}; {} index update(s) pushed",
        report.completed.len(),
        match report.direction {
            cairn::Direction::Up => "applied",
            cairn::Direction::Down => "reverted",
        },
        report.index_updates
    );
}

/// Name the failing version in the top-level error message
fn describe_failure(err: Error) -> anyhow::Error {
    match err.failed_version() {
        Some(version) => anyhow!(
            "migration {} failed ({}): {}",
            version,
            err.root().error_type(),
            err.root()
        ),
        None => anyhow::Error::new(err),
    }
}
