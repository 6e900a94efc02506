//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `assembly_core` linkage.
//! - Report schema version and stored assemblies of a database file.
//!
//! Usage: `assembly_cli [DB_PATH] [LOG_DIR]`. Without `DB_PATH` an
//! in-memory database is used.

use assembly_core::db::migrations::current_user_version;
use assembly_core::{
    AssemblyListQuery, AssemblyService, AssemblyStatus, Collaborators, StaticUnitRoster,
};
use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let db_path = args.next();
    let log_dir = args.next();

    if let Some(log_dir) = log_dir {
        if let Err(err) = assembly_core::init_logging(assembly_core::default_log_level(), &log_dir)
        {
            eprintln!("logging disabled: {err}");
        }
    }
    match assembly_core::logging_status() {
        Some((level, dir)) => println!("logging level={level} dir={}", dir.display()),
        None => println!("logging disabled"),
    }

    println!("assembly_core ping={}", assembly_core::ping());
    println!("assembly_core version={}", assembly_core::core_version());

    match run(db_path.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_smoke module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let conn = match db_path {
        Some(path) => assembly_core::open_db(path)?,
        None => assembly_core::open_db_in_memory()?,
    };
    println!("schema_version={}", current_user_version(&conn)?);

    let collab = Collaborators::with_roster(Arc::new(StaticUnitRoster::new()));
    let service = AssemblyService::try_new(&conn, collab)?;
    let assemblies = service.list_assemblies(&AssemblyListQuery::default())?;

    let mut by_status: BTreeMap<&'static str, usize> = BTreeMap::new();
    for assembly in &assemblies {
        *by_status.entry(assembly.status.as_str()).or_default() += 1;
    }
    println!("assemblies={}", assemblies.len());
    for status in [
        AssemblyStatus::Draft,
        AssemblyStatus::Scheduled,
        AssemblyStatus::Open,
        AssemblyStatus::VotingClosed,
        AssemblyStatus::Finalized,
        AssemblyStatus::Cancelled,
    ] {
        let count = by_status.get(status.as_str()).copied().unwrap_or(0);
        println!("  {}={count}", status.as_str());
    }
    Ok(())
}
