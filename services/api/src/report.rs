use crate::infra::{DiscardExportSink, StaticEnrollmentDirectory};
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use student_standing::config::OperationBudgets;
use student_standing::error::AppError;
use student_standing::registry::{
    Actor, ChangeNotifier, MemoryRecordStore, RegistryService, RiskThresholds, Role,
};

#[derive(Args, Debug)]
pub(crate) struct StandingReportArgs {
    /// Roster csv to classify; header synonyms are accepted
    #[arg(long)]
    pub(crate) roster: PathBuf,
    /// GPA below this floor counts as academic risk
    #[arg(long)]
    pub(crate) gpa_floor: Option<f64>,
    /// Attendance below this floor counts as attendance risk
    #[arg(long)]
    pub(crate) attendance_floor: Option<f64>,
    /// Balance above this ceiling counts as financial risk
    #[arg(long)]
    pub(crate) balance_ceiling: Option<f64>,
    /// Include the per-row import diagnostics in the output
    #[arg(long)]
    pub(crate) show_diagnostics: bool,
}

/// Offline classification: load the roster into a scratch registry and
/// print the standing report as JSON.
pub(crate) fn run_standing_report(args: StandingReportArgs) -> Result<(), AppError> {
    let service = RegistryService::new(
        Arc::new(MemoryRecordStore::new()),
        ChangeNotifier::default(),
        Arc::new(DiscardExportSink),
        Arc::new(StaticEnrollmentDirectory::default()),
        OperationBudgets::default(),
    );
    let registrar = Actor::for_role(Role::Registrar);

    let roster = File::open(&args.roster)?;
    let summary = service.import(&registrar, roster)?;

    let defaults = RiskThresholds::default();
    let thresholds = RiskThresholds {
        gpa_floor: args.gpa_floor.unwrap_or(defaults.gpa_floor),
        attendance_floor: args.attendance_floor.unwrap_or(defaults.attendance_floor),
        balance_ceiling: args.balance_ceiling.unwrap_or(defaults.balance_ceiling),
    };
    let report = service.classify(&registrar, &thresholds)?;

    let output = if args.show_diagnostics {
        serde_json::json!({ "import": summary, "report": report })
    } else {
        serde_json::json!({ "report": report })
    };
    let rendered = serde_json::to_string_pretty(&output).map_err(std::io::Error::from)?;
    println!("{rendered}");

    if summary.skipped > 0 {
        eprintln!(
            "note: {} of {} rows were skipped; rerun with --show-diagnostics for details",
            summary.skipped, summary.rows_total
        );
    }
    Ok(())
}
