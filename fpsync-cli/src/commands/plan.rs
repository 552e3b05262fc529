//! `fpsync plan` — per-student view of what `sync` would do.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use fpsync_sync::{pipeline, Action, SyncReport};

use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Emit the planned report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "student")]
    student: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl PlanArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let config = global.load_config()?;
        let prepared = super::prepare(&config, true)?;
        let report = pipeline::run(&prepared.client, prepared.roster, &prepared.options)
            .context("plan failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize plan")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

fn print_table(report: &SyncReport) {
    println!("{}", report.summary_line());
    if report.total() == 0 {
        println!("Roster is empty.");
        return;
    }

    let mut rows: Vec<PlanRow> = report
        .entries
        .iter()
        .map(|entry| PlanRow {
            student: entry.name.clone(),
            id: entry.external_id.to_string(),
            action: entry.action.label().to_string(),
            detail: action_detail(&entry.action),
        })
        .collect();
    rows.extend(report.failures.iter().map(|failure| PlanRow {
        student: failure.name.clone(),
        id: failure.external_id.to_string(),
        action: "FAILED".to_string(),
        detail: failure.message.clone(),
    }));

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn action_detail(action: &Action) -> String {
    match action {
        Action::Create { school_id } => format!("new student at school {school_id}"),
        Action::ReEnroll {
            remote_student_id,
            school_id,
        } => format!("student {remote_student_id} into school {school_id}"),
        Action::Transfer {
            remote_student_id,
            from_school_id,
            to_school_id,
        } => format!("student {remote_student_id}: school {from_school_id} -> {to_school_id}"),
        Action::NoOp => "already enrolled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use fpsync_core::{RemoteStudentId, SchoolId};

    use super::*;

    #[test]
    fn transfer_detail_names_both_schools() {
        let detail = action_detail(&Action::Transfer {
            remote_student_id: RemoteStudentId(900),
            from_school_id: SchoolId(2),
            to_school_id: SchoolId(1),
        });
        assert_eq!(detail, "student 900: school 2 -> 1");
    }
}
