use crate::infra::{demo_owner, morning_of, seed_demo_bookings, seed_demo_catalog};
use chrono::{Local, NaiveDate};
use clap::Args;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use turnover::config::AppConfig;
use turnover::error::AppError;
use turnover::scheduling::{
    BookingAlert, BookingSource, Conflict, FixedClock, InMemoryStore, NewAssignment,
    SchedulerWindow, TaskId, TurnoverService, WorkerId,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// First day of the scheduler board (dd-mm-yyyy). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Airbnb reservation export to reconcile against the seeded bookings.
    #[arg(long)]
    pub(crate) airbnb_csv: Option<PathBuf>,
    /// Skip scheduling the demo turnover before printing the board.
    #[arg(long)]
    pub(crate) no_assign: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        date,
        airbnb_csv,
        no_assign,
    } = args;

    let config = AppConfig::load()?;
    let today = date.unwrap_or_else(|| Local::now().date_naive());
    let store = Arc::new(InMemoryStore::default());
    seed_demo_catalog(&store);
    seed_demo_bookings(&store, today);
    let service = TurnoverService::new(
        store,
        Arc::new(FixedClock(morning_of(today))),
        config.scheduling,
    );
    let owner = demo_owner();

    println!("Turnover scheduling demo for {}", today.format("%d-%m-%Y"));
    let board = service.scheduler_window(&owner, today)?;
    render_board(&board);

    if !no_assign {
        // The second apartment's arrival is a few days out; cover it the day before.
        let request = NewAssignment {
            task_id: TaskId(11),
            worker_id: WorkerId(21),
            start: morning_of(today + chrono::Duration::days(3)),
            booking_id: None,
            state: Default::default(),
        };
        match service.create_assignment(&owner, request) {
            Ok(assignment) => {
                println!(
                    "\nScheduled assignment {} for worker {} at {}",
                    assignment.id,
                    assignment.worker_id,
                    assignment.range.start.format("%d-%m %H:%M")
                );
                let board = service.scheduler_window(&owner, today)?;
                render_board(&board);
            }
            Err(err) => println!("\nAssignment rejected ({}): {}", err.code(), err),
        }
    }

    if let Some(path) = airbnb_csv {
        let reader = BufReader::new(File::open(&path)?);
        let reconciled = service.import_bookings(&owner, BookingSource::Airbnb, reader)?;
        println!("\nImport review of {}", path.display());
        for item in reconciled {
            let apartment = item
                .apartment_id
                .map_or_else(|| "unmapped".to_string(), |id| format!("apartment {id}"));
            let conflict = match item.conflict {
                None => "no conflict".to_string(),
                Some(Conflict::BookingConflict(id)) => format!("overlaps booking {id}"),
                Some(Conflict::AssignmentConflict(id)) => format!("overlaps assignment {id}"),
                Some(Conflict::ImportBookingConflict(row)) => {
                    format!("overlaps imported row {}", row + 1)
                }
            };
            println!(
                "- {} {} ({} -> {}): {} | {}",
                item.candidate.external_id,
                item.candidate.name,
                item.candidate.range.start.format("%d-%m"),
                item.candidate.range.end.format("%d-%m"),
                apartment,
                conflict
            );
        }
    }

    Ok(())
}

fn render_board(board: &SchedulerWindow) {
    println!(
        "Board {} -> {}: {} bookings, {} assignments, {} extra",
        board.range.start.format("%d-%m"),
        board.range.end.format("%d-%m"),
        board.bookings.len(),
        board.assignments.len(),
        board.extra_assignments.len()
    );
    if board.red_alerts.is_empty() && board.yellow_alerts.is_empty() {
        println!("  All upcoming turnovers are covered");
        return;
    }
    for alert in board.red_alerts.iter().chain(&board.yellow_alerts) {
        println!("  {}", describe(alert));
    }
}

fn describe(alert: &BookingAlert) -> String {
    format!(
        "{:?} {}: booking {} ({}) checks in {} in {} day(s), {} task(s) unassigned",
        alert.level,
        alert.code,
        alert.booking.id,
        alert.booking.name,
        alert.booking.range.start.format("%d-%m %H:%M"),
        alert.days_until_check_in,
        alert.unassigned_tasks.len()
    )
}
