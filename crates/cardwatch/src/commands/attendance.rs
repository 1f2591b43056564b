//! Attendance log command handler.

use tabled::Tabled;

use cardwatch_core::{Attendance, AttendanceFilters, Dashboard};

use crate::cli::{AttendanceArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct AttendanceRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Card UID")]
    card_uid: String,
    #[tabled(rename = "Direction")]
    direction: String,
}

impl From<&Attendance> for AttendanceRow {
    fn from(a: &Attendance) -> Self {
        Self {
            id: a.id,
            time: util::local_datetime(a.ts),
            user: a
                .user
                .as_ref()
                .map_or_else(|| format!("#{}", a.user_id), |u| u.name.clone()),
            card_uid: a
                .user
                .as_ref()
                .map(|u| u.card_uid.clone())
                .unwrap_or_default(),
            direction: a.direction.to_string(),
        }
    }
}

/// Build the query from flags: `--all-dates` clears the day, otherwise
/// `--date` or today.
fn filters_from(args: &AttendanceArgs) -> Result<AttendanceFilters, CliError> {
    let date = if args.all_dates {
        None
    } else {
        Some(match args.date.as_deref() {
            Some(raw) => util::parse_date(raw, "date")?,
            None => util::today(),
        })
    };
    let from = args
        .from
        .as_deref()
        .map(|raw| util::parse_time(raw, "from"))
        .transpose()?;
    let to = args
        .to
        .as_deref()
        .map(|raw| util::parse_time(raw, "to"))
        .transpose()?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(CliError::Validation {
                field: "from".into(),
                reason: "--from must not be later than --to".into(),
            });
        }
    }

    Ok(AttendanceFilters { date, from, to })
}

pub async fn handle(
    dashboard: &Dashboard,
    args: AttendanceArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let filters = filters_from(&args)?;
    let records = dashboard.fetch_attendance(&filters).await?;

    let out = output::render_list(global.output, &records, |a| AttendanceRow::from(a), |a| {
        a.id.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
