//! Dashboard statistics command handler.

use cardwatch_core::{AttendanceFilters, Dashboard, DashboardStats};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

fn detail(s: &DashboardStats) -> String {
    [
        format!("Total users:       {}", s.total_users),
        format!("Present now:       {}", s.present_now),
        format!("Today's activity:  {}", s.todays_activity),
        format!("Active today:      {}", s.active_today),
    ]
    .join("\n")
}

pub async fn handle(dashboard: &Dashboard, global: &GlobalOpts) -> Result<(), CliError> {
    let today = util::today();
    let filters = AttendanceFilters::for_date(today);

    let (users, present, attendance) = tokio::try_join!(
        dashboard.fetch_users(),
        dashboard.fetch_present(),
        dashboard.fetch_attendance(&filters),
    )?;

    let stats = DashboardStats::compute(&users, &present, &attendance, today);
    let out = output::render_single(global.output, &stats, detail, |s| {
        format!(
            "{} {} {} {}",
            s.total_users, s.present_now, s.todays_activity, s.active_today
        )
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
