//! Present roster command handler.

use std::time::Duration;

use chrono::Utc;
use tabled::Tabled;

use cardwatch_core::{Dashboard, PresentUser};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PresentRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Card UID")]
    card_uid: String,
    #[tabled(rename = "Checked in")]
    since: String,
    #[tabled(rename = "For")]
    elapsed: String,
}

impl From<&PresentUser> for PresentRow {
    fn from(p: &PresentUser) -> Self {
        Self {
            id: p.user.id,
            name: p.user.name.clone(),
            card_uid: p.user.card_uid.clone(),
            since: util::local_time(p.last_in),
            elapsed: elapsed_since(p),
        }
    }
}

/// Time since check-in, rounded down to the minute.
fn elapsed_since(p: &PresentUser) -> String {
    let secs = (Utc::now() - p.last_in).num_seconds().max(0).unsigned_abs();
    let minutes = Duration::from_secs(secs - secs % 60);
    if minutes.is_zero() {
        "just now".into()
    } else {
        humantime::format_duration(minutes).to_string()
    }
}

pub async fn handle(dashboard: &Dashboard, global: &GlobalOpts) -> Result<(), CliError> {
    let present = dashboard.fetch_present().await?;
    let out = output::render_list(global.output, &present, |p| PresentRow::from(p), |p| {
        p.user.name.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
