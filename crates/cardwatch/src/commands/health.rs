//! Backend health check.

use cardwatch_core::{Dashboard, HealthStatus};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub async fn handle(dashboard: &Dashboard, global: &GlobalOpts) -> Result<(), CliError> {
    let status = dashboard.check_health().await?;
    if !status.ok {
        return Err(CliError::Unhealthy);
    }
    let api_url = dashboard.config().api_url.to_string();

    let out = output::render_single(
        global.output,
        &status,
        |_| format!("Backend healthy at {api_url}"),
        |_: &HealthStatus| "ok".into(),
    )?;

    output::print_output(&out, global.quiet);
    Ok(())
}
