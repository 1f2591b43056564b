//! Live view: mounts the dashboard and prints connection changes,
//! notifications and snapshot refreshes until Ctrl-C.

use chrono::Local;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use cardwatch_core::{
    AttendanceFilters, ConnectionState, Dashboard, Freshness, Notification, Snapshot,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Output lines ────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WatchLine<'a> {
    State {
        state: ConnectionState,
    },
    Event {
        label: &'a str,
    },
    Notification {
        #[serde(flatten)]
        notification: &'a Notification,
    },
    Snapshot {
        name: &'a str,
        count: usize,
    },
}

struct Printer {
    format: OutputFormat,
    color: bool,
    quiet: bool,
}

impl Printer {
    fn emit(&self, line: &WatchLine<'_>) -> Result<(), CliError> {
        let text = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(line)?,
            OutputFormat::Yaml => format!("---\n{}", output::render_yaml(line)?.trim_end()),
            OutputFormat::Table | OutputFormat::Plain => self.human(line),
        };
        output::print_output(&text, self.quiet);
        Ok(())
    }

    fn human(&self, line: &WatchLine<'_>) -> String {
        let stamp = output::dim(&Local::now().format("%H:%M:%S").to_string(), self.color);
        match line {
            WatchLine::State { state } => {
                format!("{stamp} stream   {}", output::paint_state(*state, self.color))
            }
            WatchLine::Event { label } => format!("{stamp} event    {label}"),
            WatchLine::Notification { notification: n } => {
                let level = output::paint_level(n.level, self.color);
                match n.description {
                    Some(ref d) => format!("{stamp} {level}  {} ({d})", n.title),
                    None => format!("{stamp} {level}  {}", n.title),
                }
            }
            WatchLine::Snapshot { name, count } => {
                format!("{stamp} refresh  {name}: {count}")
            }
        }
    }

    /// Only settled snapshots are worth a line; loading flips are noise.
    fn snapshot<T>(&self, name: &str, snap: &Snapshot<T>) -> Result<(), CliError> {
        if snap.freshness != Freshness::Fresh {
            return Ok(());
        }
        self.emit(&WatchLine::Snapshot {
            name,
            count: snap.len(),
        })
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    dashboard: &Dashboard,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.today {
        dashboard.set_filters(AttendanceFilters::for_date(util::today()));
    }

    let printer = Printer {
        format: global.output,
        color: output::should_color(global.color),
        quiet: global.quiet,
    };
    let show_snapshots = !args.no_snapshots;

    // Subscribe before mounting so the first transitions are not missed.
    let mut state = dashboard.connection_state();
    let mut last_event = dashboard.last_event();
    let mut notifications = dashboard.notifications();
    let mut users = dashboard.users();
    let mut attendance = dashboard.attendance();
    let mut present = dashboard.present();

    dashboard.mount().await;
    tracing::info!(api_url = %dashboard.config().api_url, "watching event stream");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        let emitted = tokio::select! {
            biased;

            _ = &mut ctrl_c => break Ok(()),

            Ok(()) = state.changed() => {
                let current = *state.borrow_and_update();
                printer.emit(&WatchLine::State { state: current })
            }

            Ok(()) = last_event.changed() => {
                let label = last_event.borrow_and_update().clone();
                match label {
                    Some(label) => printer.emit(&WatchLine::Event { label: &label }),
                    None => Ok(()),
                }
            }

            received = notifications.recv() => match received {
                Ok(n) => printer.emit(&WatchLine::Notification { notification: &n }),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification consumer lagged");
                    Ok(())
                }
                Err(RecvError::Closed) => break Ok(()),
            },

            Some(snap) = users.changed(), if show_snapshots => printer.snapshot("users", &snap),
            Some(snap) = attendance.changed(), if show_snapshots => {
                printer.snapshot("attendance", &snap)
            }
            Some(snap) = present.changed(), if show_snapshots => printer.snapshot("present", &snap),
        };

        if let Err(e) = emitted {
            break Err(e);
        }
    };

    dashboard.unmount().await;
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cardwatch_core::NotificationLevel;

    fn plain() -> Printer {
        Printer {
            format: OutputFormat::Table,
            color: false,
            quiet: true,
        }
    }

    #[test]
    fn human_lines_carry_payload() {
        let p = plain();
        let line = p.human(&WatchLine::State {
            state: ConnectionState::Connected,
        });
        assert!(line.ends_with("stream   connected"));

        let n = Notification::new(NotificationLevel::Warning, "Unknown RFID Card", Some("UID: X".into()));
        let line = p.human(&WatchLine::Notification { notification: &n });
        assert!(line.contains("warning"));
        assert!(line.ends_with("Unknown RFID Card (UID: X)"));
    }

    #[test]
    fn json_lines_are_tagged() {
        let n = Notification::success("User created successfully");
        let json = output::render_json_compact(&WatchLine::Notification { notification: &n }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "notification");
        assert_eq!(value["level"], "success");
        assert_eq!(value["title"], "User created successfully");

        let json = output::render_json_compact(&WatchLine::State {
            state: ConnectionState::Connecting,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"state","state":"connecting"}"#);
    }
}
