//! User roster command handlers.

use serde::Serialize;
use tabled::Tabled;

use cardwatch_core::{Dashboard, User};

use crate::cli::{GlobalOpts, UsersArgs, UsersCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Card UID")]
    card_uid: String,
    #[tabled(rename = "Active")]
    active: &'static str,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            card_uid: u.card_uid.clone(),
            active: if u.active { "yes" } else { "no" },
        }
    }
}

fn detail(u: &User) -> String {
    [
        format!("ID:        {}", u.id),
        format!("Name:      {}", u.name),
        format!("Card UID:  {}", u.card_uid),
        format!("Active:    {}", u.active),
    ]
    .join("\n")
}

#[derive(Serialize)]
struct Deleted {
    id: i64,
    deleted: bool,
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    dashboard: &Dashboard,
    args: UsersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let user = match args.command {
        UsersCommand::List => {
            let users = dashboard.fetch_users().await?;
            let out = output::render_list(global.output, &users, |u| UserRow::from(u), |u| {
                u.id.to_string()
            })?;
            output::print_output(&out, global.quiet);
            return Ok(());
        }

        UsersCommand::Create { name, card_uid } => dashboard.create_user(&name, &card_uid).await?,

        UsersCommand::Update { id, name, card_uid } => {
            dashboard
                .update_user(id, name.as_deref(), card_uid.as_deref())
                .await?
        }

        UsersCommand::Enable { id } => dashboard.set_user_active(id, true).await?,

        UsersCommand::Disable { id } => dashboard.set_user_active(id, false).await?,

        UsersCommand::Delete { id } => {
            if !util::confirm(&format!("Delete user {id}?"), global.yes)? {
                return Ok(());
            }
            dashboard.delete_user(id).await?;
            let out = output::render_single(
                global.output,
                &Deleted { id, deleted: true },
                |d| format!("Deleted user {}", d.id),
                |d| d.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            return Ok(());
        }
    };

    let out = output::render_single(global.output, &user, detail, |u| u.id.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
