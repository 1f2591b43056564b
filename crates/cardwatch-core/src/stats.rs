// ── Dashboard statistics ──
//
// Derived counters over the three snapshots. Pure functions; callers
// pass in whatever snapshot they currently hold.

use std::collections::HashSet;

use cardwatch_api::{Attendance, PresentUser, User};
use chrono::{Local, NaiveDate, TimeZone};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_users: usize,
    pub present_now: usize,
    /// Attendance records whose timestamp falls on `today`.
    pub todays_activity: usize,
    /// Distinct users with at least one record `today`.
    pub active_today: usize,
}

impl DashboardStats {
    /// Compute against the local timezone.
    pub fn compute(
        users: &[User],
        present: &[PresentUser],
        attendance: &[Attendance],
        today: NaiveDate,
    ) -> Self {
        Self::compute_in(users, present, attendance, today, &Local)
    }

    /// Compute with `today` interpreted in `tz`.
    pub fn compute_in<Tz: TimeZone>(
        users: &[User],
        present: &[PresentUser],
        attendance: &[Attendance],
        today: NaiveDate,
        tz: &Tz,
    ) -> Self {
        let todays: Vec<&Attendance> = attendance
            .iter()
            .filter(|a| a.ts.with_timezone(tz).date_naive() == today)
            .collect();
        let active: HashSet<i64> = todays.iter().map(|a| a.user_id).collect();

        Self {
            total_users: users.len(),
            present_now: present.len(),
            todays_activity: todays.len(),
            active_today: active.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cardwatch_api::Direction;
    use chrono::{FixedOffset, Utc};
    use pretty_assertions::assert_eq;

    fn user(id: i64) -> User {
        User {
            id,
            name: format!("user{id}"),
            card_uid: format!("UID{id}"),
            active: true,
        }
    }

    fn record(id: i64, user_id: i64, ts: &str) -> Attendance {
        Attendance {
            id,
            user_id,
            user: None,
            direction: Direction::In,
            ts: ts.parse().unwrap(),
        }
    }

    #[test]
    fn counts_today_only() {
        let users = vec![user(1), user(2), user(3)];
        let present = vec![PresentUser {
            user: user(1),
            last_in: Utc::now(),
        }];
        let attendance = vec![
            record(1, 1, "2024-03-10T08:00:00Z"),
            record(2, 1, "2024-03-10T17:00:00Z"),
            record(3, 2, "2024-03-10T09:30:00Z"),
            record(4, 3, "2024-03-09T09:30:00Z"),
        ];
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let stats = DashboardStats::compute_in(&users, &present, &attendance, today, &Utc);
        assert_eq!(
            stats,
            DashboardStats {
                total_users: 3,
                present_now: 1,
                todays_activity: 3,
                active_today: 2,
            }
        );
    }

    #[test]
    fn day_boundary_follows_timezone() {
        let attendance = vec![record(1, 1, "2024-03-10T23:30:00Z")];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let utc_day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let local_day = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();

        assert_eq!(
            DashboardStats::compute_in(&[], &[], &attendance, utc_day, &plus_two).todays_activity,
            0
        );
        assert_eq!(
            DashboardStats::compute_in(&[], &[], &attendance, local_day, &plus_two).todays_activity,
            1
        );
    }

    #[test]
    fn empty_inputs() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            DashboardStats::compute_in(&[], &[], &[], today, &Utc),
            DashboardStats::default()
        );
    }
}
