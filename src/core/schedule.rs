// Wall-clock schedule math for the background loops.
//
// Both loops sleep until a local-time target: the daily claim reset fires at
// 23:58 and the lottery draws Sunday at noon. Times are computed in the
// configured timezone so DST shifts keep the reset anchored to the wall
// clock, not to a fixed UTC offset.

use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone};

const RESET_HOUR: u32 = 23;
const RESET_MINUTE: u32 = 58;
const DRAW_HOUR: u32 = 12;

/// Resolve a local date+time, skipping forward over a DST gap.
fn resolve<Tz: TimeZone>(
    tz: &Tz,
    date: chrono::NaiveDate,
    time: NaiveTime,
) -> Option<DateTime<Tz>> {
    let mut candidate = date.and_time(time);
    for _ in 0..4 {
        if let Some(resolved) = tz.from_local_datetime(&candidate).earliest() {
            return Some(resolved);
        }
        candidate += chrono::Duration::minutes(30);
    }
    None
}

/// Next 23:58 local strictly after `now`.
pub fn next_daily_reset<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    let reset = NaiveTime::from_hms_opt(RESET_HOUR, RESET_MINUTE, 0)?;

    let candidate = resolve(&tz, today, reset)?;
    if candidate > *now {
        return Some(candidate);
    }
    resolve(&tz, today.checked_add_days(Days::new(1))?, reset)
}

/// Next Sunday noon local at or after `now`.
///
/// The `missed` flag is set when a scheduled draw in the current week has
/// already passed, meaning the process slept through it (or just started)
/// and owes the guilds a compensation draw.
pub fn next_weekly_draw<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<(DateTime<Tz>, bool)> {
    let tz = now.timezone();
    let today = now.date_naive();

    let noon = NaiveTime::from_hms_opt(DRAW_HOUR, 0, 0)?;
    let days_until_sunday = 6 - today.weekday().num_days_from_monday() as u64;
    let sunday = today.checked_add_days(Days::new(days_until_sunday))?;
    let candidate = resolve(&tz, sunday, noon)?;

    if candidate > *now {
        Some((candidate, false))
    } else {
        let next = resolve(&tz, sunday.checked_add_days(Days::new(7))?, noon)?;
        Some((next, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use chrono_tz::America::Los_Angeles;

    fn la(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<chrono_tz::Tz> {
        Los_Angeles
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn reset_is_tonight_before_the_cutoff() {
        let next = next_daily_reset(&la(2024, 3, 1, 9, 0)).unwrap();
        assert_eq!(next, la(2024, 3, 1, 23, 58));
    }

    #[test]
    fn reset_rolls_to_tomorrow_after_the_cutoff() {
        let next = next_daily_reset(&la(2024, 3, 1, 23, 59)).unwrap();
        assert_eq!(next, la(2024, 3, 2, 23, 58));
    }

    #[test]
    fn reset_survives_the_spring_forward_day() {
        // DST starts 2024-03-10 at 02:00 in Los Angeles.
        let next = next_daily_reset(&la(2024, 3, 10, 1, 0)).unwrap();
        assert_eq!(next, la(2024, 3, 10, 23, 58));
    }

    #[test]
    fn draw_lands_on_the_coming_sunday() {
        // 2024-03-01 is a Friday.
        let (next, missed) = next_weekly_draw(&la(2024, 3, 1, 9, 0)).unwrap();
        assert_eq!(next, la(2024, 3, 3, 12, 0));
        assert_eq!(next.weekday(), Weekday::Sun);
        assert!(!missed);
    }

    #[test]
    fn sunday_morning_draws_at_noon_same_day() {
        let (next, missed) = next_weekly_draw(&la(2024, 3, 3, 11, 59)).unwrap();
        assert_eq!(next, la(2024, 3, 3, 12, 0));
        assert!(!missed);
    }

    #[test]
    fn sunday_afternoon_reports_a_missed_draw() {
        let (next, missed) = next_weekly_draw(&la(2024, 3, 3, 12, 1)).unwrap();
        assert_eq!(next, la(2024, 3, 10, 12, 0));
        assert!(missed);
    }
}
