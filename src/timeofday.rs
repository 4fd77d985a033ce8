use chrono::NaiveTime;

/// Whether a time of day falls inside the window `[from, to)`.
///
/// A window whose start is later than its end crosses midnight (e.g. 23:00 to
/// 03:00). The start is inside the window, the end is not.
pub fn is_time_of_day_between(time: NaiveTime, from: NaiveTime, to: NaiveTime) -> bool {
    if from > to {
        time >= from || time < to
    } else {
        from <= time && time < to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn non_wrapping_intervals() {
        assert!(is_time_of_day_between(time(4, 15), time(4, 0), time(5, 0)));
        assert!(!is_time_of_day_between(time(4, 0), time(4, 15), time(5, 0)));
        assert!(!is_time_of_day_between(time(5, 0), time(4, 0), time(4, 15)));
    }

    #[test]
    fn wrapping_intervals() {
        assert!(is_time_of_day_between(time(7, 15), time(7, 0), time(3, 0)));
        assert!(is_time_of_day_between(time(2, 45), time(7, 0), time(3, 0)));
        assert!(!is_time_of_day_between(time(7, 0), time(7, 15), time(3, 0)));
        assert!(!is_time_of_day_between(time(3, 0), time(7, 0), time(2, 45)));
    }

    #[test]
    fn bounds_are_inclusive_start_exclusive_end() {
        assert!(is_time_of_day_between(time(4, 0), time(4, 0), time(5, 0)));
        assert!(!is_time_of_day_between(time(5, 0), time(4, 0), time(5, 0)));

        assert!(is_time_of_day_between(time(9, 0), time(9, 0), time(1, 0)));
        assert!(!is_time_of_day_between(time(1, 0), time(9, 0), time(1, 0)));
    }
}
