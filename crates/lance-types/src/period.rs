use chrono::{Datelike, NaiveDate, Utc};

/// Quarterly reporting period label, e.g. `2026-Q1`.
pub fn report_period_for(date: NaiveDate) -> String {
    let quarter = (date.month0() / 3) + 1;
    format!("{}-Q{}", date.year(), quarter)
}

/// Reporting period for today (UTC).
pub fn current_report_period() -> String {
    report_period_for(Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarters() {
        let d = |m| NaiveDate::from_ymd_opt(2026, m, 15).unwrap();
        assert_eq!(report_period_for(d(1)), "2026-Q1");
        assert_eq!(report_period_for(d(3)), "2026-Q1");
        assert_eq!(report_period_for(d(4)), "2026-Q2");
        assert_eq!(report_period_for(d(9)), "2026-Q3");
        assert_eq!(report_period_for(d(12)), "2026-Q4");
    }

    #[test]
    fn current_period_has_expected_shape() {
        let p = current_report_period();
        assert_eq!(p.len(), 7);
        assert!(p.contains("-Q"));
    }
}
