use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;

use duskbell::core::deadline::Deadline;
use duskbell::core::evaluator::{Classification, Windows, evaluate};

/// Any instant on 2026-03-01, to the second
fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0u32..86_400).prop_map(|secs| {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
            + chrono::Duration::seconds(secs as i64)
    })
}

fn deadline_strategy() -> impl Strategy<Value = Deadline> {
    (0u8..24, 0u8..60).prop_map(|(h, m)| Deadline::new(h, m).unwrap())
}

/// Trigger window never larger than the approach window
fn windows_strategy() -> impl Strategy<Value = Windows> {
    (1u64..7_200)
        .prop_flat_map(|approach| (Just(approach), 1u64..=approach))
        .prop_map(|(approach, trigger)| Windows { approach, trigger })
}

fn rank(classification: Classification) -> u8 {
    match classification {
        Classification::Dormant => 0,
        Classification::Approaching => 1,
        Classification::Triggerable => 2,
        Classification::Active => 3,
        Classification::Past => 4,
    }
}

proptest! {
    /// Same inputs, same answer
    #[test]
    fn test_evaluate_is_pure(
        now in instant_strategy(),
        deadline in deadline_strategy(),
        windows in windows_strategy()
    ) {
        let first = evaluate(&now, Some(deadline), &windows);
        let second = evaluate(&now, Some(deadline), &windows);
        prop_assert_eq!(first, second);
    }

    /// The classification agrees with the reported seconds
    #[test]
    fn test_classification_matches_windows(
        now in instant_strategy(),
        deadline in deadline_strategy(),
        windows in windows_strategy()
    ) {
        let result = evaluate(&now, Some(deadline), &windows);
        let secs = result.seconds_until_deadline.unwrap();

        match result.classification {
            Classification::Past => prop_assert!(secs <= 0),
            Classification::Triggerable => {
                prop_assert!(secs > 0 && secs as u64 <= windows.trigger)
            }
            Classification::Approaching => {
                prop_assert!(secs as u64 > windows.trigger && secs as u64 <= windows.approach)
            }
            Classification::Dormant => prop_assert!(secs as u64 > windows.approach),
            Classification::Active => prop_assert!(false, "evaluate never reports Active"),
        }
    }

    /// Walking forward through the day only moves toward Past
    #[test]
    fn test_classification_is_monotonic_within_a_day(
        deadline in deadline_strategy(),
        windows in windows_strategy(),
        a in 0i64..86_400,
        b in 0i64..86_400
    ) {
        let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
        let midnight = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        let first = evaluate(&(midnight + chrono::Duration::seconds(earlier)), Some(deadline), &windows);
        let second = evaluate(&(midnight + chrono::Duration::seconds(later)), Some(deadline), &windows);

        prop_assert!(rank(first.classification) <= rank(second.classification));
        prop_assert!(
            first.seconds_until_deadline.unwrap() >= second.seconds_until_deadline.unwrap()
        );
    }

    /// Without a deadline there is nothing to count down to
    #[test]
    fn test_missing_deadline_is_dormant(
        now in instant_strategy(),
        windows in windows_strategy()
    ) {
        let result = evaluate(&now, None, &windows);
        prop_assert_eq!(result.classification, Classification::Dormant);
        prop_assert_eq!(result.seconds_until_deadline, None);
    }

    /// Parsing the display form gives the same deadline back
    #[test]
    fn test_deadline_display_parses(deadline in deadline_strategy()) {
        prop_assert_eq!(Deadline::parse(&deadline.to_string()).unwrap(), deadline);
    }
}

#[test]
fn test_exact_window_edges() {
    let windows = Windows {
        approach: 900,
        trigger: 300,
    };
    let deadline = Some(Deadline::new(18, 0).unwrap());
    let at = |h, m, s| Utc.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap();

    let cases = [
        (at(17, 44, 59), Classification::Dormant, 901),
        (at(17, 45, 0), Classification::Approaching, 900),
        (at(17, 54, 59), Classification::Approaching, 301),
        (at(17, 55, 0), Classification::Triggerable, 300),
        (at(17, 59, 59), Classification::Triggerable, 1),
        (at(18, 0, 0), Classification::Past, 0),
        (at(18, 0, 1), Classification::Past, -1),
    ];

    for (now, expected, secs) in cases {
        let result = evaluate(&now, deadline, &windows);
        assert_eq!(result.classification, expected, "at {now}");
        assert_eq!(result.seconds_until_deadline, Some(secs), "at {now}");
    }
}

#[test]
fn test_sub_second_remainder_rounds_up() {
    let windows = Windows {
        approach: 900,
        trigger: 300,
    };
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 17, 54, 59).unwrap()
        + chrono::Duration::milliseconds(500);
    let result = evaluate(&now, Some(Deadline::new(18, 0).unwrap()), &windows);
    assert_eq!(result.seconds_until_deadline, Some(301));
    assert_eq!(result.classification, Classification::Approaching);
}
