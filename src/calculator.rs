use crate::models::{OverallStanding, OverallSummary, Standing, Subject, SubjectStatus};

/// Cap on the forward projection loop. The count is unbounded in principle
/// (a target of 0 is never breached), so the simulation stops here and
/// reports the capped value.
pub const PROJECTION_CAP: i32 = 1000;

pub fn current_percentage(attended_classes: i32, total_classes: i32) -> f64 {
    debug_assert!(attended_classes >= 0 && total_classes >= 0);
    debug_assert!(attended_classes <= total_classes);
    if total_classes == 0 {
        return 0.0;
    }
    f64::from(attended_classes) / f64::from(total_classes) * 100.0
}

/// Minimum attended classes (out of `total_classes`) needed to meet the
/// target. Rounds up: clearing a percentage threshold takes a whole class,
/// and rounding down would show a student as passing while a fraction of a
/// class short. Computed in integer arithmetic so the result is exact.
pub fn required_classes(total_classes: i32, target_percent: i32) -> i32 {
    debug_assert!(total_classes >= 0);
    debug_assert!((0..=100).contains(&target_percent));
    let product = i64::from(target_percent) * i64::from(total_classes);
    ((product + 99) / 100) as i32
}

/// Slack against the classes held so far: how many of the classes not needed
/// for the target remain unspent. Negative means the student has already
/// bunked past the slack; that is a critical standing, not an error.
pub fn max_bunkable(total_classes: i32, bunked_classes: i32, target_percent: i32) -> i32 {
    debug_assert!(bunked_classes >= 0);
    total_classes - required_classes(total_classes, target_percent) - bunked_classes
}

/// Forward projection: how many future classes can be missed, one at a time,
/// before the percentage drops below target. Returns 0 when the current
/// percentage is already below target (or no classes have been held yet).
pub fn projected_safe_to_bunk(
    attended_classes: i32,
    total_classes: i32,
    target_percent: i32,
) -> i32 {
    debug_assert!(attended_classes >= 0 && attended_classes <= total_classes);
    debug_assert!((0..=100).contains(&target_percent));
    if total_classes == 0 {
        return 0;
    }
    if current_percentage(attended_classes, total_classes) < f64::from(target_percent) {
        return 0;
    }

    let mut future_total = total_classes;
    let mut safe = 0;
    while safe < PROJECTION_CAP {
        future_total += 1;
        if current_percentage(attended_classes, future_total) < f64::from(target_percent) {
            break;
        }
        safe += 1;
    }
    safe
}

/// Full derived standing for one subject. The safe/critical flag is driven by
/// `max_bunkable`; the forward projection is carried alongside under its own
/// name so the two metrics are never conflated.
pub fn subject_status(subject: &Subject, target_percent: i32) -> SubjectStatus {
    let required = required_classes(subject.total_classes, target_percent);
    let bunkable = max_bunkable(subject.total_classes, subject.bunked_classes, target_percent);
    SubjectStatus {
        current_percentage: current_percentage(subject.attended_classes, subject.total_classes),
        required_classes: required,
        max_bunkable: bunkable,
        projected_safe_to_bunk: projected_safe_to_bunk(
            subject.attended_classes,
            subject.total_classes,
            target_percent,
        ),
        standing: if bunkable > 0 {
            Standing::Safe
        } else {
            Standing::Critical
        },
    }
}

/// Overall standing across subjects. Sums the raw counters and applies the
/// per-subject formulas to the sums, weighting by class count rather than by
/// subject count: a subject with 5 classes must not weigh as much as one
/// with 50.
pub fn aggregate(subjects: &[Subject], target_percent: i32) -> OverallSummary {
    let mut total_classes = 0;
    let mut attended_classes = 0;
    let mut bunked_classes = 0;
    for subject in subjects {
        total_classes += subject.total_classes;
        attended_classes += subject.attended_classes;
        bunked_classes += subject.bunked_classes;
    }

    let percentage = current_percentage(attended_classes, total_classes);
    OverallSummary {
        total_classes,
        attended_classes,
        bunked_classes,
        current_percentage: percentage,
        required_classes: required_classes(total_classes, target_percent),
        max_bunkable: max_bunkable(total_classes, bunked_classes, target_percent),
        standing: if percentage >= f64::from(target_percent) {
            OverallStanding::OnTrack
        } else {
            OverallStanding::NeedsImprovement
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_subject(total: i32, attended: i32, bunked: i32) -> Subject {
        Subject {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Data Structures".to_string(),
            code: "CS201".to_string(),
            credits: 3,
            total_classes: total,
            attended_classes: attended,
            bunked_classes: bunked,
        }
    }

    #[test]
    fn required_never_exceeds_total() {
        for total in 0..=120 {
            for target in 0..=100 {
                assert!(required_classes(total, target) <= total);
            }
        }
    }

    #[test]
    fn required_at_zero_and_full_target() {
        for total in 0..=120 {
            assert_eq!(required_classes(total, 0), 0);
            assert_eq!(required_classes(total, 100), total);
        }
    }

    #[test]
    fn required_is_monotonic_in_target() {
        for total in [0, 1, 17, 30, 60] {
            let mut previous = 0;
            for target in 0..=100 {
                let required = required_classes(total, target);
                assert!(required >= previous);
                previous = required;
            }
        }
    }

    #[test]
    fn fresh_semester_scenario() {
        // 60 classes on the calendar, none held against the student yet.
        let subject = sample_subject(60, 0, 0);
        let status = subject_status(&subject, 75);
        assert_eq!(status.required_classes, 45);
        assert_eq!(status.max_bunkable, 15);
        assert_eq!(status.standing, Standing::Safe);
    }

    #[test]
    fn mid_semester_scenario() {
        let subject = sample_subject(30, 25, 0);
        let status = subject_status(&subject, 75);
        assert!((status.current_percentage - 83.33).abs() < 0.01);
        assert_eq!(status.required_classes, 23);
        assert_eq!(status.max_bunkable, 7);
    }

    #[test]
    fn projection_counts_until_threshold_breaks() {
        // 20/25 = 80%; 20/26 = 76.9% still safe; 20/27 = 74.07% breaks.
        assert_eq!(projected_safe_to_bunk(20, 25, 75), 1);
    }

    #[test]
    fn projection_is_zero_below_target() {
        assert_eq!(projected_safe_to_bunk(10, 20, 75), 0);
    }

    #[test]
    fn projection_guards_empty_record() {
        assert_eq!(projected_safe_to_bunk(0, 0, 75), 0);
        assert_eq!(projected_safe_to_bunk(0, 0, 0), 0);
    }

    #[test]
    fn projection_is_capped_at_zero_target() {
        assert_eq!(projected_safe_to_bunk(5, 10, 0), PROJECTION_CAP);
    }

    #[test]
    fn zero_classes_yield_zero_not_errors() {
        let status = subject_status(&sample_subject(0, 0, 0), 75);
        assert_eq!(status.current_percentage, 0.0);
        assert_eq!(status.required_classes, 0);
        assert_eq!(status.max_bunkable, 0);
        assert_eq!(status.standing, Standing::Critical);
    }

    #[test]
    fn overspent_slack_goes_negative_and_critical() {
        let status = subject_status(&sample_subject(20, 14, 6), 75);
        assert_eq!(status.required_classes, 15);
        assert_eq!(status.max_bunkable, -1);
        assert_eq!(status.standing, Standing::Critical);
    }

    #[test]
    fn aggregate_weights_by_class_count() {
        let subjects = vec![
            sample_subject(30, 25, 0),
            sample_subject(25, 20, 0),
            sample_subject(28, 22, 0),
        ];
        let summary = aggregate(&subjects, 75);
        assert_eq!(summary.total_classes, 83);
        assert_eq!(summary.attended_classes, 67);
        assert!((summary.current_percentage - 80.72).abs() < 0.01);
        assert_eq!(summary.standing, OverallStanding::OnTrack);
    }

    #[test]
    fn aggregate_of_singleton_matches_direct_status() {
        let subject = sample_subject(30, 25, 2);
        let status = subject_status(&subject, 75);
        let summary = aggregate(std::slice::from_ref(&subject), 75);
        assert!((summary.current_percentage - status.current_percentage).abs() < 1e-9);
        assert_eq!(summary.required_classes, status.required_classes);
        assert_eq!(summary.max_bunkable, status.max_bunkable);
    }

    #[test]
    fn aggregate_of_nothing_is_empty_and_behind_target() {
        let summary = aggregate(&[], 75);
        assert_eq!(summary.total_classes, 0);
        assert_eq!(summary.current_percentage, 0.0);
        assert_eq!(summary.standing, OverallStanding::NeedsImprovement);
    }
}
