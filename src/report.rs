use std::fmt::Write;

use crate::models::{
    OverallSummary, Standing, Subject, SubjectStatus, TimetableClass, UserProfile,
};

/// Percentages are exact f64 internally; they become 2-decimal strings only
/// here, at the presentation boundary.
pub fn format_percent(value: f64) -> String {
    format!("{value:.2}")
}

pub fn build_report(
    user: &UserProfile,
    standings: &[(Subject, SubjectStatus)],
    summary: &OverallSummary,
    classes: &[TimetableClass],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}), target {}%",
        user.name, user.email, user.target_percent
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall");

    if summary.total_classes == 0 {
        let _ = writeln!(output, "No classes recorded yet.");
    } else {
        let _ = writeln!(
            output,
            "- {}% attendance ({} of {} classes, {} bunked) -- {}",
            format_percent(summary.current_percentage),
            summary.attended_classes,
            summary.total_classes,
            summary.bunked_classes,
            summary.standing
        );
        let _ = writeln!(
            output,
            "- {} classes required for target, {} bunkable",
            summary.required_classes, summary.max_bunkable
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects");

    if standings.is_empty() {
        let _ = writeln!(output, "No subjects added yet.");
    } else {
        for (subject, status) in standings {
            let _ = writeln!(
                output,
                "- {} ({}): {}% ({}/{}), required {}, bunkable {}, projected safe to bunk {} -- {}",
                subject.name,
                subject.code,
                format_percent(status.current_percentage),
                subject.attended_classes,
                subject.total_classes,
                status.required_classes,
                status.max_bunkable,
                status.projected_safe_to_bunk,
                status.standing
            );
        }
    }

    let critical: Vec<&(Subject, SubjectStatus)> = standings
        .iter()
        .filter(|(_, status)| status.standing == Standing::Critical)
        .collect();

    let _ = writeln!(output);
    let _ = writeln!(output, "## Critical Subjects");

    if critical.is_empty() {
        let _ = writeln!(output, "None; every subject has slack.");
    } else {
        for (subject, status) in critical {
            let _ = writeln!(
                output,
                "- {} ({}): {} bunkable, attend the next {} classes",
                subject.name,
                subject.code,
                status.max_bunkable,
                status.max_bunkable.unsigned_abs()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Timetable");

    if classes.is_empty() {
        let _ = writeln!(output, "No timetable set.");
    } else {
        for class in classes {
            let _ = writeln!(
                output,
                "- {} {}-{}: {} ({}){}",
                class.day,
                class.start_time.format("%H:%M"),
                class.end_time.format("%H:%M"),
                class.subject_name,
                class.class_type,
                class
                    .venue
                    .as_deref()
                    .map(|venue| format!(" at {venue}"))
                    .unwrap_or_default()
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator;
    use crate::models::{ClassType, Day};
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn sample_user() -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            name: "Priya Sharma".to_string(),
            email: "priya@example.com".to_string(),
            target_percent: 75,
        }
    }

    fn sample_subject(code: &str, total: i32, attended: i32, bunked: i32) -> Subject {
        Subject {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: format!("Subject {code}"),
            code: code.to_string(),
            credits: 3,
            total_classes: total,
            attended_classes: attended,
            bunked_classes: bunked,
        }
    }

    #[test]
    fn formats_two_decimal_percentages() {
        assert_eq!(format_percent(83.333333), "83.33");
        assert_eq!(format_percent(0.0), "0.00");
        assert_eq!(format_percent(100.0), "100.00");
    }

    #[test]
    fn report_covers_overall_and_subjects() {
        let user = sample_user();
        let subjects = vec![
            sample_subject("CS201", 30, 25, 3),
            sample_subject("CS305", 20, 12, 8),
        ];
        let standings: Vec<(Subject, SubjectStatus)> = subjects
            .iter()
            .map(|s| (s.clone(), calculator::subject_status(s, user.target_percent)))
            .collect();
        let summary = calculator::aggregate(&subjects, user.target_percent);

        let report = build_report(&user, &standings, &summary, &[]);
        assert!(report.contains("# Attendance Report"));
        assert!(report.contains("target 75%"));
        assert!(report.contains("Subject CS201 (CS201): 83.33% (25/30)"));
        // 20 total at 75% needs 15; 20 - 15 - 8 = -3 bunkable.
        assert!(report.contains("## Critical Subjects"));
        assert!(report.contains("Subject CS305 (CS305): -3 bunkable"));
    }

    #[test]
    fn report_handles_an_empty_account() {
        let user = sample_user();
        let summary = calculator::aggregate(&[], user.target_percent);
        let report = build_report(&user, &[], &summary, &[]);
        assert!(report.contains("No classes recorded yet."));
        assert!(report.contains("No subjects added yet."));
        assert!(report.contains("No timetable set."));
    }

    #[test]
    fn report_lists_timetable_slots() {
        let user = sample_user();
        let summary = calculator::aggregate(&[], user.target_percent);
        let class = TimetableClass {
            id: Uuid::new_v4(),
            user_id: user.id,
            subject_name: "Data Structures".to_string(),
            subject_code: Some("CS201".to_string()),
            day: Day::Monday,
            start_time: NaiveTime::parse_from_str("09:00", "%H:%M").unwrap(),
            end_time: NaiveTime::parse_from_str("10:00", "%H:%M").unwrap(),
            class_type: ClassType::Lecture,
            credits: 3,
            venue: Some("LH-2".to_string()),
            instructor: None,
        };
        let report = build_report(&user, &[], &summary, &[class]);
        assert!(report.contains("- Monday 09:00-10:00: Data Structures (Lecture) at LH-2"));
    }
}
