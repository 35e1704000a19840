use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_TARGET_PERCENT: i32 = 75;
pub const DEFAULT_CREDITS: i32 = 3;

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub target_percent: i32,
}

/// One attendance record per (user, subject). Counters start at zero when the
/// subject is added; `attended <= total` and `bunked <= total - attended` hold
/// because every mark resolves exactly one held class.
#[derive(Debug, Clone)]
pub struct Subject {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub code: String,
    pub credits: i32,
    pub total_classes: i32,
    pub attended_classes: i32,
    pub bunked_classes: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AttendanceAction {
    Attend,
    Bunk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    Safe,
    Critical,
}

impl fmt::Display for Standing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Standing::Safe => write!(f, "safe"),
            Standing::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OverallStanding {
    #[serde(rename = "on-track")]
    OnTrack,
    #[serde(rename = "needs-improvement")]
    NeedsImprovement,
}

impl fmt::Display for OverallStanding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStanding::OnTrack => write!(f, "on-track"),
            OverallStanding::NeedsImprovement => write!(f, "needs-improvement"),
        }
    }
}

/// Derived per-subject standing; recomputed fresh on every read, never stored.
/// `current_percentage` stays an exact f64 here and is formatted only at the
/// presentation boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectStatus {
    pub current_percentage: f64,
    pub required_classes: i32,
    pub max_bunkable: i32,
    pub projected_safe_to_bunk: i32,
    pub standing: Standing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverallSummary {
    pub total_classes: i32,
    pub attended_classes: i32,
    pub bunked_classes: i32,
    pub current_percentage: f64,
    pub required_classes: i32,
    pub max_bunkable: i32,
    pub standing: OverallStanding,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Day {
    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Day {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Monday" => Ok(Day::Monday),
            "Tuesday" => Ok(Day::Tuesday),
            "Wednesday" => Ok(Day::Wednesday),
            "Thursday" => Ok(Day::Thursday),
            "Friday" => Ok(Day::Friday),
            "Saturday" => Ok(Day::Saturday),
            "Sunday" => Ok(Day::Sunday),
            other => Err(anyhow::anyhow!("unknown day: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ClassType {
    Lecture,
    Lab,
    Tutorial,
}

impl ClassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassType::Lecture => "Lecture",
            ClassType::Lab => "Lab",
            ClassType::Tutorial => "Tutorial",
        }
    }
}

impl fmt::Display for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClassType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Lecture" => Ok(ClassType::Lecture),
            "Lab" => Ok(ClassType::Lab),
            "Tutorial" => Ok(ClassType::Tutorial),
            other => Err(anyhow::anyhow!("unknown class type: {other}")),
        }
    }
}

/// One slot in a user's weekly timetable.
#[derive(Debug, Clone)]
pub struct TimetableClass {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject_name: String,
    pub subject_code: Option<String>,
    pub day: Day,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub class_type: ClassType,
    pub credits: i32,
    pub venue: Option<String>,
    pub instructor: Option<String>,
}

impl TimetableClass {
    /// Boundary validation for a new slot; the store assumes these already hold.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.subject_name.trim().is_empty() {
            anyhow::bail!("subject name must not be empty");
        }
        if self.start_time >= self.end_time {
            anyhow::bail!(
                "class must end after it starts ({} >= {})",
                self.start_time.format("%H:%M"),
                self.end_time.format("%H:%M")
            );
        }
        if !(1..=5).contains(&self.credits) {
            anyhow::bail!("credits must be between 1 and 5, got {}", self.credits);
        }
        Ok(())
    }
}
