use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod calculator;
mod models;
mod report;
mod store;

use models::{
    AttendanceAction, ClassType, Day, OverallSummary, Subject, SubjectStatus, TimetableClass,
    DEFAULT_CREDITS, DEFAULT_TARGET_PERCENT,
};
use store::{AttendanceStore, PgStore};

#[derive(Parser)]
#[command(name = "attendify")]
#[command(about = "Student attendance and bunk-planning tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Register a user profile
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = DEFAULT_TARGET_PERCENT,
              value_parser = clap::value_parser!(i32).range(0..=100))]
        target: i32,
    },
    /// Change a user's target attendance percentage
    SetTarget {
        #[arg(long)]
        email: String,
        #[arg(long, value_parser = clap::value_parser!(i32).range(0..=100))]
        target: i32,
    },
    /// Add a subject (counters start at zero)
    AddSubject {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: String,
        #[arg(long, default_value_t = DEFAULT_CREDITS,
              value_parser = clap::value_parser!(i32).range(1..=5))]
        credits: i32,
    },
    /// Mark a held class as attended or bunked
    Mark {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: String,
        #[arg(long, value_enum)]
        action: AttendanceAction,
        #[arg(long)]
        json: bool,
    },
    /// Per-subject attendance standing
    Status {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Overall attendance summary across subjects
    Summary {
        #[arg(long)]
        email: String,
        #[arg(long)]
        json: bool,
    },
    /// Maintain the weekly timetable
    Timetable {
        #[command(subcommand)]
        command: TimetableCommands,
    },
    /// Import subjects with existing counters from a CSV file
    Import {
        #[arg(long)]
        email: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Generate a markdown attendance report
    Report {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum TimetableCommands {
    /// Add a class slot
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject_name: String,
        #[arg(long)]
        subject_code: Option<String>,
        #[arg(long, value_enum)]
        day: Day,
        #[arg(long, value_parser = parse_time)]
        start: NaiveTime,
        #[arg(long, value_parser = parse_time)]
        end: NaiveTime,
        #[arg(long, value_enum)]
        class_type: ClassType,
        #[arg(long, default_value_t = DEFAULT_CREDITS,
              value_parser = clap::value_parser!(i32).range(1..=5))]
        credits: i32,
        #[arg(long)]
        venue: Option<String>,
        #[arg(long)]
        instructor: Option<String>,
    },
    /// Show the timetable ordered by day and start time
    Show {
        #[arg(long)]
        email: String,
        #[arg(long)]
        json: bool,
    },
    /// Remove one class slot by id
    Remove {
        #[arg(long)]
        email: String,
        #[arg(long)]
        id: Uuid,
    },
    /// Clear the whole timetable
    Clear {
        #[arg(long)]
        email: String,
    },
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| format!("expected HH:MM, got {value}"))
}

/// Per-subject payload: record plus `bunkInfo`, percentage formatted to two
/// decimals.
fn subject_payload(subject: &Subject, status: &SubjectStatus) -> serde_json::Value {
    json!({
        "id": subject.id,
        "name": subject.name,
        "code": subject.code,
        "credits": subject.credits,
        "totalClasses": subject.total_classes,
        "attendedClasses": subject.attended_classes,
        "bunkedClasses": subject.bunked_classes,
        "bunkInfo": {
            "currentPercentage": report::format_percent(status.current_percentage),
            "requiredClasses": status.required_classes,
            "maxBunkable": status.max_bunkable,
            "projectedSafeToBunk": status.projected_safe_to_bunk,
            "status": status.standing,
        },
    })
}

fn summary_payload(summary: &OverallSummary, target_percent: i32) -> serde_json::Value {
    json!({
        "overallPercentage": report::format_percent(summary.current_percentage),
        "targetPercentage": target_percent,
        "totalClasses": summary.total_classes,
        "totalAttended": summary.attended_classes,
        "totalBunked": summary.bunked_classes,
        "overallBunkable": summary.max_bunkable,
        "status": summary.standing,
    })
}

fn class_payload(class: &TimetableClass) -> serde_json::Value {
    json!({
        "id": class.id,
        "subjectName": class.subject_name,
        "subjectCode": class.subject_code,
        "day": class.day.as_str(),
        "startTime": class.start_time.format("%H:%M").to_string(),
        "endTime": class.end_time.format("%H:%M").to_string(),
        "classType": class.class_type.as_str(),
        "credits": class.credits,
        "venue": class.venue,
        "instructor": class.instructor,
    })
}

fn print_standing(subject: &Subject, status: &SubjectStatus) {
    println!(
        "- {} ({}): {}% ({}/{} attended, {} bunked), required {}, bunkable {}, projected safe to bunk {} -- {}",
        subject.name,
        subject.code,
        report::format_percent(status.current_percentage),
        subject.attended_classes,
        subject.total_classes,
        subject.bunked_classes,
        status.required_classes,
        status.max_bunkable,
        status.projected_safe_to_bunk,
        status.standing
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool);

    match cli.command {
        Commands::InitDb => {
            store.init().await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            store.seed().await?;
            println!("Seed data inserted.");
        }
        Commands::Register { name, email, target } => {
            let user = store::register_user(&store, &name, &email, target).await?;
            println!("Registered {} ({}) with target {}%.", user.name, user.email, user.target_percent);
        }
        Commands::SetTarget { email, target } => {
            let user = store::fetch_user(&store, &email).await?;
            store.set_target(user.id, target).await?;
            println!("Target for {email} set to {target}%.");
        }
        Commands::AddSubject {
            email,
            name,
            code,
            credits,
        } => {
            let user = store::fetch_user(&store, &email).await?;
            let subject = Subject {
                id: Uuid::new_v4(),
                user_id: user.id,
                name,
                code,
                credits,
                total_classes: 0,
                attended_classes: 0,
                bunked_classes: 0,
            };
            store.insert_subject(&subject).await?;
            println!("Added {} ({}).", subject.name, subject.code);
        }
        Commands::Mark {
            email,
            subject,
            action,
            json,
        } => {
            let (updated, status) = store::mark_and_score(&store, &email, &subject, action).await?;
            if json {
                let payload = json!({ "success": true, "data": subject_payload(&updated, &status) });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                print_standing(&updated, &status);
            }
        }
        Commands::Status { email, subject, json } => {
            let (_, mut standings) = store::subject_standings(&store, &email).await?;
            if let Some(code) = &subject {
                standings.retain(|(record, _)| &record.code == code);
                if standings.is_empty() {
                    anyhow::bail!("no subject {code} for {email}");
                }
            }

            if json {
                let data: Vec<serde_json::Value> = standings
                    .iter()
                    .map(|(record, status)| subject_payload(record, status))
                    .collect();
                let payload = json!({ "success": true, "count": data.len(), "data": data });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else if standings.is_empty() {
                println!("No subjects added yet.");
            } else {
                for (record, status) in &standings {
                    print_standing(record, status);
                }
            }
        }
        Commands::Summary { email, json } => {
            let (user, standings) = store::subject_standings(&store, &email).await?;
            let subjects: Vec<Subject> =
                standings.iter().map(|(record, _)| record.clone()).collect();
            let summary = calculator::aggregate(&subjects, user.target_percent);
            let safe = standings
                .iter()
                .filter(|(_, status)| status.max_bunkable > 0)
                .count();
            let critical = standings.len() - safe;

            if json {
                let mut payload = summary_payload(&summary, user.target_percent);
                payload["safeSubjects"] = json!(safe);
                payload["criticalSubjects"] = json!(critical);
                println!("{}", serde_json::to_string_pretty(&json!({ "success": true, "data": payload }))?);
            } else {
                println!(
                    "Overall: {}% ({} of {} classes, {} bunked) -- {}",
                    report::format_percent(summary.current_percentage),
                    summary.attended_classes,
                    summary.total_classes,
                    summary.bunked_classes,
                    summary.standing
                );
                println!(
                    "Target {}%: {} classes required, {} bunkable. {} safe / {} critical subjects.",
                    user.target_percent, summary.required_classes, summary.max_bunkable, safe, critical
                );
            }
        }
        Commands::Timetable { command } => match command {
            TimetableCommands::Add {
                email,
                subject_name,
                subject_code,
                day,
                start,
                end,
                class_type,
                credits,
                venue,
                instructor,
            } => {
                let user = store::fetch_user(&store, &email).await?;
                let class = TimetableClass {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    subject_name,
                    subject_code,
                    day,
                    start_time: start,
                    end_time: end,
                    class_type,
                    credits,
                    venue,
                    instructor,
                };
                class.validate()?;
                store.insert_class(&class).await?;
                println!(
                    "Added {} on {} {}-{} (id {}).",
                    class.subject_name,
                    class.day,
                    class.start_time.format("%H:%M"),
                    class.end_time.format("%H:%M"),
                    class.id
                );
            }
            TimetableCommands::Show { email, json } => {
                let user = store::fetch_user(&store, &email).await?;
                let classes = store.list_classes(user.id).await?;

                if json {
                    let data: Vec<serde_json::Value> = classes.iter().map(class_payload).collect();
                    let payload = json!({ "success": true, "count": data.len(), "data": data });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                } else if classes.is_empty() {
                    println!("No timetable set.");
                } else {
                    for class in &classes {
                        println!(
                            "- {} {}-{}: {} ({}) [{}]",
                            class.day,
                            class.start_time.format("%H:%M"),
                            class.end_time.format("%H:%M"),
                            class.subject_name,
                            class.class_type,
                            class.id
                        );
                    }
                }
            }
            TimetableCommands::Remove { email, id } => {
                let user = store::fetch_user(&store, &email).await?;
                if store.remove_class(user.id, id).await? {
                    println!("Class {id} removed.");
                } else {
                    anyhow::bail!("no class {id} in the timetable for {email}");
                }
            }
            TimetableCommands::Clear { email } => {
                let user = store::fetch_user(&store, &email).await?;
                let removed = store.clear_timetable(user.id).await?;
                println!("Cleared {removed} classes.");
            }
        },
        Commands::Import { email, csv } => {
            let user = store::fetch_user(&store, &email).await?;
            let imported = store::import_subjects(&store, &user, &csv).await?;
            println!("Imported {imported} subjects from {}.", csv.display());
        }
        Commands::Report { email, out } => {
            let (user, standings) = store::subject_standings(&store, &email).await?;
            let subjects: Vec<Subject> =
                standings.iter().map(|(record, _)| record.clone()).collect();
            let summary = calculator::aggregate(&subjects, user.target_percent);
            let classes = store.list_classes(user.id).await?;
            let report = report::build_report(&user, &standings, &summary, &classes);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
