use anyhow::Context;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::calculator;
use crate::models::{
    AttendanceAction, Subject, SubjectStatus, TimetableClass, UserProfile, DEFAULT_CREDITS,
};

/// Persistence surface for users, subjects, and the timetable. The calculator
/// stays pure; everything stateful goes through this trait so the Postgres
/// store can be swapped for an in-memory double in tests.
#[allow(async_fn_in_trait)]
pub trait AttendanceStore {
    async fn find_user(&self, email: &str) -> anyhow::Result<Option<UserProfile>>;
    async fn insert_user(&self, user: &UserProfile) -> anyhow::Result<()>;
    async fn set_target(&self, user_id: Uuid, target_percent: i32) -> anyhow::Result<()>;

    async fn insert_subject(&self, subject: &Subject) -> anyhow::Result<()>;
    async fn upsert_subject(&self, subject: &Subject) -> anyhow::Result<()>;
    async fn list_subjects(&self, user_id: Uuid) -> anyhow::Result<Vec<Subject>>;
    async fn find_subject(&self, user_id: Uuid, code: &str) -> anyhow::Result<Option<Subject>>;
    /// Applies the mutation atomically and returns the updated record.
    async fn record_attendance(
        &self,
        subject_id: Uuid,
        action: AttendanceAction,
    ) -> anyhow::Result<Subject>;

    async fn insert_class(&self, class: &TimetableClass) -> anyhow::Result<()>;
    async fn list_classes(&self, user_id: Uuid) -> anyhow::Result<Vec<TimetableClass>>;
    async fn remove_class(&self, user_id: Uuid, class_id: Uuid) -> anyhow::Result<bool>;
    async fn clear_timetable(&self, user_id: Uuid) -> anyhow::Result<u64>;
}

pub async fn fetch_user(store: &impl AttendanceStore, email: &str) -> anyhow::Result<UserProfile> {
    store
        .find_user(email)
        .await?
        .with_context(|| format!("no user registered with email {email}"))
}

/// Registers a profile; duplicate emails are rejected before touching the store.
pub async fn register_user(
    store: &impl AttendanceStore,
    name: &str,
    email: &str,
    target_percent: i32,
) -> anyhow::Result<UserProfile> {
    if store.find_user(email).await?.is_some() {
        anyhow::bail!("a user with email {email} already exists");
    }
    let user = UserProfile {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_string(),
        target_percent,
    };
    store.insert_user(&user).await?;
    Ok(user)
}

/// The mutation path of the mark operation: look the subject up under the
/// user (ownership is structural), resolve the held class one way or the
/// other, then rescore against the user's target.
pub async fn mark_and_score(
    store: &impl AttendanceStore,
    email: &str,
    code: &str,
    action: AttendanceAction,
) -> anyhow::Result<(Subject, SubjectStatus)> {
    let user = fetch_user(store, email).await?;
    let subject = store
        .find_subject(user.id, code)
        .await?
        .with_context(|| format!("no subject {code} for {email}"))?;
    let updated = store.record_attendance(subject.id, action).await?;
    let status = calculator::subject_status(&updated, user.target_percent);
    Ok((updated, status))
}

/// All of a user's subjects with their derived standing, recomputed fresh.
pub async fn subject_standings(
    store: &impl AttendanceStore,
    email: &str,
) -> anyhow::Result<(UserProfile, Vec<(Subject, SubjectStatus)>)> {
    let user = fetch_user(store, email).await?;
    let subjects = store.list_subjects(user.id).await?;
    let standings = subjects
        .into_iter()
        .map(|subject| {
            let status = calculator::subject_status(&subject, user.target_percent);
            (subject, status)
        })
        .collect();
    Ok((user, standings))
}

/// sqlx-backed store; counter updates are single atomic statements so
/// concurrent marks on the same subject are never lost.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn seed(&self) -> anyhow::Result<()> {
        let user_id = Uuid::parse_str("7b2a9f64-1c3e-4a8d-9f02-5d6c41b8e7a3")?;
        sqlx::query(
            r#"
            INSERT INTO attendify.users (id, name, email, target_percent)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name, target_percent = EXCLUDED.target_percent
            "#,
        )
        .bind(user_id)
        .bind("Priya Sharma")
        .bind("priya.sharma@attendify.dev")
        .bind(75)
        .execute(&self.pool)
        .await?;

        let subjects = vec![
            ("Data Structures", "CS201", 4, 30, 25, 3),
            ("Operating Systems", "CS305", 4, 25, 20, 2),
            ("Discrete Mathematics", "MA202", 3, 28, 22, 4),
        ];

        for (name, code, credits, total, attended, bunked) in subjects {
            sqlx::query(
                r#"
                INSERT INTO attendify.subjects
                (id, user_id, name, code, credits, total_classes, attended_classes, bunked_classes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (user_id, code) DO UPDATE
                SET name = EXCLUDED.name,
                    credits = EXCLUDED.credits,
                    total_classes = EXCLUDED.total_classes,
                    attended_classes = EXCLUDED.attended_classes,
                    bunked_classes = EXCLUDED.bunked_classes
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(name)
            .bind(code)
            .bind(credits)
            .bind(total)
            .bind(attended)
            .bind(bunked)
            .execute(&self.pool)
            .await?;
        }

        let classes = vec![
            ("Data Structures", "CS201", "Monday", "09:00", "10:00", "Lecture", "LH-2", "Dr. Rao"),
            ("Data Structures", "CS201", "Wednesday", "14:00", "16:00", "Lab", "CS Lab 1", "Dr. Rao"),
            ("Operating Systems", "CS305", "Tuesday", "11:00", "12:00", "Lecture", "LH-4", "Prof. Iyer"),
            ("Discrete Mathematics", "MA202", "Thursday", "10:00", "11:00", "Tutorial", "T-12", "Dr. Menon"),
        ];

        for (name, code, day, start, end, class_type, venue, instructor) in classes {
            let start = chrono::NaiveTime::parse_from_str(start, "%H:%M")?;
            let end = chrono::NaiveTime::parse_from_str(end, "%H:%M")?;
            sqlx::query(
                r#"
                INSERT INTO attendify.timetable_classes
                (id, user_id, subject_name, subject_code, day, start_time, end_time,
                 class_type, credits, venue, instructor)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(name)
            .bind(code)
            .bind(day)
            .bind(start)
            .bind(end)
            .bind(class_type)
            .bind(DEFAULT_CREDITS)
            .bind(venue)
            .bind(instructor)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}

fn map_user(row: &PgRow) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        target_percent: row.get("target_percent"),
    }
}

fn map_subject(row: &PgRow) -> Subject {
    Subject {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        code: row.get("code"),
        credits: row.get("credits"),
        total_classes: row.get("total_classes"),
        attended_classes: row.get("attended_classes"),
        bunked_classes: row.get("bunked_classes"),
    }
}

fn map_class(row: &PgRow) -> anyhow::Result<TimetableClass> {
    let day: String = row.get("day");
    let class_type: String = row.get("class_type");
    Ok(TimetableClass {
        id: row.get("id"),
        user_id: row.get("user_id"),
        subject_name: row.get("subject_name"),
        subject_code: row.get("subject_code"),
        day: day.parse()?,
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        class_type: class_type.parse()?,
        credits: row.get("credits"),
        venue: row.get("venue"),
        instructor: row.get("instructor"),
    })
}

impl AttendanceStore for PgStore {
    async fn find_user(&self, email: &str) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query(
            "SELECT id, name, email, target_percent FROM attendify.users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(map_user))
    }

    async fn insert_user(&self, user: &UserProfile) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attendify.users (id, name, email, target_percent)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.target_percent)
        .execute(&self.pool)
        .await
        .context("failed to insert user")?;
        Ok(())
    }

    async fn set_target(&self, user_id: Uuid, target_percent: i32) -> anyhow::Result<()> {
        sqlx::query("UPDATE attendify.users SET target_percent = $2 WHERE id = $1")
            .bind(user_id)
            .bind(target_percent)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_subject(&self, subject: &Subject) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attendify.subjects
            (id, user_id, name, code, credits, total_classes, attended_classes, bunked_classes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(subject.id)
        .bind(subject.user_id)
        .bind(&subject.name)
        .bind(&subject.code)
        .bind(subject.credits)
        .bind(subject.total_classes)
        .bind(subject.attended_classes)
        .bind(subject.bunked_classes)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert subject {}", subject.code))?;
        Ok(())
    }

    async fn upsert_subject(&self, subject: &Subject) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attendify.subjects
            (id, user_id, name, code, credits, total_classes, attended_classes, bunked_classes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, code) DO UPDATE
            SET name = EXCLUDED.name,
                credits = EXCLUDED.credits,
                total_classes = EXCLUDED.total_classes,
                attended_classes = EXCLUDED.attended_classes,
                bunked_classes = EXCLUDED.bunked_classes
            "#,
        )
        .bind(subject.id)
        .bind(subject.user_id)
        .bind(&subject.name)
        .bind(&subject.code)
        .bind(subject.credits)
        .bind(subject.total_classes)
        .bind(subject.attended_classes)
        .bind(subject.bunked_classes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_subjects(&self, user_id: Uuid) -> anyhow::Result<Vec<Subject>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, code, credits,
                   total_classes, attended_classes, bunked_classes
            FROM attendify.subjects
            WHERE user_id = $1
            ORDER BY code
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(map_subject).collect())
    }

    async fn find_subject(&self, user_id: Uuid, code: &str) -> anyhow::Result<Option<Subject>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, code, credits,
                   total_classes, attended_classes, bunked_classes
            FROM attendify.subjects
            WHERE user_id = $1 AND code = $2
            "#,
        )
        .bind(user_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(map_subject))
    }

    async fn record_attendance(
        &self,
        subject_id: Uuid,
        action: AttendanceAction,
    ) -> anyhow::Result<Subject> {
        let query = match action {
            AttendanceAction::Attend => {
                r#"
                UPDATE attendify.subjects
                SET attended_classes = attended_classes + 1,
                    total_classes = total_classes + 1
                WHERE id = $1
                RETURNING id, user_id, name, code, credits,
                          total_classes, attended_classes, bunked_classes
                "#
            }
            AttendanceAction::Bunk => {
                r#"
                UPDATE attendify.subjects
                SET bunked_classes = bunked_classes + 1,
                    total_classes = total_classes + 1
                WHERE id = $1
                RETURNING id, user_id, name, code, credits,
                          total_classes, attended_classes, bunked_classes
                "#
            }
        };

        let row = sqlx::query(query)
            .bind(subject_id)
            .fetch_one(&self.pool)
            .await
            .context("failed to record attendance")?;
        Ok(map_subject(&row))
    }

    async fn insert_class(&self, class: &TimetableClass) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attendify.timetable_classes
            (id, user_id, subject_name, subject_code, day, start_time, end_time,
             class_type, credits, venue, instructor)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(class.id)
        .bind(class.user_id)
        .bind(&class.subject_name)
        .bind(&class.subject_code)
        .bind(class.day.as_str())
        .bind(class.start_time)
        .bind(class.end_time)
        .bind(class.class_type.as_str())
        .bind(class.credits)
        .bind(&class.venue)
        .bind(&class.instructor)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_classes(&self, user_id: Uuid) -> anyhow::Result<Vec<TimetableClass>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, subject_name, subject_code, day, start_time, end_time,
                   class_type, credits, venue, instructor
            FROM attendify.timetable_classes
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut classes = Vec::with_capacity(rows.len());
        for row in &rows {
            classes.push(map_class(row)?);
        }
        // Day is stored as text; ordering happens here, not in SQL.
        classes.sort_by_key(|class| (class.day, class.start_time));
        Ok(classes)
    }

    async fn remove_class(&self, user_id: Uuid, class_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "DELETE FROM attendify.timetable_classes WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(class_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_timetable(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM attendify.timetable_classes WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Bulk subject import. Rows carry existing counters, so each one is checked
/// against the record invariants before anything is written.
pub async fn import_subjects(
    store: &impl AttendanceStore,
    user: &UserProfile,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let subjects = parse_subject_rows(file, user.id)?;
    let imported = subjects.len();
    for subject in &subjects {
        store.upsert_subject(subject).await?;
    }
    Ok(imported)
}

pub fn parse_subject_rows(
    reader: impl std::io::Read,
    user_id: Uuid,
) -> anyhow::Result<Vec<Subject>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        code: String,
        credits: Option<i32>,
        total_classes: i32,
        attended_classes: i32,
        bunked_classes: i32,
    }

    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut subjects = Vec::new();

    for (index, result) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("bad CSV row {}", index + 1))?;
        if row.total_classes < 0 || row.attended_classes < 0 || row.bunked_classes < 0 {
            anyhow::bail!("row {} ({}): counts must be non-negative", index + 1, row.code);
        }
        if row.attended_classes > row.total_classes {
            anyhow::bail!(
                "row {} ({}): attended {} exceeds total {}",
                index + 1,
                row.code,
                row.attended_classes,
                row.total_classes
            );
        }
        if row.bunked_classes > row.total_classes - row.attended_classes {
            anyhow::bail!(
                "row {} ({}): bunked {} exceeds unattended classes",
                index + 1,
                row.code,
                row.bunked_classes
            );
        }
        subjects.push(Subject {
            id: Uuid::new_v4(),
            user_id,
            name: row.name,
            code: row.code,
            credits: row.credits.unwrap_or(DEFAULT_CREDITS),
            total_classes: row.total_classes,
            attended_classes: row.attended_classes,
            bunked_classes: row.bunked_classes,
        });
    }

    Ok(subjects)
}
