use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::metrics::MetricsSnapshot;
use crate::model::{Role, Run, RunStatus, Suite, Task, TaskType, Transcript};

pub struct EvalDb {
    conn: Mutex<Connection>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

fn bad_column(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("invalid {}: {}", what, value).into(),
    )
}

impl EvalDb {
    pub fn new(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("evals.db");
        let conn = Connection::open(&db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
            db_path,
        };
        db.init_schema()?;
        db.seed_defaults()?;
        Ok(db)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                task_type TEXT NOT NULL,
                category TEXT NOT NULL,
                system_prompt TEXT,
                checkpoints TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS suites (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                task_ids TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL REFERENCES tasks(id),
                suite_id TEXT REFERENCES suites(id),
                status TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,

                asr_latency REAL,
                llm_ttf REAL,
                tts_latency REAL,
                e2e_latency REAL,
                intent_accuracy REAL,
                task_completion INTEGER,

                code_score REAL,
                model_score REAL,
                composite_score REAL
            );

            CREATE TABLE IF NOT EXISTS transcripts (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
                turn INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                audio_url TEXT,
                asr_latency REAL,
                llm_latency REAL,
                tts_latency REAL,
                tool_calls TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_runs_task ON runs(task_id);
            CREATE INDEX IF NOT EXISTS idx_runs_start ON runs(start_time);
            CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status);
            CREATE INDEX IF NOT EXISTS idx_tr_run ON transcripts(run_id);
        ",
        )?;
        Ok(())
    }

    fn seed_defaults(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let seeds: &[(&str, &str, &str, &str, &str, &str)] = &[
            (
                "refund-basic",
                "Process a refund request",
                "User asks for a refund on a recent order; the agent should collect the order number and confirm the refund timeline",
                "capability",
                "customer_service",
                r#"["ask for order number","confirm refund timeline","acknowledge the request"]"#,
            ),
            (
                "appointment-booking",
                "Book a service appointment",
                "User wants to schedule an appointment; the agent should offer available slots and confirm date and time",
                "capability",
                "scheduling",
                r#"["offer available slots","confirm date and time"]"#,
            ),
            (
                "billing-dispute",
                "Handle a billing dispute calmly",
                "User disputes a charge; the agent should verify the account, explain the charge, and escalate if unresolved",
                "regression",
                "customer_service",
                r#"["verify the account","explain the charge","offer escalation"]"#,
            ),
        ];

        let mut stmt = conn.prepare(
            "INSERT INTO tasks (id, name, description, task_type, category, checkpoints, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        )?;

        for (id, name, description, task_type, category, checkpoints) in seeds {
            stmt.execute(params![id, name, description, task_type, category, checkpoints, now])?;
        }

        tracing::info!("Seeded {} default tasks", seeds.len());
        Ok(())
    }

    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    // ========================================================================
    // Task CRUD
    // ========================================================================

    fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
        let task_type_str: String = row.get(3)?;
        Ok(Task {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            task_type: TaskType::parse(&task_type_str)
                .ok_or_else(|| bad_column(3, "task type", &task_type_str))?,
            category: row.get(4)?,
            system_prompt: row.get(5)?,
            checkpoints: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    pub fn list_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, description, task_type, category, system_prompt, checkpoints, created_at, updated_at
             FROM tasks ORDER BY category, name",
        )?;
        let rows = stmt.query_map([], Self::task_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn get_task(&self, id: &str) -> anyhow::Result<Option<Task>> {
        let conn = self.conn();
        let task = conn
            .query_row(
                "SELECT id, name, description, task_type, category, system_prompt, checkpoints, created_at, updated_at
                 FROM tasks WHERE id=?1",
                params![id],
                Self::task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn insert_task(&self, task: &Task) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO tasks (id, name, description, task_type, category, system_prompt, checkpoints, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.id,
                task.name,
                task.description,
                task.task_type.as_str(),
                task.category,
                task.system_prompt,
                serde_json::to_string(&task.checkpoints)?,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn update_task(&self, id: &str, task: &Task) -> anyhow::Result<bool> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE tasks SET name=?2, description=?3, task_type=?4, category=?5, system_prompt=?6, checkpoints=?7, updated_at=?8
             WHERE id=?1",
            params![
                id,
                task.name,
                task.description,
                task.task_type.as_str(),
                task.category,
                task.system_prompt,
                serde_json::to_string(&task.checkpoints)?,
                task.updated_at,
            ],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_task(&self, id: &str) -> anyhow::Result<bool> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM tasks WHERE id=?1", params![id])?;
        Ok(deleted > 0)
    }

    // ========================================================================
    // Suite CRUD
    // ========================================================================

    fn suite_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Suite> {
        Ok(Suite {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            task_ids: row
                .get::<_, Option<String>>(3)?
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    pub fn list_suites(&self) -> anyhow::Result<Vec<Suite>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, description, task_ids, created_at, updated_at FROM suites ORDER BY name",
        )?;
        let rows = stmt.query_map([], Self::suite_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn insert_suite(&self, suite: &Suite) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO suites (id, name, description, task_ids, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                suite.id,
                suite.name,
                suite.description,
                serde_json::to_string(&suite.task_ids)?,
                suite.created_at,
                suite.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn update_suite(&self, id: &str, suite: &Suite) -> anyhow::Result<bool> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE suites SET name=?2, description=?3, task_ids=?4, updated_at=?5 WHERE id=?1",
            params![
                id,
                suite.name,
                suite.description,
                serde_json::to_string(&suite.task_ids)?,
                suite.updated_at,
            ],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_suite(&self, id: &str) -> anyhow::Result<bool> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM suites WHERE id=?1", params![id])?;
        Ok(deleted > 0)
    }

    // ========================================================================
    // Run lifecycle
    // ========================================================================

    fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Run> {
        let status_str: String = row.get(3)?;
        Ok(Run {
            id: row.get(0)?,
            task_id: row.get(1)?,
            suite_id: row.get(2)?,
            status: RunStatus::parse(&status_str)
                .ok_or_else(|| bad_column(3, "run status", &status_str))?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            asr_latency: row.get(6)?,
            llm_ttf: row.get(7)?,
            tts_latency: row.get(8)?,
            e2e_latency: row.get(9)?,
            intent_accuracy: row.get(10)?,
            task_completion: row.get::<_, Option<i64>>(11)?.map(|v| v != 0),
            code_score: row.get(12)?,
            model_score: row.get(13)?,
            composite_score: row.get(14)?,
        })
    }

    const RUN_COLUMNS: &'static str = "id, task_id, suite_id, status, start_time, end_time,
        asr_latency, llm_ttf, tts_latency, e2e_latency, intent_accuracy, task_completion,
        code_score, model_score, composite_score";

    pub fn insert_run(&self, run: &Run) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO runs (id, task_id, suite_id, status, start_time) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run.id,
                run.task_id,
                run.suite_id,
                run.status.as_str(),
                run.start_time,
            ],
        )?;
        Ok(())
    }

    pub fn get_run(&self, id: &str) -> anyhow::Result<Option<Run>> {
        let conn = self.conn();
        let run = conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id=?1", Self::RUN_COLUMNS),
                params![id],
                Self::run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    /// Recent runs, newest first, optionally filtered to one task.
    pub fn list_runs(&self, task_id: Option<&str>, limit: usize) -> anyhow::Result<Vec<Run>> {
        let conn = self.conn();
        let sql = match task_id {
            Some(_) => format!(
                "SELECT {} FROM runs WHERE task_id=?1 ORDER BY start_time DESC LIMIT ?2",
                Self::RUN_COLUMNS
            ),
            None => format!(
                "SELECT {} FROM runs ORDER BY start_time DESC LIMIT ?1",
                Self::RUN_COLUMNS
            ),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = match task_id {
            Some(tid) => stmt.query_map(params![tid, limit as i64], Self::run_from_row)?,
            None => stmt.query_map(params![limit as i64], Self::run_from_row)?,
        };
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// All terminal runs of a task in execution order (oldest first), as
    /// consumed by the reliability aggregation.
    pub fn graded_runs_for_task(&self, task_id: &str) -> anyhow::Result<Vec<Run>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM runs WHERE task_id=?1 AND status IN ('passed','failed') ORDER BY start_time ASC",
            Self::RUN_COLUMNS
        ))?;
        let rows = stmt.query_map(params![task_id], Self::run_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Write the averaged metrics snapshot onto a run.
    pub fn write_run_metrics(&self, run_id: &str, snapshot: &MetricsSnapshot) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE runs SET asr_latency=?2, llm_ttf=?3, tts_latency=?4, e2e_latency=?5,
                intent_accuracy=?6, task_completion=?7
             WHERE id=?1",
            params![
                run_id,
                snapshot.asr_latency,
                snapshot.llm_ttf,
                snapshot.tts_latency,
                snapshot.e2e_latency,
                snapshot.intent_accuracy,
                snapshot.task_completion as i64,
            ],
        )?;
        Ok(())
    }

    /// Final writeback from the grading pipeline: scores plus the terminal
    /// status derived from the composite verdict.
    pub fn write_run_grades(
        &self,
        run_id: &str,
        code_score: f64,
        model_score: Option<f64>,
        composite_score: f64,
        status: RunStatus,
    ) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE runs SET code_score=?2, model_score=?3, composite_score=?4, status=?5, end_time=?6
             WHERE id=?1",
            params![
                run_id,
                code_score,
                model_score,
                composite_score,
                status.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn mark_run_failed(&self, run_id: &str) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE runs SET status='failed', end_time=?2 WHERE id=?1",
            params![run_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    // ========================================================================
    // Transcripts (append-only)
    // ========================================================================

    fn transcript_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transcript> {
        let role_str: String = row.get(3)?;
        Ok(Transcript {
            id: row.get(0)?,
            run_id: row.get(1)?,
            turn: row.get(2)?,
            role: Role::parse(&role_str).ok_or_else(|| bad_column(3, "role", &role_str))?,
            content: row.get(4)?,
            timestamp: row.get(5)?,
            audio_url: row.get(6)?,
            asr_latency: row.get(7)?,
            llm_latency: row.get(8)?,
            tts_latency: row.get(9)?,
            tool_calls: row
                .get::<_, Option<String>>(10)?
                .and_then(|s| serde_json::from_str(&s).ok()),
        })
    }

    pub fn insert_transcript(&self, transcript: &Transcript) -> anyhow::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO transcripts (id, run_id, turn, role, content, timestamp, audio_url,
                asr_latency, llm_latency, tts_latency, tool_calls)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                transcript.id,
                transcript.run_id,
                transcript.turn,
                transcript.role.as_str(),
                transcript.content,
                transcript.timestamp,
                transcript.audio_url,
                transcript.asr_latency,
                transcript.llm_latency,
                transcript.tts_latency,
                transcript
                    .tool_calls
                    .as_ref()
                    .map(|tc| serde_json::to_string(tc).unwrap_or_default()),
            ],
        )?;
        Ok(())
    }

    pub fn transcripts_for_run(&self, run_id: &str) -> anyhow::Result<Vec<Transcript>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, run_id, turn, role, content, timestamp, audio_url,
                    asr_latency, llm_latency, tts_latency, tool_calls
             FROM transcripts WHERE run_id=?1 ORDER BY turn",
        )?;
        let rows = stmt.query_map(params![run_id], Self::transcript_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
