use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::workflows::admissions::domain::{
    AcademicYear, Application, ApplicationStatus, DocumentRecord, FinalStatus, LifecycleAdvance,
    ProgramCode, Progress, Student, StudentId, VerificationRecord, VerificationStatus,
};
use crate::workflows::admissions::repository::{
    InterviewRecord, NewApplicant, NewDocument, NewVerification, RecordStore, StatusOverride,
    StoreCounts, StoreError, StudentSummary,
};

pub const SCHEMA_VERSION: i64 = 1;

const STUDENT_COLUMNS: &str = "id, name, email, phone, program, cet_score, cet_rank, \
     is_eligible, progress, status, created_at";
const DOCUMENT_COLUMNS: &str =
    "id, student_id, name, storage_path, document_type, size_bytes, uploaded_at";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed record store. Multi-row writes run inside `IMMEDIATE` transactions so the
/// read-modify-write of progress and status cannot interleave with another writer.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(storage_error)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(storage_error)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        self.conn()?
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(storage_error)
    }

    pub fn migrate(&self) -> Result<(), StoreError> {
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(StoreError::Unavailable(format!(
                "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
            )));
        }

        if current < 1 {
            let conn = self.conn()?;
            conn.execute_batch(include_str!("../../migrations/0001_admission_schema.sql"))
                .map_err(storage_error)?;
            conn.execute("PRAGMA user_version = 1", [])
                .map(|_| ())
                .map_err(storage_error)?;
        }

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database connection lock poisoned".to_string()))
    }
}

impl RecordStore for SqliteRecordStore {
    fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        self.conn()?
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM students WHERE email = ?1)",
                params![email],
                |row| row.get(0),
            )
            .map_err(storage_error)
    }

    fn create_applicant(&self, applicant: NewApplicant) -> Result<StudentId, StoreError> {
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO students (name, email, phone, program, cet_score, cet_rank, is_eligible, \
             progress, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                applicant.name,
                applicant.email,
                applicant.phone,
                applicant.program.as_str(),
                applicant.cet_score,
                applicant.cet_rank,
                applicant.is_eligible,
                applicant.progress.value(),
                ApplicationStatus::Submitted.label(),
                now,
            ],
        )
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::DuplicateEmail
            } else {
                storage_error(err)
            }
        })?;
        let row_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO applications (student_id, academic_year, entrance_score, final_status) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                row_id,
                applicant.academic_year.as_str(),
                applicant.cet_score,
                FinalStatus::Pending.label(),
            ],
        )
        .map_err(storage_error)?;
        tx.commit().map_err(storage_error)?;

        let id = u64::try_from(row_id)
            .map_err(|_| StoreError::Unavailable(format!("invalid student id {row_id}")))?;
        Ok(StudentId(id))
    }

    fn fetch_student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        let Some(key) = row_key(id) else {
            return Ok(None);
        };
        let conn = self.conn()?;
        select_student(&conn, key)
    }

    fn fetch_application(&self, id: StudentId) -> Result<Option<Application>, StoreError> {
        let Some(key) = row_key(id) else {
            return Ok(None);
        };
        let conn = self.conn()?;
        select_application(&conn, key)
    }

    fn record_uploads(
        &self,
        id: StudentId,
        documents: Vec<NewDocument>,
        advance: LifecycleAdvance,
    ) -> Result<(Vec<DocumentRecord>, Student), StoreError> {
        let key = row_key(id).ok_or(StoreError::NotFound)?;
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        let mut student = select_student(&tx, key)?.ok_or(StoreError::NotFound)?;

        let mut stored = Vec::with_capacity(documents.len());
        for document in documents {
            stored.push(insert_document(&tx, key, document)?);
        }
        student.advance(advance);
        write_progress(&tx, key, &student)?;
        tx.commit().map_err(storage_error)?;

        Ok((stored, student))
    }

    fn record_verification(
        &self,
        id: StudentId,
        document: NewDocument,
        verification: NewVerification,
        advance: LifecycleAdvance,
    ) -> Result<(VerificationRecord, Student), StoreError> {
        let key = row_key(id).ok_or(StoreError::NotFound)?;
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;
        let mut student = select_student(&tx, key)?.ok_or(StoreError::NotFound)?;

        insert_document(&tx, key, document)?;
        let verified_at = Utc::now();
        tx.execute(
            "INSERT INTO document_verification (student_id, document_type, status, confidence, \
             verified_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key,
                verification.document_type,
                verification.status.label(),
                verification.confidence,
                verified_at.to_rfc3339(),
            ],
        )
        .map_err(storage_error)?;
        let record = VerificationRecord {
            id: last_id(&tx)?,
            student_id: id,
            document_type: verification.document_type,
            status: verification.status,
            confidence: verification.confidence,
            verified_at,
        };

        student.advance(advance);
        write_progress(&tx, key, &student)?;
        tx.commit().map_err(storage_error)?;

        Ok((record, student))
    }

    fn overwrite_status(
        &self,
        id: StudentId,
        update: StatusOverride,
    ) -> Result<Student, StoreError> {
        let key = row_key(id).ok_or(StoreError::NotFound)?;
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;

        let current = select_student(&tx, key)?.ok_or(StoreError::NotFound)?;
        if !current.status.can_transition_to(update.status) {
            return Err(StoreError::TransitionRefused {
                from: current.status,
                to: update.status,
            });
        }
        tx.execute(
            "UPDATE students SET status = ?1, progress = ?2 WHERE id = ?3",
            params![update.status.label(), update.progress.value(), key],
        )
        .map_err(storage_error)?;
        if let Some(final_status) = update.final_status {
            tx.execute(
                "UPDATE applications SET final_status = ?1 WHERE student_id = ?2",
                params![final_status.label(), key],
            )
            .map_err(storage_error)?;
        }
        let student = select_student(&tx, key)?.ok_or(StoreError::NotFound)?;
        tx.commit().map_err(storage_error)?;

        Ok(student)
    }

    fn record_interview(
        &self,
        id: StudentId,
        interview: InterviewRecord,
    ) -> Result<Application, StoreError> {
        let key = row_key(id).ok_or(StoreError::NotFound)?;
        let mut conn = self.conn()?;
        let tx = begin(&mut conn)?;

        let changed = tx
            .execute(
                "UPDATE applications SET interview_date = ?1, interview_score = ?2, \
                 remarks = COALESCE(?3, remarks) WHERE student_id = ?4",
                params![
                    interview.date.format(DATE_FORMAT).to_string(),
                    interview.score,
                    interview.remarks,
                    key,
                ],
            )
            .map_err(storage_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        let application = select_application(&tx, key)?.ok_or(StoreError::NotFound)?;
        tx.commit().map_err(storage_error)?;

        Ok(application)
    }

    fn documents(&self, id: StudentId) -> Result<Vec<DocumentRecord>, StoreError> {
        let Some(key) = row_key(id) else {
            return Ok(Vec::new());
        };
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE student_id = ?1 ORDER BY id ASC"
            ))
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![key], document_from_row)
            .map_err(storage_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_error)
    }

    fn verifications(&self, id: StudentId) -> Result<Vec<VerificationRecord>, StoreError> {
        let Some(key) = row_key(id) else {
            return Ok(Vec::new());
        };
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, student_id, document_type, status, confidence, verified_at \
                 FROM document_verification WHERE student_id = ?1 ORDER BY id DESC",
            )
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![key], verification_from_row)
            .map_err(storage_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(storage_error)
    }

    fn search_students(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<StudentSummary>, StoreError> {
        let pattern = format!("%{}%", escape_like(query));
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {STUDENT_COLUMNS} FROM students \
                 WHERE ?1 = '' OR name LIKE ?2 ESCAPE '\\' OR email LIKE ?2 ESCAPE '\\' \
                 OR CAST(id AS TEXT) = ?1 \
                 ORDER BY id DESC LIMIT ?3"
            ))
            .map_err(storage_error)?;
        let rows = stmt
            .query_map(params![query, pattern, limit], student_from_row)
            .map_err(storage_error)?;
        rows.map(|row| row.map(|student| StudentSummary::from(&student)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage_error)
    }

    fn stats(&self) -> Result<StoreCounts, StoreError> {
        let conn = self.conn()?;
        let (total, eligible, verified, accepted): (i64, i64, i64, i64) = conn
            .query_row(
                "SELECT \
                   (SELECT COUNT(*) FROM students), \
                   (SELECT COUNT(*) FROM students WHERE is_eligible = 1), \
                   (SELECT COUNT(*) FROM document_verification WHERE status != ?1), \
                   (SELECT COUNT(*) FROM applications WHERE final_status = ?2)",
                params![VerificationStatus::Pending.label(), FinalStatus::Accepted.label()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(storage_error)?;

        Ok(StoreCounts {
            total_applications: count(total),
            eligible_applications: count(eligible),
            verified_documents: count(verified),
            accepted_applications: count(accepted),
        })
    }
}

fn begin(conn: &mut Connection) -> Result<Transaction<'_>, StoreError> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(storage_error)
}

fn select_student(conn: &Connection, key: i64) -> Result<Option<Student>, StoreError> {
    conn.query_row(
        &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
        params![key],
        student_from_row,
    )
    .optional()
    .map_err(storage_error)
}

fn select_application(conn: &Connection, key: i64) -> Result<Option<Application>, StoreError> {
    conn.query_row(
        "SELECT student_id, academic_year, entrance_score, interview_date, interview_score, \
         final_status, remarks FROM applications WHERE student_id = ?1",
        params![key],
        application_from_row,
    )
    .optional()
    .map_err(storage_error)
}

fn insert_document(
    conn: &Connection,
    key: i64,
    document: NewDocument,
) -> Result<DocumentRecord, StoreError> {
    let uploaded_at = Utc::now();
    let size = i64::try_from(document.size_bytes)
        .map_err(|_| StoreError::Unavailable("document too large to record".to_string()))?;
    conn.execute(
        "INSERT INTO documents (student_id, name, storage_path, document_type, size_bytes, \
         uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            key,
            document.name,
            document.storage_path,
            document.document_type,
            size,
            uploaded_at.to_rfc3339(),
        ],
    )
    .map_err(storage_error)?;

    Ok(DocumentRecord {
        id: last_id(conn)?,
        student_id: StudentId(key.unsigned_abs()),
        name: document.name,
        storage_path: document.storage_path,
        document_type: document.document_type,
        size_bytes: document.size_bytes,
        uploaded_at,
    })
}

fn write_progress(conn: &Connection, key: i64, student: &Student) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE students SET progress = ?1, status = ?2 WHERE id = ?3",
        params![student.progress.value(), student.status.label(), key],
    )
    .map(|_| ())
    .map_err(storage_error)
}

fn last_id(conn: &Connection) -> Result<u64, StoreError> {
    let row_id = conn.last_insert_rowid();
    u64::try_from(row_id).map_err(|_| StoreError::Unavailable(format!("invalid row id {row_id}")))
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let program: String = row.get(4)?;
    let progress: i64 = row.get(8)?;
    let status: String = row.get(9)?;
    let created_at: String = row.get(10)?;

    Ok(Student {
        id: StudentId(unsigned(row, 0)?),
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        program: ProgramCode::parse(&program)
            .ok_or_else(|| invalid(4, Type::Text, format!("invalid program: {program}")))?,
        cet_score: narrow_optional(row, 5)?,
        cet_rank: narrow_optional(row, 6)?,
        is_eligible: row.get(7)?,
        progress: u8::try_from(progress)
            .ok()
            .and_then(Progress::new)
            .ok_or_else(|| invalid(8, Type::Integer, format!("invalid progress: {progress}")))?,
        status: ApplicationStatus::parse(&status)
            .ok_or_else(|| invalid(9, Type::Text, format!("invalid status: {status}")))?,
        created_at: timestamp(10, &created_at)?,
    })
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    let academic_year: String = row.get(1)?;
    let interview_date: Option<String> = row.get(3)?;
    let final_status: String = row.get(5)?;

    Ok(Application {
        student_id: StudentId(unsigned(row, 0)?),
        academic_year: AcademicYear::parse(&academic_year).ok_or_else(|| {
            invalid(
                1,
                Type::Text,
                format!("invalid academic year: {academic_year}"),
            )
        })?,
        entrance_score: narrow_optional(row, 2)?,
        interview_date: interview_date
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, DATE_FORMAT)
                    .map_err(|_| invalid(3, Type::Text, format!("invalid interview date: {raw}")))
            })
            .transpose()?,
        interview_score: narrow_optional(row, 4)?,
        final_status: FinalStatus::parse(&final_status).ok_or_else(|| {
            invalid(5, Type::Text, format!("invalid final status: {final_status}"))
        })?,
        remarks: row.get(6)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    let uploaded_at: String = row.get(6)?;
    Ok(DocumentRecord {
        id: unsigned(row, 0)?,
        student_id: StudentId(unsigned(row, 1)?),
        name: row.get(2)?,
        storage_path: row.get(3)?,
        document_type: row.get(4)?,
        size_bytes: unsigned(row, 5)?,
        uploaded_at: timestamp(6, &uploaded_at)?,
    })
}

fn verification_from_row(row: &Row<'_>) -> rusqlite::Result<VerificationRecord> {
    let status: String = row.get(3)?;
    let verified_at: String = row.get(5)?;
    Ok(VerificationRecord {
        id: unsigned(row, 0)?,
        student_id: StudentId(unsigned(row, 1)?),
        document_type: row.get(2)?,
        status: VerificationStatus::parse(&status).ok_or_else(|| {
            invalid(3, Type::Text, format!("invalid verification status: {status}"))
        })?,
        confidence: row.get(4)?,
        verified_at: timestamp(5, &verified_at)?,
    })
}

fn unsigned(row: &Row<'_>, index: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(index)?;
    u64::try_from(raw)
        .map_err(|_| invalid(index, Type::Integer, format!("negative value: {raw}")))
}

fn narrow_optional<T: TryFrom<i64>>(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<i64> = row.get(index)?;
    raw.map(|value| {
        T::try_from(value)
            .map_err(|_| invalid(index, Type::Integer, format!("value out of range: {value}")))
    })
    .transpose()
}

fn timestamp(index: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| invalid(index, Type::Text, format!("invalid timestamp: {raw}")))
}

fn invalid(index: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        ty,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

/// Row key for a student id; ids beyond `i64::MAX` cannot exist in the table.
fn row_key(id: StudentId) -> Option<i64> {
    i64::try_from(id.0).ok()
}

fn count(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or_default()
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn storage_error(err: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}
