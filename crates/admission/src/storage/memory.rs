use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::workflows::admissions::domain::{
    Application, ApplicationStatus, DocumentRecord, FinalStatus, LifecycleAdvance, Student,
    StudentId, VerificationRecord,
};
use crate::workflows::admissions::repository::{
    InterviewRecord, NewApplicant, NewDocument, NewVerification, RecordStore, StatusOverride,
    StoreCounts, StoreError, StudentSummary,
};

/// Process-local store. Every operation runs under one lock, which gives the same atomicity the
/// SQLite store gets from transactions.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    next_student: u64,
    next_document: u64,
    next_verification: u64,
    students: BTreeMap<StudentId, Student>,
    applications: BTreeMap<StudentId, Application>,
    documents: Vec<DocumentRecord>,
    verifications: Vec<VerificationRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("record store lock poisoned".to_string()))
    }
}

impl Tables {
    fn student_mut(&mut self, id: StudentId) -> Result<&mut Student, StoreError> {
        self.students.get_mut(&id).ok_or(StoreError::NotFound)
    }

    fn push_document(&mut self, id: StudentId, document: NewDocument) -> DocumentRecord {
        self.next_document += 1;
        let record = DocumentRecord {
            id: self.next_document,
            student_id: id,
            name: document.name,
            storage_path: document.storage_path,
            document_type: document.document_type,
            size_bytes: document.size_bytes,
            uploaded_at: Utc::now(),
        };
        self.documents.push(record.clone());
        record
    }
}

impl RecordStore for MemoryRecordStore {
    fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .students
            .values()
            .any(|student| student.email.eq_ignore_ascii_case(email)))
    }

    fn create_applicant(&self, applicant: NewApplicant) -> Result<StudentId, StoreError> {
        let mut tables = self.tables()?;
        if tables
            .students
            .values()
            .any(|student| student.email.eq_ignore_ascii_case(&applicant.email))
        {
            return Err(StoreError::DuplicateEmail);
        }

        tables.next_student += 1;
        let id = StudentId(tables.next_student);
        tables.students.insert(
            id,
            Student {
                id,
                name: applicant.name,
                email: applicant.email,
                phone: applicant.phone,
                program: applicant.program,
                cet_score: applicant.cet_score,
                cet_rank: applicant.cet_rank,
                is_eligible: applicant.is_eligible,
                progress: applicant.progress,
                status: ApplicationStatus::Submitted,
                created_at: Utc::now(),
            },
        );
        tables.applications.insert(
            id,
            Application::new(id, applicant.academic_year, applicant.cet_score),
        );
        Ok(id)
    }

    fn fetch_student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        Ok(self.tables()?.students.get(&id).cloned())
    }

    fn fetch_application(&self, id: StudentId) -> Result<Option<Application>, StoreError> {
        Ok(self.tables()?.applications.get(&id).cloned())
    }

    fn record_uploads(
        &self,
        id: StudentId,
        documents: Vec<NewDocument>,
        advance: LifecycleAdvance,
    ) -> Result<(Vec<DocumentRecord>, Student), StoreError> {
        let mut tables = self.tables()?;
        tables.student_mut(id)?;

        let stored: Vec<DocumentRecord> = documents
            .into_iter()
            .map(|document| tables.push_document(id, document))
            .collect();
        let student = tables.student_mut(id)?;
        student.advance(advance);
        Ok((stored, student.clone()))
    }

    fn record_verification(
        &self,
        id: StudentId,
        document: NewDocument,
        verification: NewVerification,
        advance: LifecycleAdvance,
    ) -> Result<(VerificationRecord, Student), StoreError> {
        let mut tables = self.tables()?;
        tables.student_mut(id)?;

        tables.push_document(id, document);
        tables.next_verification += 1;
        let record = VerificationRecord {
            id: tables.next_verification,
            student_id: id,
            document_type: verification.document_type,
            status: verification.status,
            confidence: verification.confidence,
            verified_at: Utc::now(),
        };
        tables.verifications.push(record.clone());

        let student = tables.student_mut(id)?;
        student.advance(advance);
        Ok((record, student.clone()))
    }

    fn overwrite_status(
        &self,
        id: StudentId,
        update: StatusOverride,
    ) -> Result<Student, StoreError> {
        let mut tables = self.tables()?;
        let student = tables.student_mut(id)?;
        if !student.status.can_transition_to(update.status) {
            return Err(StoreError::TransitionRefused {
                from: student.status,
                to: update.status,
            });
        }
        student.status = update.status;
        student.progress = update.progress;
        let student = student.clone();

        if let (Some(final_status), Some(application)) =
            (update.final_status, tables.applications.get_mut(&id))
        {
            application.final_status = final_status;
        }
        Ok(student)
    }

    fn record_interview(
        &self,
        id: StudentId,
        interview: InterviewRecord,
    ) -> Result<Application, StoreError> {
        let mut tables = self.tables()?;
        let application = tables
            .applications
            .get_mut(&id)
            .ok_or(StoreError::NotFound)?;
        application.interview_date = Some(interview.date);
        application.interview_score = Some(interview.score);
        if interview.remarks.is_some() {
            application.remarks = interview.remarks;
        }
        Ok(application.clone())
    }

    fn documents(&self, id: StudentId) -> Result<Vec<DocumentRecord>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .documents
            .iter()
            .filter(|document| document.student_id == id)
            .cloned()
            .collect())
    }

    fn verifications(&self, id: StudentId) -> Result<Vec<VerificationRecord>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .verifications
            .iter()
            .rev()
            .filter(|record| record.student_id == id)
            .cloned()
            .collect())
    }

    fn search_students(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<StudentSummary>, StoreError> {
        let needle = query.to_lowercase();
        let tables = self.tables()?;
        Ok(tables
            .students
            .values()
            .rev()
            .filter(|student| {
                needle.is_empty()
                    || student.name.to_lowercase().contains(&needle)
                    || student.email.to_lowercase().contains(&needle)
                    || student.id.to_string() == needle
            })
            .take(limit)
            .map(StudentSummary::from)
            .collect())
    }

    fn stats(&self) -> Result<StoreCounts, StoreError> {
        let tables = self.tables()?;
        Ok(StoreCounts {
            total_applications: tables.students.len() as u64,
            eligible_applications: tables
                .students
                .values()
                .filter(|student| student.is_eligible == Some(true))
                .count() as u64,
            verified_documents: tables
                .verifications
                .iter()
                .filter(|record| record.status.is_verified())
                .count() as u64,
            accepted_applications: tables
                .applications
                .values()
                .filter(|application| application.final_status == FinalStatus::Accepted)
                .count() as u64,
        })
    }
}
