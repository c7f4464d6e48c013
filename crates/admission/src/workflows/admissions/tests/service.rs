use super::common::*;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::NaiveDate;

use crate::storage::{MemoryRecordStore, MemoryVault};
use crate::workflows::admissions::domain::{
    ApplicationStatus, Category, EligibilityQuery, FinalStatus, InterviewUpdate, StatusUpdate,
    StudentId, UploadedFile, VerificationStatus,
};
use crate::workflows::admissions::intake::{IntakeError, RejectionReason, UploadPolicy};
use crate::workflows::admissions::repository::{RecordStore, StoreError, VaultError};
use crate::workflows::admissions::LifecycleError;

#[test]
fn asha_moves_through_the_applicant_milestones() {
    let (service, store, vault) = build_service();

    let id = service.submit(asha()).expect("submission accepted");
    assert_eq!(id, StudentId(1));
    let view = service.status(id).expect("status");
    assert_eq!(view.progress_percentage.value(), 25);
    assert_eq!(view.application_status, ApplicationStatus::Submitted);
    assert_eq!(view.email, "asha@x.com");
    assert_eq!(view.program.as_str(), "CS");

    let first = service
        .upload_documents(id, vec![pdf("a.pdf")])
        .expect("first upload");
    assert_eq!(first.progress_percentage.value(), 50);

    let second = service
        .upload_documents(id, vec![pdf("b.pdf"), pdf("c.pdf")])
        .expect("second upload");
    assert_eq!(second.progress_percentage.value(), 75);
    assert_eq!(second.accepted.len(), 2);

    let verified = service
        .verify_document(id, Some("10th".to_string()), Some(pdf("marks.pdf")))
        .expect("verification");
    assert_eq!(verified.verification_status, VerificationStatus::AiVerified);
    assert_eq!(verified.ai_confidence, 85);
    assert_eq!(verified.progress_percentage.value(), 90);

    let student = store.fetch_student(id).expect("fetch").expect("present");
    assert_eq!(student.status, ApplicationStatus::Verified);
    assert_eq!(service.documents(id).expect("documents").len(), 4);
    assert_eq!(vault.len(), 4);

    let history = service.verification_history(id).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].document_type, "10th");
    assert_eq!(history[0].confidence, 85.0);
}

#[test]
fn uploads_never_pass_their_cap() {
    let (service, _store, _vault) = build_service();
    let id = service.submit(asha()).expect("submitted");

    for _ in 0..4 {
        service
            .upload_documents(id, vec![pdf("scan.pdf")])
            .expect("upload");
    }
    assert_eq!(service.status(id).expect("status").progress_percentage.value(), 75);

    for _ in 0..3 {
        service
            .verify_document(id, Some("12th".to_string()), Some(pdf("marks.pdf")))
            .expect("verify");
    }
    assert_eq!(service.status(id).expect("status").progress_percentage.value(), 90);
}

#[test]
fn ineligible_cet_rank_still_submits_with_zero_progress() {
    let (service, store, _vault) = build_service();

    let outcome = service
        .submit_cet(cet_submission("ravi@x.com", 6000))
        .expect("ineligible submission still succeeds");
    assert!(!outcome.eligible);

    let student = store
        .fetch_student(outcome.student_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(student.progress.value(), 0);
    assert_eq!(student.is_eligible, Some(false));
    assert_eq!(student.cet_rank, Some(6000));

    let application = store
        .fetch_application(outcome.student_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(application.entrance_score, Some(150));
}

#[test]
fn eligible_cet_rank_at_the_cutoff_starts_at_submitted() {
    let (service, store, _vault) = build_service();

    let outcome = service
        .submit_cet(cet_submission("meera@x.com", 5000))
        .expect("submitted");
    assert!(outcome.eligible);
    let student = store
        .fetch_student(outcome.student_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(student.progress.value(), 25);
}

#[test]
fn missing_cutoff_fails_both_eligibility_paths() {
    let (service, store, _vault) = build_service();

    let mut submission = cet_submission("zoe@x.com", 100);
    submission.program = "XYZ".to_string();
    match service.submit_cet(submission) {
        Err(LifecycleError::CutoffNotFound { program, category, .. }) => {
            assert_eq!(program.as_str(), "XYZ");
            assert_eq!(category, Category::General);
        }
        other => panic!("expected missing cutoff, got {other:?}"),
    }
    assert_eq!(store.stats().expect("stats").total_applications, 0);

    let query = EligibilityQuery {
        cet_rank: Some(100),
        program: "cs".to_string(),
        category: Some("obc".to_string()),
    };
    assert!(matches!(
        service.check_eligibility(query),
        Err(LifecycleError::CutoffNotFound { .. })
    ));
}

#[test]
fn check_eligibility_echoes_the_decision() {
    let (service, _store, _vault) = build_service();

    let decision = service
        .check_eligibility(EligibilityQuery {
            cet_rank: Some(4500),
            program: "cs".to_string(),
            category: None,
        })
        .expect("decision");
    assert!(decision.eligible);
    assert_eq!(decision.cutoff, 5000);
    assert_eq!(decision.rank, 4500);
    assert_eq!(decision.category, Category::General);
}

#[test]
fn duplicate_email_is_rejected_case_insensitively() {
    let (service, _store, _vault) = build_service();
    service.submit(asha()).expect("first submission");

    let mut again = asha();
    again.email = "  ASHA@X.com ".to_string();
    assert!(matches!(
        service.submit(again),
        Err(LifecycleError::Store(StoreError::DuplicateEmail))
    ));
    assert!(matches!(
        service.submit_cet(cet_submission("asha@x.com", 10)),
        Err(LifecycleError::Store(StoreError::DuplicateEmail))
    ));
}

#[test]
fn concurrent_duplicate_submissions_admit_exactly_one() {
    let (service, store, _vault) = build_service();
    let service = Arc::new(service);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            thread::spawn(move || service.submit(asha()))
        })
        .collect();
    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread completes"))
        .collect();

    let successes = results.iter().filter(|result| result.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|result| matches!(result, Err(LifecycleError::Store(StoreError::DuplicateEmail))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(store.stats().expect("stats").total_applications, 1);
}

#[test]
fn validation_reports_every_failing_field() {
    let (service, _store, _vault) = build_service();

    let outcome = service.submit_cet(Default::default());
    match outcome {
        Err(LifecycleError::Intake(IntakeError::Validation(errors))) => {
            let fields: Vec<_> = errors.fields().collect();
            assert_eq!(fields, vec!["name", "email", "program", "cetScore", "cetRank"]);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn empty_upload_is_rejected_before_touching_the_store() {
    let (service, _store, _vault) = build_service();
    let id = service.submit(asha()).expect("submitted");

    assert!(matches!(
        service.upload_documents(id, Vec::new()),
        Err(LifecycleError::Intake(IntakeError::NoFiles))
    ));
    assert!(matches!(
        service.verify_document(id, Some("10th".to_string()), None),
        Err(LifecycleError::Intake(IntakeError::NoFile))
    ));
}

#[test]
fn oversize_file_rejects_the_whole_batch() {
    let (service, store, vault) = build_service_with(85.0, UploadPolicy::new(16, 5));
    let id = service.submit(asha()).expect("submitted");

    let big = UploadedFile::new("huge.pdf", Some("application/pdf"), vec![7; 17]);
    match service.upload_documents(id, vec![pdf("ok.pdf"), big]) {
        Err(LifecycleError::Intake(IntakeError::FileRejected(rejected))) => {
            assert_eq!(rejected.len(), 1);
            assert_eq!(rejected[0].name, "huge.pdf");
            assert!(matches!(
                rejected[0].reason,
                RejectionReason::TooLarge { size: 17, limit: 16 }
            ));
        }
        other => panic!("expected rejected file, got {other:?}"),
    }

    assert!(store.documents(id).expect("documents").is_empty());
    assert!(vault.is_empty());
    assert_eq!(service.status(id).expect("status").progress_percentage.value(), 25);
}

#[test]
fn unsupported_types_are_named_in_the_rejection() {
    let (service, _store, _vault) = build_service();
    let id = service.submit(asha()).expect("submitted");

    let script = UploadedFile::new("run.exe", None, vec![0x4d, 0x5a]);
    match service.upload_documents(id, vec![script]) {
        Err(LifecycleError::Intake(IntakeError::FileRejected(rejected))) => {
            assert!(matches!(
                rejected[0].reason,
                RejectionReason::UnsupportedType { .. }
            ));
        }
        other => panic!("expected unsupported type, got {other:?}"),
    }
}

#[test]
fn too_many_files_is_rejected() {
    let (service, _store, _vault) = build_service_with(85.0, UploadPolicy::new(1024, 2));
    let id = service.submit(asha()).expect("submitted");

    let files = vec![pdf("a.pdf"), pdf("b.pdf"), pdf("c.pdf")];
    assert!(matches!(
        service.upload_documents(id, files),
        Err(LifecycleError::Intake(IntakeError::TooManyFiles { limit: 2, received: 3 }))
    ));
}

#[test]
fn unknown_student_is_not_found_everywhere() {
    let (service, _store, vault) = build_service();
    let ghost = StudentId(42);

    assert!(matches!(
        service.status(ghost),
        Err(LifecycleError::Store(StoreError::NotFound))
    ));
    assert!(matches!(
        service.upload_documents(ghost, vec![pdf("a.pdf")]),
        Err(LifecycleError::Store(StoreError::NotFound))
    ));
    assert!(matches!(
        service.verify_document(ghost, Some("10th".to_string()), Some(pdf("a.pdf"))),
        Err(LifecycleError::Store(StoreError::NotFound))
    ));
    assert!(matches!(
        service.documents(ghost),
        Err(LifecycleError::Store(StoreError::NotFound))
    ));
    assert!(vault.is_empty());
}

#[test]
fn low_confidence_leaves_the_document_pending() {
    let (service, store, _vault) = build_service_with(80.0, UploadPolicy::default());
    let id = service.submit(asha()).expect("submitted");

    let outcome = service
        .verify_document(id, Some("aadhar".to_string()), Some(pdf("id.pdf")))
        .expect("verification recorded");
    assert_eq!(outcome.verification_status, VerificationStatus::Pending);
    assert_eq!(outcome.progress_percentage.value(), 40);

    let student = store.fetch_student(id).expect("fetch").expect("present");
    assert_eq!(student.status, ApplicationStatus::Submitted);
    assert_eq!(store.stats().expect("stats").verified_documents, 0);
}

#[test]
fn admin_override_sets_progress_that_applicant_paths_keep() {
    let (service, _store, _vault) = build_service();
    let id = service.submit(asha()).expect("submitted");

    let view = service
        .update_status(
            id,
            StatusUpdate {
                status: "verified".to_string(),
                progress: 100,
            },
        )
        .expect("override");
    assert_eq!(view.progress_percentage.value(), 100);
    assert_eq!(view.application_status, ApplicationStatus::Verified);

    let upload = service
        .upload_documents(id, vec![pdf("late.pdf")])
        .expect("upload after override");
    assert_eq!(upload.progress_percentage.value(), 100);

    let view = service.status(id).expect("status");
    assert_eq!(view.application_status, ApplicationStatus::Verified);
}

#[test]
fn terminal_statuses_reject_further_transitions() {
    let (service, store, _vault) = build_service();
    let id = service.submit(asha()).expect("submitted");

    let accepted = service
        .update_status(
            id,
            StatusUpdate {
                status: "accepted".to_string(),
                progress: 100,
            },
        )
        .expect("accept");
    assert_eq!(accepted.final_status, Some(FinalStatus::Accepted));
    assert_eq!(store.stats().expect("stats").accepted_applications, 1);

    match service.update_status(
        id,
        StatusUpdate {
            status: "submitted".to_string(),
            progress: 10,
        },
    ) {
        Err(LifecycleError::InvalidTransition { from, to }) => {
            assert_eq!(from, ApplicationStatus::Accepted);
            assert_eq!(to, ApplicationStatus::Submitted);
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }

    let upload = service
        .upload_documents(id, vec![pdf("late.pdf")])
        .expect("uploads still recorded");
    assert_eq!(upload.progress_percentage.value(), 100);
    assert_eq!(
        service.status(id).expect("status").application_status,
        ApplicationStatus::Accepted
    );
}

#[test]
fn override_rejects_out_of_range_progress() {
    let (service, _store, _vault) = build_service();
    let id = service.submit(asha()).expect("submitted");

    match service.update_status(
        id,
        StatusUpdate {
            status: "shortlisted".to_string(),
            progress: 101,
        },
    ) {
        Err(LifecycleError::Intake(IntakeError::Validation(errors))) => {
            let fields: Vec<_> = errors.fields().collect();
            assert_eq!(fields, vec!["status", "progress"]);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn interview_is_recorded_on_the_application() {
    let (service, _store, _vault) = build_service();
    let id = service.submit(asha()).expect("submitted");

    let view = service
        .record_interview(
            id,
            InterviewUpdate {
                date: NaiveDate::from_ymd_opt(2024, 6, 12).expect("valid date"),
                score: 78,
                remarks: Some("  strong fundamentals ".to_string()),
            },
        )
        .expect("interview recorded");
    assert_eq!(view.interview_score, Some(78));
    assert_eq!(view.remarks.as_deref(), Some("strong fundamentals"));
    assert_eq!(view.interview_date, NaiveDate::from_ymd_opt(2024, 6, 12));
}

#[test]
fn search_and_stats_cover_all_students() {
    let (service, _store, _vault) = build_service();
    service.submit(asha()).expect("asha");
    service
        .submit_cet(cet_submission("ravi@x.com", 4000))
        .expect("ravi");
    service
        .submit_cet(cet_submission("kiran@x.com", 9000))
        .expect("kiran");

    let hits = service.search("ravi@").expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].email, "ravi@x.com");
    assert_eq!(service.search("").expect("search all").len(), 3);

    let stats = service.stats().expect("stats");
    assert_eq!(stats.total_applications, 3);
    assert_eq!(stats.eligible_applications, 1);
    assert_eq!(stats.eligibility_rate, 33);
}

#[test]
fn cutoffs_default_to_the_configured_year() {
    let (service, _store, _vault) = build_service();

    let current = service.cutoffs(None).expect("cutoffs");
    assert_eq!(current.len(), 5);
    let other = crate::workflows::admissions::domain::AcademicYear::parse("2023-24")
        .expect("valid year");
    assert!(service.cutoffs(Some(&other)).expect("cutoffs").is_empty());
}

#[test]
fn storage_failures_surface_as_store_errors() {
    let service = service_over(Arc::new(UnavailableStore), Arc::new(MemoryVault::new()));
    assert!(matches!(
        service.submit(asha()),
        Err(LifecycleError::Store(StoreError::Unavailable(_)))
    ));
}

#[test]
fn vault_failures_abort_the_upload() {
    let store = Arc::new(MemoryRecordStore::new());
    let service = service_over(store.clone(), Arc::new(FullVault));
    let id = service.submit(asha()).expect("submitted");

    assert!(matches!(
        service.upload_documents(id, vec![pdf("a.pdf")]),
        Err(LifecycleError::Vault(_))
    ));
    assert!(store.documents(id).expect("documents").is_empty());
    assert_eq!(
        store.fetch_student(id).expect("fetch").expect("present").progress.value(),
        25
    );
}

#[test]
fn back_to_back_uploads_of_one_name_keep_every_copy() {
    let (service, store, vault) = build_service();
    let id = service.submit(asha()).expect("submitted");

    for round in 0..20u8 {
        for copy in [b'a', b'b'] {
            let file = UploadedFile::new(
                "marks.pdf",
                Some("application/pdf"),
                vec![b'%', b'P', b'D', b'F', round, copy],
            );
            service.upload_documents(id, vec![file]).expect("upload");
        }
    }

    let documents = store.documents(id).expect("documents");
    assert_eq!(documents.len(), 40);
    assert_eq!(vault.len(), 40);
    for (position, document) in documents.iter().enumerate() {
        let key = document
            .storage_path
            .strip_prefix("memory://")
            .expect("memory vault path");
        let bytes = vault.get(key).expect("object stored");
        let round = u8::try_from(position / 2).expect("small round");
        let copy = if position % 2 == 0 { b'a' } else { b'b' };
        assert_eq!(bytes, vec![b'%', b'P', b'D', b'F', round, copy]);
    }
}

#[test]
fn taken_storage_keys_are_redrawn() {
    let store = Arc::new(MemoryRecordStore::new());
    let vault = Arc::new(CrowdedVault::refusing(2));
    let service = service_over(store.clone(), vault.clone());
    let id = service.submit(asha()).expect("submitted");

    let outcome = service
        .verify_document(id, Some("10th".to_string()), Some(pdf("10th.pdf")))
        .expect("stored after retries");
    assert_eq!(outcome.progress_percentage.value(), 40);
    assert_eq!(vault.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(vault.inner.len(), 1);
}

#[test]
fn persistently_taken_keys_abort_the_upload() {
    let store = Arc::new(MemoryRecordStore::new());
    let vault = Arc::new(CrowdedVault::refusing(u32::MAX));
    let service = service_over(store.clone(), vault.clone());
    let id = service.submit(asha()).expect("submitted");

    assert!(matches!(
        service.upload_documents(id, vec![pdf("a.pdf")]),
        Err(LifecycleError::Vault(VaultError::KeyTaken(_)))
    ));
    assert_eq!(vault.attempts.load(Ordering::SeqCst), 4);
    assert!(store.documents(id).expect("documents").is_empty());
}

#[test]
fn racing_decisions_leave_exactly_one_standing() {
    let (service, store, _vault) = build_service();
    let service = Arc::new(service);

    for round in 0..25 {
        let id = service
            .submit_cet(cet_submission(&format!("applicant{round}@x.com"), 100))
            .expect("submitted")
            .student_id;
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["accepted", "rejected"]
            .into_iter()
            .map(|status| {
                let service = service.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let outcome = service.update_status(
                        id,
                        StatusUpdate {
                            status: status.to_string(),
                            progress: 100,
                        },
                    );
                    (status, outcome)
                })
            })
            .collect();
        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread completes"))
            .collect();

        let winners: Vec<_> = outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_ok())
            .map(|(status, _)| *status)
            .collect();
        assert_eq!(winners.len(), 1, "round {round}: {outcomes:?}");
        assert!(outcomes.iter().any(|(_, outcome)| matches!(
            outcome,
            Err(LifecycleError::InvalidTransition { .. })
        )));

        let student = store.fetch_student(id).expect("fetch").expect("present");
        assert_eq!(student.status.label(), winners[0]);
    }
}
