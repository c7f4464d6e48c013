use super::common::*;

use crate::workflows::admissions::domain::{
    ApplicationStatus, Category, EligibilityQuery, StatusUpdate, UploadedFile,
};
use crate::workflows::admissions::intake::{IntakeError, IntakeGuard, RejectionReason, UploadPolicy};

fn guard() -> IntakeGuard {
    IntakeGuard::new(UploadPolicy::new(64, 3))
}

#[test]
fn applicant_is_normalized() {
    let mut submission = asha();
    submission.name = "  Asha Rao ".to_string();
    submission.email = " Asha@X.COM".to_string();
    submission.phone = Some("   ".to_string());

    let applicant = guard().applicant(&submission).expect("valid applicant");
    assert_eq!(applicant.name, "Asha Rao");
    assert_eq!(applicant.email, "asha@x.com");
    assert_eq!(applicant.phone, None);
    assert_eq!(applicant.program.as_str(), "CS");
}

#[test]
fn cet_score_bounds_are_inclusive() {
    let guard = guard();
    for (score, valid) in [(0, false), (1, true), (200, true), (201, false)] {
        let mut submission = cet_submission("ravi@x.com", 10);
        submission.cet_score = Some(score);
        assert_eq!(
            guard.cet_applicant(&submission).is_ok(),
            valid,
            "score {score}"
        );
    }
}

#[test]
fn rank_must_be_positive() {
    let guard = guard();
    for rank in [0, -5, i64::from(u32::MAX) + 1] {
        let submission = cet_submission("ravi@x.com", rank);
        match guard.cet_applicant(&submission) {
            Err(IntakeError::Validation(errors)) => {
                assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["cetRank"]);
            }
            other => panic!("rank {rank} should fail, got {other:?}"),
        }
    }
}

#[test]
fn eligibility_category_defaults_to_general() {
    let guard = guard();
    let query = EligibilityQuery {
        cet_rank: Some(12),
        program: "me".to_string(),
        category: None,
    };
    let validated = guard.eligibility_query(&query).expect("valid");
    assert_eq!(validated.category, Category::General);

    let query = EligibilityQuery {
        category: Some("NRI".to_string()),
        ..query
    };
    match guard.eligibility_query(&query) {
        Err(IntakeError::Validation(errors)) => {
            assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["category"]);
        }
        other => panic!("expected category error, got {other:?}"),
    }
}

#[test]
fn status_update_parses_the_closed_status_set() {
    let update = StatusUpdate {
        status: "documents_pending".to_string(),
        progress: 0,
    };
    let validated = guard().status_update(&update).expect("valid");
    assert_eq!(validated.status, ApplicationStatus::DocumentsPending);
    assert_eq!(validated.progress.value(), 0);

    let negative = StatusUpdate {
        status: "verified".to_string(),
        progress: -1,
    };
    assert!(guard().status_update(&negative).is_err());
}

#[test]
fn batch_screening_reports_every_rejected_file() {
    let files = vec![
        pdf("good.pdf"),
        UploadedFile::new("empty.png", Some("image/png"), Vec::new()),
        UploadedFile::new("notes.txt", Some("text/plain"), b"hello".to_vec()),
    ];
    match guard().screen_batch(files) {
        Err(IntakeError::FileRejected(rejected)) => {
            let names: Vec<_> = rejected.iter().map(|file| file.name.as_str()).collect();
            assert_eq!(names, vec!["empty.png", "notes.txt"]);
            assert_eq!(rejected[0].reason, RejectionReason::Empty);
            assert!(matches!(
                &rejected[1].reason,
                RejectionReason::UnsupportedType { detected } if detected == "text/plain"
            ));
        }
        other => panic!("expected rejections, got {other:?}"),
    }
}

#[test]
fn extension_and_declared_type_must_both_be_allowed() {
    let disguised = UploadedFile::new("invoice.pdf", Some("text/html"), b"<html>".to_vec());
    assert!(guard().screen_single(Some(disguised)).is_err());

    let renamed = UploadedFile::new("photo.gif", Some("image/png"), b"GIF89a".to_vec());
    assert!(guard().screen_single(Some(renamed)).is_err());

    let docx = UploadedFile::new("essay.docx", None, b"PK".to_vec());
    let screened = guard().screen_single(Some(docx)).expect("docx accepted");
    assert_eq!(
        screened.mime,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
}

#[test]
fn document_type_is_required_for_verification() {
    assert_eq!(guard().document_type(Some(" 10th ")).expect("valid"), "10th");
    assert!(matches!(
        guard().document_type(Some("  ")),
        Err(IntakeError::Validation(_))
    ));
    assert!(guard().document_type(None).is_err());
}

#[test]
fn validation_errors_serialize_as_field_list() {
    let mut submission = asha();
    submission.email = "not-an-email".to_string();
    match guard().applicant(&submission) {
        Err(IntakeError::Validation(errors)) => {
            let value = serde_json::to_value(&errors).expect("serializes");
            assert_eq!(
                value,
                serde_json::json!([{ "field": "email", "message": "Valid email is required" }])
            );
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}
