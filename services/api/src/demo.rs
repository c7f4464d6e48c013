use crate::infra::parse_academic_year;
use admission::error::AppError;
use admission::storage::{MemoryRecordStore, MemoryVault};
use admission::workflows::admissions::{
    AcademicYear, AdmissionLifecycleService, CetSubmission, CutoffSource, CutoffTable,
    FixedConfidenceScorer, LifecycleError, LifecycleSettings, StatusUpdate, UploadedFile,
};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct CutoffArgs {
    /// CSV export to read instead of the built-in table
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Academic year to list (defaults to 2024-25)
    #[arg(long, value_parser = parse_academic_year)]
    pub(crate) year: Option<AcademicYear>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Applicant email used for the walkthrough
    #[arg(long, default_value = "demo.applicant@example.com")]
    pub(crate) email: String,
    /// CET rank submitted with the application
    #[arg(long, default_value_t = 4500)]
    pub(crate) rank: i64,
}

pub(crate) fn run_cutoff_listing(args: CutoffArgs) -> Result<(), AppError> {
    let CutoffArgs { csv, year } = args;
    let year = year.unwrap_or_default();

    let table = match &csv {
        Some(path) => CutoffTable::from_path(path)?,
        None => CutoffTable::seeded(),
    };

    let entries = table.cutoffs_for_year(&year)?;
    println!("CET cutoffs for {year}");
    match &csv {
        Some(path) => println!("Data source: {}", path.display()),
        None => println!("Data source: built-in table"),
    }

    if entries.is_empty() {
        println!("\nNo cutoffs published for {year}");
        return Ok(());
    }

    println!();
    for entry in &entries {
        println!(
            "- {} [{}]: rank <= {}",
            entry.program, entry.category, entry.rank_cutoff
        );
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { email, rank } = args;
    let service = AdmissionLifecycleService::new(
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryVault::new()),
        Arc::new(CutoffTable::seeded()),
        Arc::new(FixedConfidenceScorer(85.0)),
        LifecycleSettings::default(),
    );

    println!("Admission lifecycle demo ({})", service.academic_year());

    let outcome = match service.submit_cet(CetSubmission {
        name: "Demo Applicant".to_string(),
        email,
        cet_score: Some(142),
        cet_rank: Some(rank),
        program: "CS".to_string(),
    }) {
        Ok(outcome) => outcome,
        Err(LifecycleError::Intake(err)) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    let id = outcome.student_id;
    println!(
        "  Submitted student {id}: {}",
        if outcome.eligible {
            "eligible for CS"
        } else {
            "not eligible for CS"
        }
    );

    let upload = service.upload_documents(
        id,
        vec![UploadedFile::new(
            "marksheet.pdf",
            Some("application/pdf"),
            b"%PDF-1.7 demo".to_vec(),
        )],
    )?;
    println!(
        "  Uploaded {} document(s), progress {}%",
        upload.accepted.len(),
        upload.progress_percentage
    );

    let verification = service.verify_document(
        id,
        Some("12th".to_string()),
        Some(UploadedFile::new(
            "12th.pdf",
            Some("application/pdf"),
            b"%PDF-1.7 demo".to_vec(),
        )),
    )?;
    println!(
        "  Verification: {} at {}% confidence, progress {}%",
        verification.verification_status.label(),
        verification.ai_confidence,
        verification.progress_percentage
    );

    let decided = service.update_status(
        id,
        StatusUpdate {
            status: "accepted".to_string(),
            progress: 100,
        },
    )?;
    println!(
        "  Final decision: {} ({}%)",
        decided.application_status, decided.progress_percentage
    );

    let stats = service.stats()?;
    println!(
        "\nPortal stats: {} application(s), {}% eligible, {}% accepted",
        stats.total_applications, stats.eligibility_rate, stats.acceptance_rate
    );

    Ok(())
}
