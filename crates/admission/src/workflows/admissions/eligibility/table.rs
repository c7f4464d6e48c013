use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::{CutoffError, CutoffSource};
use crate::workflows::admissions::domain::{AcademicYear, Category, CutoffEntry, ProgramCode};

/// General-category cutoffs published for 2024-25.
const SEED_2024_25: [(&str, u32); 5] = [
    ("CS", 5000),
    ("ME", 8000),
    ("EE", 7000),
    ("CE", 10000),
    ("AE", 6000),
];

type CutoffKey = (ProgramCode, AcademicYear, Category);

/// In-memory cutoff table keyed by program, year, and category.
#[derive(Debug, Clone, Default)]
pub struct CutoffTable {
    entries: BTreeMap<CutoffKey, u32>,
}

impl CutoffTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The published 2024-25 general cutoffs.
    pub fn seeded() -> Self {
        let year = AcademicYear::default();
        let mut table = Self::new();
        for (code, cutoff) in SEED_2024_25 {
            if let Some(program) = ProgramCode::parse(code) {
                table.insert(program, year.clone(), Category::General, cutoff);
            }
        }
        table
    }

    pub fn insert(
        &mut self,
        program: ProgramCode,
        academic_year: AcademicYear,
        category: Category,
        rank_cutoff: u32,
    ) {
        self.entries
            .insert((program, academic_year, category), rank_cutoff);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CutoffError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load a table laid out one row per program and year, with one optional column per
    /// category: `department_code,academic_year,general_rank_cutoff,obc_rank_cutoff,...`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CutoffError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut table = Self::new();

        for (index, record) in csv_reader.deserialize::<CutoffRow>().enumerate() {
            let row = record?;
            // Header is line 1.
            let line = index as u64 + 2;
            let program = ProgramCode::parse(&row.department_code).ok_or_else(|| {
                CutoffError::InvalidRow {
                    line,
                    message: format!("invalid department code '{}'", row.department_code),
                }
            })?;
            let academic_year =
                AcademicYear::parse(&row.academic_year).ok_or_else(|| CutoffError::InvalidRow {
                    line,
                    message: format!("invalid academic year '{}'", row.academic_year),
                })?;

            let columns = [
                (Category::General, row.general_rank_cutoff),
                (Category::Obc, row.obc_rank_cutoff),
                (Category::Sc, row.sc_rank_cutoff),
                (Category::St, row.st_rank_cutoff),
            ];
            let mut any = false;
            for (category, cutoff) in columns {
                if let Some(cutoff) = cutoff {
                    table.insert(program.clone(), academic_year.clone(), category, cutoff);
                    any = true;
                }
            }
            if !any {
                return Err(CutoffError::InvalidRow {
                    line,
                    message: format!("no cutoff columns populated for {program}"),
                });
            }
        }

        Ok(table)
    }
}

impl CutoffSource for CutoffTable {
    fn cutoff(
        &self,
        program: &ProgramCode,
        academic_year: &AcademicYear,
        category: Category,
    ) -> Result<Option<u32>, CutoffError> {
        let key = (program.clone(), academic_year.clone(), category);
        Ok(self.entries.get(&key).copied())
    }

    fn cutoffs_for_year(
        &self,
        academic_year: &AcademicYear,
    ) -> Result<Vec<CutoffEntry>, CutoffError> {
        Ok(self
            .entries
            .iter()
            .filter(|((_, year, _), _)| year == academic_year)
            .map(|((program, year, category), cutoff)| CutoffEntry {
                program: program.clone(),
                academic_year: year.clone(),
                category: *category,
                rank_cutoff: *cutoff,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct CutoffRow {
    department_code: String,
    academic_year: String,
    #[serde(default, deserialize_with = "empty_as_none")]
    general_rank_cutoff: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    obc_rank_cutoff: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    sc_rank_cutoff: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    st_rank_cutoff: Option<u32>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<u32>().map(Some).map_err(serde::de::Error::custom),
    }
}
