use crate::table::dataset::Dataset;

/// Substring-based column recognition. This mirrors how the rest of the
/// pipeline talks about columns: "department-like" and "salary-like" are
/// name heuristics, not semantic analysis.
pub fn department_column(dataset: &Dataset) -> Option<usize> {
    dataset
        .columns()
        .iter()
        .position(|c| c.name.to_lowercase().contains("dept"))
}

/// First salary-like column. Callers that need numbers must additionally
/// check the column type; a textual "salary_notes" column still matches here.
pub fn salary_column(dataset: &Dataset) -> Option<usize> {
    dataset
        .columns()
        .iter()
        .position(|c| c.name.to_lowercase().contains("sal"))
}

/// First salary-like column that actually holds numbers.
pub fn numeric_salary_column(dataset: &Dataset) -> Option<usize> {
    dataset
        .columns()
        .iter()
        .position(|c| c.name.to_lowercase().contains("sal") && c.ty.is_numeric())
}
