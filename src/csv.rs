use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

use crate::db::{find_duplicate_athlete, resolve_team_reference};
use crate::error::AppError;

/// Splits one CSV line into fields, honoring double-quote escaping.
pub fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == ',' && !in_quotes {
            out.push(buf);
            buf = String::new();
            i += 1;
            continue;
        }
        buf.push(ch);
        i += 1;
    }
    out.push(buf);
    out
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Column positions resolved from the header row. Only the name columns
/// are required.
struct HeaderMap {
    first_name: usize,
    last_name: usize,
    team: Option<usize>,
    grade: Option<usize>,
    gender: Option<usize>,
}

impl HeaderMap {
    fn resolve(header: &[String]) -> Result<Self, AppError> {
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (idx, name) in header.iter().enumerate() {
            by_name.insert(name.trim().to_ascii_lowercase(), idx);
        }

        let first_name = by_name
            .get("first_name")
            .or_else(|| by_name.get("first"))
            .copied()
            .ok_or_else(|| {
                AppError::Validation("CSV is missing a first_name column".to_string())
            })?;
        let last_name = by_name
            .get("last_name")
            .or_else(|| by_name.get("last"))
            .copied()
            .ok_or_else(|| AppError::Validation("CSV is missing a last_name column".to_string()))?;

        let team = by_name
            .get("team_name")
            .or_else(|| by_name.get("team_id"))
            .or_else(|| by_name.get("team"))
            .copied();

        Ok(Self {
            first_name,
            last_name,
            team,
            grade: by_name.get("grade").copied(),
            gender: by_name.get("gender").copied(),
        })
    }
}

fn field(fields: &[String], idx: usize) -> String {
    fields.get(idx).map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Per-reason outcome counts for a roster import.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct RosterImportReport {
    pub imported: u32,
    pub skipped_missing_name: u32,
    pub skipped_duplicate_in_file: u32,
    pub skipped_duplicate_in_db: u32,
    pub unresolved_teams: u32,
}

/// Imports a header-bearing roster CSV inside one transaction. Rows with
/// missing names are skipped; team references resolve by exact name or
/// numeric id (unresolved ones import without a team); duplicates under
/// the case-insensitive per-team identity, in the file or already in the
/// database, are skipped and counted. Any hard failure rolls the whole
/// import back.
#[instrument(skip_all)]
pub async fn import_roster_csv(
    pool: &Pool<Sqlite>,
    text: &str,
) -> Result<RosterImportReport, AppError> {
    info!("Importing roster CSV");

    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header_line = lines
        .next()
        .ok_or_else(|| AppError::Validation("CSV is empty".to_string()))?;
    let header = HeaderMap::resolve(&parse_csv_record(header_line))?;

    let mut report = RosterImportReport::default();
    let mut seen_identities: HashSet<(String, String, Option<i64>)> = HashSet::new();
    let mut team_cache: HashMap<String, Option<i64>> = HashMap::new();

    let mut tx = pool.begin().await?;

    for line in lines {
        let fields = parse_csv_record(line);

        let first_name = field(&fields, header.first_name);
        let last_name = field(&fields, header.last_name);
        if first_name.is_empty() || last_name.is_empty() {
            report.skipped_missing_name += 1;
            continue;
        }

        let team_ref = header.team.map(|idx| field(&fields, idx)).unwrap_or_default();
        let team_id = if team_ref.is_empty() {
            None
        } else {
            match team_cache.get(&team_ref) {
                Some(cached) => *cached,
                None => {
                    let resolved = resolve_team_reference(&mut *tx, &team_ref).await?;
                    if resolved.is_none() {
                        report.unresolved_teams += 1;
                    }
                    team_cache.insert(team_ref.clone(), resolved);
                    resolved
                }
            }
        };

        let grade = header
            .grade
            .map(|idx| field(&fields, idx))
            .and_then(|v| v.parse::<i64>().ok());
        let gender = header
            .gender
            .map(|idx| field(&fields, idx))
            .filter(|v| !v.is_empty());

        let identity = (
            first_name.to_lowercase(),
            last_name.to_lowercase(),
            team_id,
        );
        if seen_identities.contains(&identity) {
            report.skipped_duplicate_in_file += 1;
            continue;
        }

        let existing =
            find_duplicate_athlete(&mut *tx, &first_name, &last_name, team_id).await?;

        if existing.is_some() {
            report.skipped_duplicate_in_db += 1;
            seen_identities.insert(identity);
            continue;
        }

        let res = sqlx::query(
            "INSERT INTO athletes (first_name, last_name, grade, gender, team_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&first_name)
        .bind(&last_name)
        .bind(grade)
        .bind(&gender)
        .bind(team_id)
        .execute(&mut *tx)
        .await;

        match res {
            Ok(_) => {
                report.imported += 1;
                seen_identities.insert(identity);
            }
            Err(err) => {
                let err = AppError::from(err);
                if err.is_unique_violation() {
                    // The identity index rejected the row; count it as a
                    // database duplicate and keep going.
                    report.skipped_duplicate_in_db += 1;
                    seen_identities.insert(identity);
                } else {
                    return Err(err);
                }
            }
        }
    }

    tx.commit().await?;

    info!(
        imported = report.imported,
        duplicates_in_file = report.skipped_duplicate_in_file,
        duplicates_in_db = report.skipped_duplicate_in_db,
        missing_names = report.skipped_missing_name,
        unresolved_teams = report.unresolved_teams,
        "Roster import complete"
    );

    Ok(report)
}
