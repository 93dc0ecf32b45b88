use anyhow::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::models::{Snapshot, SymbolAlphabet};
use crate::patterns::PatternTable;

/// Export snapshots to JSON
pub fn export_to_json(snapshots: &[Snapshot], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshots)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Export snapshots to CSV
/// Format: game, round_id, history, history_len, predicted_label, confidence,
///         matched_length, positions
pub fn export_to_csv(snapshots: &[Snapshot], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "game",
        "round_id",
        "history",
        "history_len",
        "predicted_label",
        "confidence",
        "matched_length",
        "positions",
    ])?;

    for s in snapshots {
        wtr.write_record(&[
            s.game.clone(),
            s.round_id.as_ref().map(|r| r.to_string()).unwrap_or_default(),
            s.history.clone(),
            s.history.chars().count().to_string(),
            s.predicted_label.clone(),
            s.confidence.to_string(),
            s.matched_length.to_string(),
            format_positions(s.positions.as_deref()),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

fn format_positions(positions: Option<&[u8]>) -> String {
    match positions {
        Some(values) => values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" "),
        None => String::new(),
    }
}

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Game")]
    game: String,
    #[tabled(rename = "Round")]
    round: String,
    #[tabled(rename = "History")]
    history: String,
    #[tabled(rename = "Prediction")]
    prediction: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Positions")]
    positions: String,
}

/// Render snapshots as a terminal table
pub fn snapshot_table(snapshots: &[Snapshot]) -> String {
    let rows: Vec<SnapshotRow> = snapshots
        .iter()
        .map(|s| SnapshotRow {
            game: s.game.clone(),
            round: s.round_id.as_ref().map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
            history: if s.history.is_empty() { "-".to_string() } else { s.history.clone() },
            prediction: s.predicted_label.clone(),
            confidence: format!("{}%", s.confidence),
            positions: format_positions(s.positions.as_deref()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Pattern")]
    pattern: String,
    #[tabled(rename = "Len")]
    len: usize,
    #[tabled(rename = "Label")]
    label: String,
}

/// Render a pattern table in match order
pub fn pattern_table(table: &PatternTable, alphabet: &SymbolAlphabet) -> String {
    let rows: Vec<RuleRow> = table
        .iter()
        .enumerate()
        .map(|(i, rule)| RuleRow {
            index: i + 1,
            pattern: alphabet.render(rule.pattern),
            len: rule.pattern.len(),
            label: rule.label.to_string(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RoundId;

    fn snapshot() -> Snapshot {
        Snapshot {
            game: "sicbo".to_string(),
            round_id: Some(RoundId::from(42)),
            history: "TTX".to_string(),
            predicted_label: "Tài".to_string(),
            confidence: 33,
            matched_length: 3,
            positions: Some(vec![11, 13, 15, 18]),
            previous_total: None,
            dice: None,
        }
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.csv");
        export_to_csv(&[snapshot()], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert!(lines.next().unwrap().starts_with("game,round_id,history"));
        assert_eq!(lines.next().unwrap(), "sicbo,42,TTX,3,Tài,33,3,11 13 15 18");
    }

    #[test]
    fn test_json_export_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.json");
        export_to_json(&[snapshot()], &path).unwrap();

        let loaded: Vec<Snapshot> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, vec![snapshot()]);
    }

    #[test]
    fn test_snapshot_table_mentions_every_game() {
        let mut other = snapshot();
        other.game = "luck".to_string();
        other.positions = None;
        let rendered = snapshot_table(&[snapshot(), other]);
        assert!(rendered.contains("sicbo"));
        assert!(rendered.contains("luck"));
        assert!(rendered.contains("33%"));
    }
}
