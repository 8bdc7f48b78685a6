//! CSV export of the draw history

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use drawdesk_core::{DrawHistoryEntry, DrawResult, TicketOwner};

const HEADER: [&str; 6] = ["Draw #", "Timestamp", "Category", "Ticket Number", "Owner Name", "Prize Name"];

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}
fn row<I: IntoIterator<Item = S>, S: AsRef<str>>(cells: I) -> String {
    cells.into_iter()
        .map(|c| quote(c.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Name shown for the owner of a result. `-` when nobody owns the ticket.
fn owner_cell(result: &DrawResult, owners: &[TicketOwner]) -> String {
    result.owner_name.clone()
        .or_else(|| owners.iter().find(|o| o.owns(&result.ticket)).map(|o| o.name.clone()))
        .unwrap_or_else(|| "-".to_string())
}

/// One line per result. Draws are numbered from the oldest (1) and listed most recent first.
pub fn history_csv(history: &[DrawHistoryEntry], owners: &[TicketOwner]) -> String {
    let mut lines = vec![row(HEADER)];
    for (index, entry) in history.iter().enumerate() {
        let number = (history.len() - index).to_string();
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        for result in &entry.results {
            lines.push(row([
                number.as_str(),
                timestamp.as_str(),
                result.category.as_str(),
                result.ticket.as_str(),
                owner_cell(result, owners).as_str(),
                result.prize.name.as_str(),
            ]));
        }
    }
    lines.join("\n")
}

pub fn file_name<Tz: TimeZone>(now: &DateTime<Tz>) -> String
    where Tz::Offset: std::fmt::Display
{
    format!("raffle-results-{}.csv", now.format("%Y-%m-%d-%H%M%S"))
}

/// Writes the history in `dir` and returns the path of the file.
pub async fn export_history<P: AsRef<Path>>(dir: P, history: &[DrawHistoryEntry], owners: &[TicketOwner]) -> Result<PathBuf, String> {
    if history.is_empty() {
        return Err("No draw to export".to_string());
    }
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await
        .map_err(|e| format!("Unable to create {}: {}", dir.to_string_lossy(), e))?;
    let path = dir.join(file_name(&chrono::Local::now()));
    tokio::fs::write(&path, history_csv(history, owners)).await
        .map_err(|e| format!("Unable to write {}: {}", path.to_string_lossy(), e))?;
    Ok(path)
}
