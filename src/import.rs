//! Ticket lists typed by the operator or read from a file

use std::path::Path;

use drawdesk_core::Ticket;

lazy_static::lazy_static!(
    static ref RE_LIST_SEPARATOR: regex::Regex = regex::Regex::new(r"[,\s]+").unwrap();
    static ref RE_CSV_SEPARATOR: regex::Regex = regex::Regex::new(r"[,;\r\n]+").unwrap();
);

/// Header cells skipped in CSV files
const CSV_HEADER_WORDS: [&str; 2] = ["ticket", "number"];

/// `0001, 0002 0003` -> `[0001, 0002, 0003]`
pub fn parse_ticket_list(text: &str) -> Vec<Ticket> {
    RE_LIST_SEPARATOR.split(text)
        .filter_map(Ticket::new)
        .collect()
}

/// Every cell of the file is a ticket, except the header words.
pub fn parse_ticket_csv(text: &str) -> Vec<Ticket> {
    RE_CSV_SEPARATOR.split(text)
        .map(|cell| cell.trim().trim_matches('"'))
        .filter(|cell| !CSV_HEADER_WORDS.iter().any(|w| cell.eq_ignore_ascii_case(w)))
        .filter_map(Ticket::new)
        .collect()
}

/// `name,category` lines, `;` also separates. A `name` header line is skipped.
pub fn parse_prize_csv(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(|line| {
            let mut cells = line.splitn(2, |c: char| c == ',' || c == ';')
                .map(|cell| cell.trim().trim_matches('"').trim());
            let name = cells.next().unwrap_or_default().to_string();
            let category = cells.next().unwrap_or_default().to_string();
            (name, category)
        })
        .filter(|(name, _)| !name.is_empty() && !name.eq_ignore_ascii_case("name"))
        .collect()
}

/// `name,tickets` lines, the tickets being a list of their own. A `name` header line is skipped.
pub fn parse_owner_csv(text: &str) -> Vec<(String, Vec<Ticket>)> {
    text.lines()
        .filter_map(|line| {
            let mut cells = line.splitn(2, |c: char| c == ',' || c == ';');
            let name = cells.next()?.trim().trim_matches('"').trim();
            if name.is_empty() || name.eq_ignore_ascii_case("name") {
                return None;
            }
            let tickets = cells.next().unwrap_or_default().replace(['"', ';'], " ");
            Some((name.to_string(), parse_ticket_list(&tickets)))
        })
        .collect()
}

/// Reads a ticket file. `.csv` files are read cell by cell, anything else as a plain list.
pub async fn read_ticket_file<P: AsRef<Path>>(path: P) -> Result<Vec<Ticket>, String> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await
        .map_err(|e| format!("Unable to read file {}: {}", path.to_string_lossy(), e))?;
    let is_csv = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
    Ok(if is_csv {
        parse_ticket_csv(&content)
    } else {
        parse_ticket_list(&content)
    })
}
