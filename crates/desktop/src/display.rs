//! Plain-text drawing of a [`ViewModel`] for the terminal front end.

use owo_colors::OwoColorize;

use challan_records::RowStatus;

use crate::types::{Cell, ConnectivityState, Notice, NoticeLevel, Screen, TableBody, ViewModel};

const GAP: &str = "  ";

/// Draw whatever screen the view model is on.
pub fn format_view(view: &ViewModel, color: bool) -> String {
    let mut out = String::new();
    if view.connectivity == ConnectivityState::Offline {
        out.push_str(&paint(&offline_badge(view), color, |s| s.dimmed().to_string()));
        out.push('\n');
    }
    if let Some(notice) = &view.notice {
        out.push_str(&format_notice(notice, color));
        out.push('\n');
    }

    let body = match view.screen {
        Screen::Main => format_main(view, color),
        Screen::Summary => format_summary(view),
        Screen::Challan => format_challan(view),
    };
    out.push_str(&body);
    out
}

/// Offline banner with the last successful sync and the failure, when known.
fn offline_badge(view: &ViewModel) -> String {
    let mut badge = String::from("offline: showing the last saved data");
    if let Some(at) = view.last_synced_at {
        badge.push_str(&format!(" (last synced {})", at.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(reason) = &view.offline_reason {
        badge.push_str(&format!(": {reason}"));
    }
    badge
}

pub fn format_notice(notice: &Notice, color: bool) -> String {
    let text = notice.message.as_str();
    match notice.level {
        NoticeLevel::Info => text.to_string(),
        NoticeLevel::Success => paint(text, color, |s| s.green().to_string()),
        NoticeLevel::Error => paint(text, color, |s| s.red().to_string()),
    }
}

fn format_main(view: &ViewModel, color: bool) -> String {
    match &view.body {
        TableBody::Loading(message) | TableBody::Empty(message) => format!("{message}\n"),
        TableBody::Error(message) => format!("{}\n", paint(message, color, |s| s.red().to_string())),
        TableBody::Rows => {
            let status_at = view.columns.iter().position(|c| c.eq_ignore_ascii_case("status"));
            let grid: Vec<Vec<&Cell>> = view.rows.iter().map(|r| r.cells.iter().collect()).collect();
            let statuses: Vec<&RowStatus> = view.rows.iter().map(|r| &r.status).collect();
            let mut out = format_grid(&view.columns, &grid, color, |col, row, text| {
                if Some(col) == status_at {
                    status_color(statuses[row], text, color)
                } else {
                    text
                }
            });
            out.push_str(&format!("{} row(s)", view.rows.len()));
            if view.selected_count > 0 {
                out.push_str(&format!(", {} selected", view.selected_count));
            }
            out.push('\n');
            out
        }
    }
}

fn format_summary(view: &ViewModel) -> String {
    let Some(summary) = &view.summary else {
        return String::new();
    };
    let columns = ["Item Code", "Item", "Ordered", "Received", "Receive now"].map(String::from);
    let cells: Vec<Vec<Cell>> = summary
        .lines
        .iter()
        .map(|line| {
            vec![
                Cell::plain(line.key.as_str()),
                Cell::plain(line.item.as_str()),
                Cell::plain(line.ordered.to_string()),
                Cell::plain(line.received.to_string()),
                Cell::plain(line.input.as_str()),
            ]
        })
        .collect();
    let grid: Vec<Vec<&Cell>> = cells.iter().map(|r| r.iter().collect()).collect();
    let mut out = format_grid(&columns, &grid, false, |_, _, text| text);
    out.push_str(&format!(
        "Total items: {}  Total quantity: {}\n",
        summary.totals.total_items, summary.totals.total_qty
    ));
    out
}

fn format_challan(view: &ViewModel) -> String {
    let Some(challan) = &view.challan else {
        return String::new();
    };
    let mut out = format!("Delivery challan {}", challan.transfer_id);
    if let Some(status) = &challan.status {
        out.push_str(&format!(" [{status}]"));
    }
    out.push('\n');
    match &challan.empty_message {
        Some(message) => {
            out.push_str(message);
            out.push('\n');
        }
        None => {
            let grid: Vec<Vec<&Cell>> = challan.rows.iter().map(|r| r.iter().collect()).collect();
            out.push_str(&format_grid(&challan.columns, &grid, false, |_, _, text| text));
        }
    }
    out
}

/// Left-aligned columns sized to their widest cell.
fn format_grid<F>(columns: &[String], rows: &[Vec<&Cell>], color: bool, mut decorate: F) -> String
where
    F: FnMut(usize, usize, String) -> String,
{
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.text().chars().count());
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| pad(c, c.chars().count(), *w))
        .collect();
    out.push_str(&paint(header.join(GAP).trim_end(), color, |s| s.bold().to_string()));
    out.push('\n');

    for (r, row) in rows.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(c, (cell, width))| {
                let text = decorate(c, r, paint_segments(cell, color));
                pad(&text, cell.text().chars().count(), *width)
            })
            .collect();
        out.push_str(line.join(GAP).trim_end());
        out.push('\n');
    }
    out
}

fn paint_segments(cell: &Cell, color: bool) -> String {
    cell.segments
        .iter()
        .map(|segment| {
            if segment.highlighted {
                paint(&segment.text, color, |s| s.black().on_yellow().to_string())
            } else {
                segment.text.clone()
            }
        })
        .collect()
}

fn status_color(status: &RowStatus, text: String, color: bool) -> String {
    match status {
        RowStatus::Received | RowStatus::Completed => paint(&text, color, |s| s.green().to_string()),
        RowStatus::Partial => paint(&text, color, |s| s.yellow().to_string()),
        RowStatus::Draft => paint(&text, color, |s| s.cyan().to_string()),
        RowStatus::Pending | RowStatus::Other(_) => text,
    }
}

/// Pad `text` (whose visible width is `visible`) to `width` columns.
fn pad(text: &str, visible: usize, width: usize) -> String {
    format!("{text}{}", " ".repeat(width.saturating_sub(visible)))
}

fn paint(text: &str, color: bool, style: impl FnOnce(&str) -> String) -> String {
    if color { style(text) } else { text.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{RenderOptions, render};
    use crate::state::Session;
    use challan_records::{Dataset, DatasetKind, DatasetSnapshot, FieldNames, Row};

    fn session() -> Session {
        let mut session = Session::new(DatasetKind::PurchaseOrders, FieldNames::default());
        session.install(
            Dataset::from_snapshot(
                DatasetKind::PurchaseOrders,
                FieldNames::default(),
                DatasetSnapshot {
                    rows: vec![
                        Row::new().with("code", "X1").with("item", "Hex bolt").with("status", "Pending"),
                        Row::new().with("code", "X22").with("item", "Nut").with("status", "Partial"),
                    ],
                    display_columns: vec!["code".into(), "item".into(), "status".into()],
                    ..DatasetSnapshot::default()
                },
            )
            .unwrap(),
        );
        session
    }

    #[test]
    fn plain_table_is_aligned() {
        let view = render(&session(), &RenderOptions::default());
        let text = format_view(&view, false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "code  item      status");
        assert_eq!(lines[1], "X1    Hex bolt  Pending");
        assert_eq!(lines[2], "X22   Nut       Partial");
        assert_eq!(lines[3], "2 row(s)");
    }

    #[test]
    fn empty_body_prints_its_message() {
        let mut session = session();
        session.filter.search = "zzz".into();
        let text = format_view(&render(&session, &RenderOptions::default()), false);
        assert_eq!(text, "No matching records found.\n");
    }

    #[test]
    fn colored_output_keeps_the_text() {
        let mut session = session();
        session.filter.search = "bolt".into();
        let text = format_view(&render(&session, &RenderOptions::default()), true);
        assert!(text.contains("Hex "));
        assert!(text.contains("bolt"));
        assert!(text.contains('\u{1b}'));
    }

    #[test]
    fn offline_badge_shows_last_sync_and_reason() {
        let mut session = session();
        session.connectivity = ConnectivityState::Offline;
        let text = format_view(&render(&session, &RenderOptions::default()), false);
        assert_eq!(text.lines().next(), Some("offline: showing the last saved data"));

        session.last_synced_at = Some(
            chrono::NaiveDate::from_ymd_opt(2024, 3, 5)
                .and_then(|d| d.and_hms_opt(9, 30, 0))
                .unwrap()
                .and_utc(),
        );
        session.offline_reason = Some("request timed out".into());
        let text = format_view(&render(&session, &RenderOptions::default()), false);
        assert_eq!(
            text.lines().next(),
            Some("offline: showing the last saved data (last synced 2024-03-05 09:30 UTC): request timed out")
        );
    }
}
