//! Pure projection of the session into a [`ViewModel`].
//!
//! `render` never touches the cache or the network and never mutates the
//! session; calling it twice on the same state yields the same view.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use challan_core::{RowKey, TransferId};
use challan_records::{Dataset, DatasetKind, Row, RowStatus};

use crate::config::DEFAULT_DATE_FORMAT;
use crate::filter;
use crate::state::{LoadState, Mode, Session};
use crate::summary::SummaryDraft;
use crate::types::{
    Cell, ChallanView, RenderedRow, RowActions, Screen, Segment, SummaryView, TableBody, ViewModel,
};

pub const LOADING_MESSAGE: &str = "Fetching fresh data...";
pub const NO_DATA_MESSAGE: &str = "No data loaded yet.";
pub const NO_MATCH_MESSAGE: &str = "No matching records found.";
pub const NO_CHALLAN_ITEMS_MESSAGE: &str = "No items found for this DC.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// `chrono` format for cells of date-like columns.
    pub date_format: String,
    /// Whether write affordances (select, receive, finalize) are offered.
    pub writable: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            writable: false,
        }
    }
}

pub fn render(session: &Session, options: &RenderOptions) -> ViewModel {
    let dataset = &session.dataset;
    let visible = filter::apply_displayed(dataset, &session.filter, &options.date_format);
    let term = session.filter.term();
    let columns = dataset.display_columns().to_vec();

    let rows: Vec<RenderedRow> = visible
        .iter()
        .filter_map(|row| render_row(dataset, row, &columns, term, session, options))
        .collect();

    let body = table_body(session, visible.len());
    let select_all_checked = session.selection.covers(rows.iter().map(|r| &r.key));
    let selection_allowed = options.writable && dataset.kind() == DatasetKind::PurchaseOrders;

    let (screen, summary, challan) = match &session.mode {
        Mode::Main => (Screen::Main, None, None),
        Mode::Summary(draft) => (Screen::Summary, Some(summary_view(draft, options)), None),
        Mode::Challan(transfer_id) => (
            Screen::Challan,
            None,
            Some(challan_view(dataset, transfer_id, options)),
        ),
    };

    ViewModel {
        screen,
        columns,
        rows,
        body,
        writable: options.writable,
        select_all_checked,
        selected_count: session.selection.len(),
        create_summary_enabled: selection_allowed && !session.selection.is_empty(),
        progress: session.progress,
        connectivity: session.connectivity,
        last_synced_at: session.last_synced_at,
        offline_reason: session.offline_reason.clone(),
        notice: session.notice.clone(),
        summary,
        challan,
    }
}

fn table_body(session: &Session, visible: usize) -> TableBody {
    if !session.dataset.is_empty() {
        return if visible == 0 {
            TableBody::Empty(NO_MATCH_MESSAGE.to_string())
        } else {
            TableBody::Rows
        };
    }
    match &session.load {
        LoadState::Loading => TableBody::Loading(LOADING_MESSAGE.to_string()),
        LoadState::Failed(reason) => TableBody::Error(format!("Error: {reason}")),
        LoadState::Idle | LoadState::Ready => TableBody::Empty(NO_DATA_MESSAGE.to_string()),
    }
}

fn render_row(
    dataset: &Dataset,
    row: &Row,
    columns: &[String],
    term: Option<&str>,
    session: &Session,
    options: &RenderOptions,
) -> Option<RenderedRow> {
    let key = dataset.key_of(row)?;
    let status = row.status(dataset.names());
    let cells = columns
        .iter()
        .map(|column| highlight(&cell_text(row, column, &options.date_format), term))
        .collect();

    Some(RenderedRow {
        actions: row_actions(dataset.kind(), &status, options.writable),
        selected: session.selection.contains(&key),
        key,
        status,
        cells,
    })
}

fn row_actions(kind: DatasetKind, status: &RowStatus, writable: bool) -> RowActions {
    if !writable {
        return RowActions::default();
    }
    match kind {
        DatasetKind::PurchaseOrders => RowActions {
            select: true,
            receive: true,
            finalize: false,
        },
        DatasetKind::DeliveryChallans => RowActions {
            select: false,
            receive: false,
            finalize: *status == RowStatus::Draft,
        },
    }
}

/// Display text of one cell; missing fields are empty.
fn cell_text(row: &Row, column: &str, date_format: &str) -> String {
    let raw = row.get(column).map(|v| v.display()).unwrap_or_default();
    if is_date_column(column) {
        format_date(&raw, date_format).unwrap_or(raw)
    } else {
        raw
    }
}

/// Columns whose name mentions a date are shown as formatted dates.
pub fn is_date_column(column: &str) -> bool {
    column.to_lowercase().contains("date")
}

/// Reformat a date-like value, or `None` when it isn't one (or the format is
/// unusable), in which case the raw text is shown.
pub fn format_date(raw: &str, format: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()?;

    let mut out = String::new();
    write!(out, "{}", date.format(format)).ok()?;
    Some(out)
}

/// Split `text` into segments, marking every case-insensitive occurrence of
/// `term`.
pub fn highlight(text: &str, term: Option<&str>) -> Cell {
    let needle: Vec<char> = match term {
        Some(term) if !term.is_empty() => term.chars().flat_map(char::to_lowercase).collect(),
        _ => return Cell::plain(text),
    };

    let mut segments = Vec::new();
    let mut plain_from = 0;
    let mut at = 0;
    while at < text.len() {
        if let Some(end) = match_at(text, at, &needle) {
            if plain_from < at {
                segments.push(Segment {
                    text: text[plain_from..at].to_string(),
                    highlighted: false,
                });
            }
            segments.push(Segment {
                text: text[at..end].to_string(),
                highlighted: true,
            });
            at = end;
            plain_from = end;
        } else {
            at += text[at..].chars().next().map_or(1, char::len_utf8);
        }
    }
    if plain_from < text.len() {
        segments.push(Segment {
            text: text[plain_from..].to_string(),
            highlighted: false,
        });
    }
    Cell { segments }
}

/// End offset of a case-insensitive match of `needle` starting at byte `start`.
fn match_at(text: &str, start: usize, needle: &[char]) -> Option<usize> {
    let mut wanted = needle.iter();
    let mut next = wanted.next()?;
    for (offset, ch) in text[start..].char_indices() {
        for lower in ch.to_lowercase() {
            if lower != *next {
                return None;
            }
            match wanted.next() {
                Some(n) => next = n,
                None => return Some(start + offset + ch.len_utf8()),
            }
        }
    }
    None
}

fn summary_view(draft: &SummaryDraft, options: &RenderOptions) -> SummaryView {
    let totals = draft.totals();
    SummaryView {
        lines: draft.lines().to_vec(),
        totals,
        can_submit: options.writable && totals.total_items > 0,
    }
}

fn challan_view(dataset: &Dataset, transfer_id: &TransferId, options: &RenderOptions) -> ChallanView {
    let names = dataset.names();
    let columns: Vec<String> = dataset
        .line_item_columns()
        .into_iter()
        .filter(|c| *c != names.transfer_id)
        .collect();

    let rows: Vec<Vec<Cell>> = dataset
        .children_of(transfer_id)
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            std::iter::once(Cell::plain((i + 1).to_string()))
                .chain(
                    columns
                        .iter()
                        .map(|c| Cell::plain(cell_text(item, c, &options.date_format))),
                )
                .collect()
        })
        .collect();

    let status = dataset
        .find_by_key(&RowKey::from(transfer_id.clone()))
        .map(|row| row.status(names));

    ChallanView {
        transfer_id: transfer_id.clone(),
        status,
        columns: std::iter::once("#".to_string()).chain(columns).collect(),
        empty_message: rows.is_empty().then(|| NO_CHALLAN_ITEMS_MESSAGE.to_string()),
        rows,
        can_finalize: options.writable && dataset.can_finalize(transfer_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::StatusFilter;
    use challan_records::{DatasetSnapshot, FieldNames};

    fn po_dataset(rows: Vec<Row>) -> Dataset {
        Dataset::from_snapshot(
            DatasetKind::PurchaseOrders,
            FieldNames::default(),
            DatasetSnapshot {
                rows,
                display_columns: vec!["code".into(), "item".into(), "PO Date".into(), "status".into()],
                ..DatasetSnapshot::default()
            },
        )
        .unwrap()
    }

    fn session_with(rows: Vec<Row>) -> Session {
        let mut session = Session::new(DatasetKind::PurchaseOrders, FieldNames::default());
        session.install(po_dataset(rows));
        session
    }

    fn writable() -> RenderOptions {
        RenderOptions {
            writable: true,
            ..RenderOptions::default()
        }
    }

    fn texts(view: &ViewModel) -> Vec<Vec<String>> {
        view.rows
            .iter()
            .map(|r| r.cells.iter().map(Cell::text).collect())
            .collect()
    }

    #[test]
    fn cells_follow_schema_order_and_tolerate_missing_fields() {
        let session = session_with(vec![
            Row::new().with("status", "Pending").with("code", "A").with("extra", "ignored"),
        ]);
        let view = render(&session, &RenderOptions::default());
        assert_eq!(view.columns, vec!["code", "item", "PO Date", "status"]);
        assert_eq!(texts(&view), vec![vec!["A", "", "", "Pending"]]);
        assert_eq!(view.body, TableBody::Rows);
    }

    #[test]
    fn date_columns_are_formatted_when_parseable() {
        let session = session_with(vec![
            Row::new().with("code", "A").with("status", "Pending").with("PO Date", "2024-03-05T10:00:00Z"),
            Row::new().with("code", "B").with("status", "Pending").with("PO Date", "2024-03-06"),
            Row::new().with("code", "C").with("status", "Pending").with("PO Date", "soon"),
        ]);
        let view = render(&session, &RenderOptions::default());
        let dates: Vec<String> = texts(&view).into_iter().map(|r| r[2].clone()).collect();
        assert_eq!(dates, vec!["05/03/2024", "06/03/2024", "soon"]);
    }

    #[test]
    fn searching_the_shown_date_keeps_and_highlights_the_row() {
        let mut session = session_with(vec![
            Row::new().with("code", "A").with("status", "Pending").with("PO Date", "2024-03-05"),
            Row::new().with("code", "B").with("status", "Pending").with("PO Date", "2024-04-01"),
        ]);
        session.filter.search = "05/03".into();
        let view = render(&session, &RenderOptions::default());
        assert_eq!(texts(&view), vec![vec!["A", "", "05/03/2024", "Pending"]]);
        assert!(view.rows[0].cells[2].has_highlight());
        assert!(!view.rows[0].cells[0].has_highlight());
    }

    #[test]
    fn unusable_date_format_falls_back_to_raw() {
        assert_eq!(format_date("2024-03-05", "%Q"), None);
        assert_eq!(format_date("2024-03-05 08:30:00", "%Y/%m/%d").as_deref(), Some("2024/03/05"));
        assert_eq!(format_date("", "%d/%m/%Y"), None);
    }

    #[test]
    fn search_matches_are_highlighted_case_insensitively() {
        let cell = highlight("Hex BOLT and bolt", Some("bolt"));
        let parts: Vec<(&str, bool)> = cell
            .segments
            .iter()
            .map(|s| (s.text.as_str(), s.highlighted))
            .collect();
        assert_eq!(
            parts,
            vec![("Hex ", false), ("BOLT", true), (" and ", false), ("bolt", true)]
        );
        assert_eq!(cell.text(), "Hex BOLT and bolt");
    }

    #[test]
    fn highlight_without_term_is_one_plain_segment() {
        let cell = highlight("Washer", None);
        assert!(!cell.has_highlight());
        assert_eq!(cell.segments.len(), 1);
        assert!(highlight("", Some("x")).segments.is_empty());
    }

    #[test]
    fn empty_states_distinguish_no_data_from_no_match() {
        let mut session = Session::new(DatasetKind::PurchaseOrders, FieldNames::default());
        assert_eq!(render(&session, &RenderOptions::default()).message(), Some(NO_DATA_MESSAGE));

        session.load = LoadState::Loading;
        assert_eq!(render(&session, &RenderOptions::default()).message(), Some(LOADING_MESSAGE));

        session.load = LoadState::Failed("request timed out".into());
        assert_eq!(
            render(&session, &RenderOptions::default()).message(),
            Some("Error: request timed out")
        );

        let mut session = session_with(vec![Row::new().with("code", "A").with("status", "Pending")]);
        session.filter.search = "abc".into();
        let view = render(&session, &RenderOptions::default());
        assert!(view.rows.is_empty());
        assert_eq!(view.message(), Some(NO_MATCH_MESSAGE));
    }

    #[test]
    fn write_affordances_follow_writability() {
        let session = session_with(vec![Row::new().with("code", "A").with("status", "Pending")]);
        let read_only = render(&session, &RenderOptions::default());
        assert_eq!(read_only.rows[0].actions, RowActions::default());
        assert!(!read_only.writable);

        let view = render(&session, &writable());
        assert!(view.rows[0].actions.receive);
        assert!(view.rows[0].actions.select);
        assert!(!view.rows[0].actions.finalize);
    }

    #[test]
    fn select_all_reflects_rendered_rows_only() {
        let mut session = session_with(vec![
            Row::new().with("code", "A").with("status", "Pending"),
            Row::new().with("code", "B").with("status", "Received"),
        ]);
        session.selection.toggle("A".parse().unwrap());
        let view = render(&session, &writable());
        assert!(view.select_all_checked);
        assert!(view.create_summary_enabled);
        assert_eq!(view.selected_count, 1);

        session.filter.status = StatusFilter::Any;
        let view = render(&session, &writable());
        assert!(!view.select_all_checked);
        assert!(view.row("A").unwrap().selected);
        assert!(!view.row("B").unwrap().selected);
    }

    #[test]
    fn challan_detail_numbers_child_items() {
        let mut session = Session::new(DatasetKind::DeliveryChallans, FieldNames::default());
        session.install(
            Dataset::from_snapshot(
                DatasetKind::DeliveryChallans,
                FieldNames::default(),
                DatasetSnapshot {
                    rows: vec![
                        Row::new().with("transferId", "DC-1").with("status", "Draft"),
                        Row::new().with("transferId", "DC-2").with("status", "Completed"),
                    ],
                    display_columns: vec!["transferId".into(), "status".into()],
                    line_items: vec![
                        Row::new().with("transferId", "DC-1").with("ItemCode", "A").with("Qty", 4),
                        Row::new().with("transferId", "DC-1").with("ItemCode", "B").with("Qty", 1),
                    ],
                    line_item_columns: vec!["transferId".into(), "ItemCode".into(), "Qty".into()],
                },
            )
            .unwrap(),
        );

        session.mode = Mode::Challan("DC-1".parse().unwrap());
        let view = render(&session, &writable());
        assert_eq!(view.screen, Screen::Challan);
        let challan = view.challan.unwrap();
        assert_eq!(challan.columns, vec!["#", "ItemCode", "Qty"]);
        let cells: Vec<Vec<String>> = challan
            .rows
            .iter()
            .map(|r| r.iter().map(Cell::text).collect())
            .collect();
        assert_eq!(cells, vec![vec!["1", "A", "4"], vec!["2", "B", "1"]]);
        assert!(challan.can_finalize);
        assert_eq!(challan.status, Some(RowStatus::Draft));

        session.mode = Mode::Challan("DC-2".parse().unwrap());
        let challan = render(&session, &writable()).challan.unwrap();
        assert_eq!(challan.empty_message.as_deref(), Some(NO_CHALLAN_ITEMS_MESSAGE));
        assert!(!challan.can_finalize);
    }

    #[test]
    fn draft_challans_offer_finalize_when_writable() {
        let mut session = Session::new(DatasetKind::DeliveryChallans, FieldNames::default());
        session.filter.status = StatusFilter::Any;
        session.install(
            Dataset::from_snapshot(
                DatasetKind::DeliveryChallans,
                FieldNames::default(),
                DatasetSnapshot {
                    rows: vec![
                        Row::new().with("transferId", "DC-1").with("status", "Draft"),
                        Row::new().with("transferId", "DC-2").with("status", "Completed"),
                    ],
                    display_columns: vec!["transferId".into(), "status".into()],
                    ..DatasetSnapshot::default()
                },
            )
            .unwrap(),
        );
        let view = render(&session, &writable());
        assert!(view.row("DC-1").unwrap().actions.finalize);
        assert!(!view.row("DC-2").unwrap().actions.finalize);
        assert!(!view.create_summary_enabled);
    }
}
