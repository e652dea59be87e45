use ratatui::layout::{Constraint, Direction, Layout, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutTier {
    Wide,   // ≥100 cols: chat + stats sidebar with heatmap
    Medium, // 60-99 cols: chat + compact sidebar without heatmap
    Narrow, // <60 cols: chat only, stats in the header
}

impl LayoutTier {
    pub fn from_area(area: Rect) -> Self {
        if area.width >= 100 {
            LayoutTier::Wide
        } else if area.width >= 60 {
            LayoutTier::Medium
        } else {
            LayoutTier::Narrow
        }
    }

    pub fn show_sidebar(&self) -> bool {
        *self != LayoutTier::Narrow
    }

    pub fn show_heatmap(&self, height: u16) -> bool {
        height >= 24 && *self == LayoutTier::Wide
    }
}

/// Input box grows with the draft up to this many text rows.
const MAX_INPUT_ROWS: u16 = 4;

pub struct AppLayout {
    pub header: Rect,
    pub chat: Rect,
    pub input: Rect,
    pub sidebar: Option<Rect>,
    pub footer: Rect,
    pub tier: LayoutTier,
}

impl AppLayout {
    pub fn new(area: Rect, draft: &str) -> Self {
        let tier = LayoutTier::from_area(area);

        let (left, sidebar) = if tier.show_sidebar() {
            let pct = if tier == LayoutTier::Wide { 32 } else { 36 };
            let horizontal = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Percentage(100 - pct),
                    Constraint::Percentage(pct),
                ])
                .split(area);
            (horizontal[0], Some(horizontal[1]))
        } else {
            (area, None)
        };

        let text_width = left.width.saturating_sub(4) as usize;
        let input_rows = (wrapped_line_count(draft, text_width) as u16).clamp(1, MAX_INPUT_ROWS);

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(5),
                Constraint::Length(input_rows + 2),
                Constraint::Length(1),
            ])
            .split(left);

        Self {
            header: vertical[0],
            chat: vertical[1],
            input: vertical[2],
            sidebar: sidebar.map(|s| Rect {
                y: s.y + 1,
                height: s.height.saturating_sub(2),
                ..s
            }),
            footer: vertical[3],
            tier,
        }
    }
}

pub fn wrapped_line_count(text: &str, width: usize) -> usize {
    if width == 0 {
        return 0;
    }
    let chars = text.chars().count().max(1);
    chars.div_ceil(width)
}

pub fn pack_hint_lines(hints: &[&str], width: usize) -> Vec<String> {
    if width == 0 || hints.is_empty() {
        return Vec::new();
    }

    let prefix = " ";
    let separator = "  ";
    let mut out: Vec<String> = Vec::new();
    let mut current = prefix.to_string();
    let mut has_hint = false;

    for hint in hints {
        if hint.is_empty() {
            continue;
        }
        let candidate = if has_hint {
            format!("{current}{separator}{hint}")
        } else {
            format!("{current}{hint}")
        };
        if candidate.chars().count() <= width {
            current = candidate;
            has_hint = true;
        } else {
            if has_hint {
                out.push(current);
            }
            current = format!("{prefix}{hint}");
            has_hint = true;
        }
    }

    if has_hint {
        out.push(current);
    }
    out
}

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    const MIN_POPUP_WIDTH: u16 = 50;
    const MIN_POPUP_HEIGHT: u16 = 12;

    let requested_w = area.width.saturating_mul(percent_x.min(100)) / 100;
    let requested_h = area.height.saturating_mul(percent_y.min(100)) / 100;

    let target_w = requested_w.max(MIN_POPUP_WIDTH).min(area.width);
    let target_h = requested_h.max(MIN_POPUP_HEIGHT).min(area.height);

    let left = area
        .x
        .saturating_add((area.width.saturating_sub(target_w)) / 2);
    let top = area
        .y
        .saturating_add((area.height.saturating_sub(target_h)) / 2);

    Rect::new(left, top, target_w, target_h)
}
