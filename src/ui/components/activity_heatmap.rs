use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Widget};

use crate::ui::theme::{Theme, ThemeColors};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Week-column calendar of days with a solved case, ending on the
/// reference day.
pub struct ActivityHeatmap<'a> {
    played: HashSet<NaiveDate>,
    today: NaiveDate,
    theme: &'a Theme,
}

impl<'a> ActivityHeatmap<'a> {
    pub fn new(game_history: &[NaiveDate], today: NaiveDate, theme: &'a Theme) -> Self {
        Self {
            played: game_history.iter().copied().collect(),
            today,
            theme,
        }
    }
}

impl Widget for ActivityHeatmap<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let block = Block::bordered()
            .title(" Days Solved ")
            .border_style(Style::default().fg(colors.border()));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height < 8 || inner.width < 12 {
            return;
        }

        let weeks_to_show = ((inner.width as usize).saturating_sub(3)) / 2;
        let weeks_to_show = weeks_to_show.min(26);
        let start_date = week_start(self.today - Duration::weeks(weeks_to_show as i64));

        let day_labels = ["M", " ", "W", " ", "F", " ", "S"];
        for (row, label) in day_labels.iter().enumerate() {
            let y = inner.y + 1 + row as u16;
            if y < inner.y + inner.height {
                buf.set_string(inner.x, y, label, Style::default().fg(colors.text_muted()));
            }
        }

        let mut current_date = start_date;
        let mut col = 0u16;
        let mut last_month = 0u32;

        while current_date <= self.today {
            let x = inner.x + 2 + col * 2;
            if x + 1 >= inner.x + inner.width {
                break;
            }

            let month = current_date.month();
            if month != last_month {
                if x + 3 <= inner.x + inner.width {
                    buf.set_string(
                        x,
                        inner.y,
                        MONTH_NAMES[current_date.month0() as usize],
                        Style::default().fg(colors.text_muted()),
                    );
                }
                last_month = month;
            }

            for day_offset in 0..7u16 {
                let date = current_date + Duration::days(day_offset as i64);
                if date > self.today {
                    break;
                }
                let y = inner.y + 1 + day_offset;
                if y >= inner.y + inner.height {
                    break;
                }
                let (ch, color) = cell(self.played.contains(&date), date == self.today, colors);
                buf.set_string(x, y, ch.to_string(), Style::default().fg(color));
            }

            current_date += Duration::weeks(1);
            col += 1;
        }
    }
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn cell(played: bool, is_today: bool, colors: &ThemeColors) -> (char, Color) {
    match (played, is_today) {
        (true, true) => ('█', colors.heat_today()),
        (true, false) => ('█', colors.heat_played()),
        (false, true) => ('▫', colors.heat_today()),
        (false, false) => ('·', colors.heat_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2024-03-07 is a Thursday
        assert_eq!(week_start(day(2024, 3, 7)), day(2024, 3, 4));
        assert_eq!(week_start(day(2024, 3, 4)), day(2024, 3, 4));
    }

    #[test]
    fn test_played_days_are_drawn() {
        let theme = Theme::default();
        let today = day(2024, 3, 7);
        let heatmap = ActivityHeatmap::new(&[day(2024, 3, 5), today], today, &theme);
        let area = Rect::new(0, 0, 30, 10);
        let mut buf = Buffer::empty(area);
        heatmap.render(area, &mut buf);

        let filled = buf
            .content()
            .iter()
            .filter(|c| c.symbol() == "█")
            .count();
        assert_eq!(filled, 2);
    }

    #[test]
    fn test_tiny_area_draws_only_border() {
        let theme = Theme::default();
        let today = day(2024, 3, 7);
        let area = Rect::new(0, 0, 8, 4);
        let mut buf = Buffer::empty(area);
        ActivityHeatmap::new(&[today], today, &theme).render(area, &mut buf);
        assert!(buf.content().iter().all(|c| c.symbol() != "█"));
    }
}
