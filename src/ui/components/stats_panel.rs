use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::engine::reference_day::format_day_key;
use crate::session::timer::format_short;
use crate::store::schema::UserStats;
use crate::ui::theme::Theme;

const RECENT_WINS: usize = 5;

pub struct StatsPanel<'a> {
    stats: &'a UserStats,
    theme: &'a Theme,
}

impl<'a> StatsPanel<'a> {
    pub fn new(stats: &'a UserStats, theme: &'a Theme) -> Self {
        Self { stats, theme }
    }
}

/// Label/value rows shown in the panel, also used by the `stats` subcommand.
pub fn summary_rows(stats: &UserStats) -> Vec<(&'static str, String)> {
    vec![
        (
            "Personal best",
            stats
                .personal_best_time_seconds
                .map(format_short)
                .unwrap_or_else(|| "--".to_string()),
        ),
        ("Cases solved", stats.games_completed.to_string()),
        (
            "Current streak",
            plural_days(stats.consecutive_play_streak),
        ),
        ("Days solved", plural_days(stats.daily_streak)),
        (
            "Last played",
            stats
                .last_played
                .map(format_day_key)
                .unwrap_or_else(|| "never".to_string()),
        ),
    ]
}

fn plural_days(n: u32) -> String {
    if n == 1 {
        "1 day".to_string()
    } else {
        format!("{n} days")
    }
}

impl Widget for StatsPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let block = Block::bordered()
            .title(" Your Stats ")
            .border_style(Style::default().fg(colors.accent()));
        let inner = block.inner(area);
        block.render(area, buf);

        let label_style = Style::default().fg(colors.text_muted());
        let value_style = Style::default()
            .fg(colors.fg())
            .add_modifier(Modifier::BOLD);

        let mut lines: Vec<Line> = summary_rows(self.stats)
            .into_iter()
            .map(|(label, value)| {
                Line::from(vec![
                    Span::styled(format!(" {label:<15}"), label_style),
                    Span::styled(value, value_style),
                ])
            })
            .collect();

        if !self.stats.win_history.is_empty() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                " Recent wins",
                Style::default()
                    .fg(colors.accent())
                    .add_modifier(Modifier::BOLD),
            )));
            for win in self.stats.win_history.iter().rev().take(RECENT_WINS) {
                let diagnosis = win.diagnosis.as_deref().unwrap_or("unknown");
                lines.push(Line::from(vec![
                    Span::styled(format!(" {} ", format_day_key(win.date)), label_style),
                    Span::styled(
                        format!("{:>6} ", format_short(win.time_seconds)),
                        Style::default().fg(colors.success()),
                    ),
                    Span::styled(diagnosis.to_string(), Style::default().fg(colors.fg())),
                ]));
            }
        }

        Paragraph::new(lines).render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_rows_for_fresh_profile() {
        let rows = summary_rows(&UserStats::default());
        assert_eq!(rows[0], ("Personal best", "--".to_string()));
        assert_eq!(rows[2], ("Current streak", "0 days".to_string()));
        assert_eq!(rows[4], ("Last played", "never".to_string()));
    }

    #[test]
    fn test_summary_rows_format_times() {
        let stats = UserStats {
            personal_best_time_seconds: Some(90),
            consecutive_play_streak: 1,
            ..UserStats::default()
        };
        let rows = summary_rows(&stats);
        assert_eq!(rows[0].1, "1:30");
        assert_eq!(rows[2].1, "1 day");
    }
}
