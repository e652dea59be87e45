use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::engine::markup;
use crate::session::state::{ChatMessage, Role};
use crate::ui::theme::Theme;

/// Regular replies use this share of the width; wide ones use all of it.
const NARROW_PERCENT: usize = 75;

/// One message to draw: stored markup plus its layout flag.
pub struct Bubble<'a> {
    pub role: Role,
    pub text: &'a str,
    pub wide: bool,
}

impl<'a> Bubble<'a> {
    pub fn from_message(message: &'a ChatMessage) -> Self {
        Self {
            role: message.role,
            text: &message.text,
            wide: message.wide,
        }
    }
}

/// Scrolling transcript pinned to the newest message. `scroll_back` counts
/// lines up from the bottom.
pub struct ChatLog<'a> {
    bubbles: Vec<Bubble<'a>>,
    scroll_back: usize,
    title: String,
    theme: &'a Theme,
}

impl<'a> ChatLog<'a> {
    pub fn new(bubbles: Vec<Bubble<'a>>, scroll_back: usize, theme: &'a Theme) -> Self {
        Self {
            bubbles,
            scroll_back,
            title: " Patient Interview ".to_string(),
            theme,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

impl Widget for ChatLog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let block = Block::bordered()
            .title(self.title.as_str())
            .border_style(Style::default().fg(colors.border()));
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width < 4 || inner.height == 0 {
            return;
        }

        let full = inner.width as usize;
        let mut lines: Vec<Line<'static>> = Vec::new();
        for bubble in &self.bubbles {
            let (label, base) = match bubble.role {
                Role::User => ("You", Style::default().fg(colors.user_message())),
                Role::Patient => ("Patient", Style::default().fg(colors.patient_message())),
            };
            let strong = Style::default()
                .fg(colors.strong())
                .add_modifier(Modifier::BOLD);
            let width = if bubble.wide {
                full
            } else {
                (full * NARROW_PERCENT / 100).max(1)
            };

            lines.push(Line::from(Span::styled(
                format!("{label}:"),
                base.add_modifier(Modifier::BOLD),
            )));
            let pieces: Vec<(&str, Style)> = markup::runs(bubble.text)
                .into_iter()
                .map(|run| (run.text, if run.strong { strong } else { base }))
                .collect();
            lines.extend(wrap_styled(&pieces, width));
            lines.push(Line::default());
        }

        let height = inner.height as usize;
        let max_skip = lines.len().saturating_sub(height);
        let skip = max_skip.saturating_sub(self.scroll_back);
        let visible: Vec<Line> = lines.into_iter().skip(skip).take(height).collect();
        Paragraph::new(visible).render(inner, buf);
    }
}

/// Word-wrap styled pieces to `width` columns. Newlines break lines; words
/// longer than a whole line are split.
pub fn wrap_styled(pieces: &[(&str, Style)], width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut out: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0usize;

    for (text, style) in pieces {
        for (i, segment) in text.split('\n').enumerate() {
            if i > 0 {
                out.push(Line::from(std::mem::take(&mut current)));
                used = 0;
            }
            for word in segment.split_inclusive(' ') {
                let mut word = word;
                loop {
                    let len = word.chars().count();
                    let fits = used + len <= width;
                    let trailing_space_fits = word.ends_with(' ') && used + len - 1 <= width;
                    if fits || trailing_space_fits {
                        push_span(&mut current, word, *style);
                        used += len;
                        break;
                    }
                    if used > 0 {
                        out.push(Line::from(std::mem::take(&mut current)));
                        used = 0;
                        continue;
                    }
                    let cut = word
                        .char_indices()
                        .nth(width)
                        .map(|(b, _)| b)
                        .unwrap_or(word.len());
                    push_span(&mut current, &word[..cut], *style);
                    out.push(Line::from(std::mem::take(&mut current)));
                    word = &word[cut..];
                    if word.is_empty() {
                        break;
                    }
                }
            }
        }
    }
    if !current.is_empty() || out.is_empty() {
        out.push(Line::from(current));
    }
    out
}

fn push_span(spans: &mut Vec<Span<'static>>, text: &str, style: Style) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = spans.last_mut()
        && last.style == style
    {
        last.content.to_mut().push_str(text);
        return;
    }
    spans.push(Span::styled(text.to_string(), style));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_wraps_on_word_boundaries() {
        let style = Style::default();
        let lines = wrap_styled(&[("my chest hurts when I climb", style)], 10);
        assert_eq!(plain(&lines), vec!["my chest ", "hurts when ", "I climb"]);
    }

    #[test]
    fn test_long_word_is_split() {
        let lines = wrap_styled(&[("pneumonoultramicroscopic", Style::default())], 10);
        assert_eq!(plain(&lines), vec!["pneumonoul", "tramicrosc", "opic"]);
    }

    #[test]
    fn test_newlines_and_styles_survive() {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let lines = wrap_styled(
            &[("Na ", Style::default()), ("139", bold), ("\nK 3.1", Style::default())],
            40,
        );
        assert_eq!(plain(&lines), vec!["Na 139", "K 3.1"]);
        assert_eq!(lines[0].spans[1].style, bold);
    }

    #[test]
    fn test_renders_newest_at_bottom() {
        let theme = Theme::default();
        let texts: Vec<String> = (0..10).map(|i| format!("line {i}")).collect();
        let bubbles = texts
            .iter()
            .map(|t| Bubble {
                role: Role::Patient,
                text: t,
                wide: true,
            })
            .collect();
        let area = Rect::new(0, 0, 30, 6);
        let mut buf = Buffer::empty(area);
        ChatLog::new(bubbles, 0, &theme).render(area, &mut buf);
        let row: String = (1..29)
            .map(|x| buf[(x, 3)].symbol().to_string())
            .collect();
        assert!(row.starts_with("line 9"), "got {row:?}");
    }
}
