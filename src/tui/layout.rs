use super::theme::Palette;
use crate::store::Tab;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Margin, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

/// 标准三段式布局：Header(3) + Content(弹性) + Footer(3)
pub fn main_layout(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area)
        .to_vec()
}

/// 渲染标签栏 header，右侧附带当前管理器
pub fn render_header(
    f: &mut Frame,
    active: Tab,
    manager: Option<&str>,
    palette: &Palette,
    area: Rect,
) {
    let mut spans = Vec::new();
    for (i, tab) in Tab::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" │ ", Style::default().fg(palette.dim)));
        }
        let label = format!("{} {}", i + 1, tab.label());
        if *tab == active {
            spans.push(Span::styled(
                label,
                Style::default()
                    .fg(palette.strong)
                    .bg(palette.sel_bg)
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::styled(label, Style::default().fg(palette.text)));
        }
    }
    if let Some(manager) = manager {
        spans.push(Span::styled(
            format!("    [{manager}]"),
            Style::default().fg(palette.accent),
        ));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    f.render_widget(header, area);
}

/// 渲染通用 footer；`✓`/`✗` 开头的消息分别用成功/错误色
pub fn render_footer(f: &mut Frame, message: Option<&str>, hints: &str, palette: &Palette, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.dim));
    let inner = block.inner(area);
    f.render_widget(block, area);
    let padded = inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });

    let mut spans = Vec::new();
    if let Some(msg) = message {
        let color = if msg.starts_with('✗') {
            palette.error
        } else if msg.starts_with('✓') {
            palette.ok
        } else {
            palette.border
        };
        spans.push(Span::styled(format!("{msg} | "), Style::default().fg(color)));
    }
    spans.push(Span::styled(hints.to_string(), Style::default().fg(palette.ok)));
    f.render_widget(Paragraph::new(Line::from(spans)), padded);
}

/// 渲染带滚动条的内容区域
pub fn render_scrollable_content(
    f: &mut Frame,
    title: &str,
    lines: Vec<Line<'_>>,
    scroll_offset: usize,
    palette: &Palette,
    area: Rect,
) {
    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));

    let inner = block.inner(area);
    f.render_widget(block, area);

    // 内部水平边距
    let padded = inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });

    let total_lines = lines.len();
    let visible_height = padded.height as usize;
    let max_scroll = total_lines.saturating_sub(visible_height);
    let actual_scroll = scroll_offset.min(max_scroll);

    let visible_content: Vec<Line> = lines
        .into_iter()
        .skip(actual_scroll)
        .take(visible_height)
        .collect();

    let paragraph = Paragraph::new(visible_content).wrap(Wrap { trim: false });

    f.render_widget(paragraph, padded);

    // 滚动条
    if total_lines > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));

        let mut scrollbar_state = ScrollbarState::new(total_lines).position(actual_scroll);

        f.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                horizontal: 0,
                vertical: 1,
            }),
            &mut scrollbar_state,
        );
    }
}

/// 居中弹窗，用于确认提示
pub fn render_popup(f: &mut Frame, title: &str, body: &str, palette: &Palette) {
    let area = f.area();
    let width = (area.width * 3 / 5).max(30).min(area.width);
    let height = 5.min(area.height);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    f.render_widget(Clear, popup);
    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.error));
    let paragraph = Paragraph::new(body.to_string())
        .style(Style::default().fg(palette.strong))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    f.render_widget(paragraph, popup);
}

/// 紧凑模式下不留空行
pub fn spacer(lines: &mut Vec<Line<'_>>, compact: bool) {
    if !compact {
        lines.push(Line::from(""));
    }
}

/// 估算内容区域可见行数（总高度减去 header/footer/borders）
pub fn visible_content_height(term_height: u16) -> usize {
    term_height.saturating_sub(8) as usize
}

/// 列表滚动偏移：保证选中行可见
pub fn list_scroll(selected: usize, visible_height: usize) -> usize {
    if visible_height == 0 {
        return 0;
    }
    if selected >= visible_height {
        selected.saturating_sub(visible_height - 1)
    } else {
        0
    }
}

/// 将文本复制到系统剪贴板。
/// 优先尝试 wl-copy（Wayland），然后 xclip，最后 xsel。
/// 返回 true 表示成功，false 表示找不到可用工具。
pub fn copy_to_clipboard(text: &str) -> bool {
    let candidates: &[(&str, &[&str])] = &[
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("xsel", &["--clipboard", "--input"]),
        ("pbcopy", &[]),
    ];
    for (cmd, args) in candidates {
        if let Ok(mut child) = std::process::Command::new(cmd)
            .args(*args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
        {
            use std::io::Write;
            if let Some(stdin) = child.stdin.as_mut() {
                let _ = stdin.write_all(text.as_bytes());
            }
            // 关闭 stdin，否则 xclip 会一直等待输入
            drop(child.stdin.take());
            if child.wait().map(|s| s.success()).unwrap_or(false) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_row_stays_visible() {
        assert_eq!(list_scroll(0, 10), 0);
        assert_eq!(list_scroll(9, 10), 0);
        assert_eq!(list_scroll(10, 10), 1);
        assert_eq!(list_scroll(25, 10), 16);
        assert_eq!(list_scroll(3, 0), 0);
    }
}
