use super::input::{split_at_cursor, str_delete_back, str_delete_forward, str_insert_char};
use super::state::{App, SettingsItem};
use super::theme::Palette;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

/// 处理设置页按键
pub fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    if app.settings_view.editing {
        handle_editing_key(key, app)
    } else {
        handle_browsing_key(key, app)
    }
}

/// 浏览模式按键处理
fn handle_browsing_key(key: KeyEvent, app: &mut App) -> bool {
    let total = app.settings_focusable_count();
    if total == 0 {
        return false;
    }

    match key.code {
        KeyCode::Up => {
            app.settings_view.selected = app.settings_view.selected.saturating_sub(1);
            true
        }
        KeyCode::Down => {
            if app.settings_view.selected + 1 < total {
                app.settings_view.selected += 1;
            }
            true
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            app.activate_setting();
            true
        }
        _ => false,
    }
}

/// 编辑模式按键处理
fn handle_editing_key(key: KeyEvent, app: &mut App) -> bool {
    if key.code == KeyCode::Enter {
        // 确认编辑
        app.confirm_settings_edit();
        return true;
    }
    let view = &mut app.settings_view;
    match key.code {
        KeyCode::Esc => {
            // 取消编辑
            view.editing = false;
        }
        KeyCode::Backspace => str_delete_back(&mut view.edit_buffer, &mut view.edit_cursor),
        KeyCode::Delete => str_delete_forward(&mut view.edit_buffer, &mut view.edit_cursor),
        KeyCode::Left => {
            view.edit_cursor = view.edit_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            if view.edit_cursor < view.edit_buffer.chars().count() {
                view.edit_cursor += 1;
            }
        }
        KeyCode::Home => view.edit_cursor = 0,
        KeyCode::End => view.edit_cursor = view.edit_buffer.chars().count(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            str_insert_char(&mut view.edit_buffer, &mut view.edit_cursor, c);
        }
        _ => return false,
    }
    true
}

pub fn hints(app: &App) -> &'static str {
    if app.settings_view.editing {
        "输入新值 | Enter 确认 | Esc 取消"
    } else {
        "↑↓ 选择 | Enter/Space 切换/编辑 | 修改立即保存"
    }
}

/// 渲染设置页
pub fn render(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let content_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let content_inner = content_block.inner(area);
    f.render_widget(content_block, area);

    let padded = content_inner.inner(Margin {
        horizontal: 2,
        vertical: 1,
    });

    if padded.height < 3 {
        return;
    }

    render_items(f, app, palette, padded);
}

/// 渲染设置项列表
fn render_items(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let view = &app.settings_view;
    if view.items.is_empty() {
        let hint = Paragraph::new("正在加载设置...").style(Style::default().fg(palette.dim));
        f.render_widget(hint, area);
        return;
    }

    // 计算 label 最大宽度用于对齐
    let max_label_width = view
        .items
        .iter()
        .filter_map(|item| match item {
            SettingsItem::TextEdit { label, .. } | SettingsItem::Choice { label, .. } => {
                Some(UnicodeWidthStr::width(label.as_str()))
            }
            _ => None,
        })
        .max()
        .unwrap_or(10);
    let label_padded = |label: &str| {
        let padding = max_label_width.saturating_sub(UnicodeWidthStr::width(label));
        format!(" {}:{} ", label, " ".repeat(padding))
    };

    let visible_height = area.height as usize;
    let mut lines: Vec<Line> = Vec::new();
    let mut focusable_idx = 0;
    let sel = Style::default().bg(palette.sel_bg);

    for (i, item) in view.items.iter().enumerate() {
        let is_selected = !matches!(item, SettingsItem::Section(_)) && focusable_idx == view.selected;
        match item {
            SettingsItem::Section(title) => {
                // 分组前空一行（非首项）
                if i > 0 && !app.settings().compact_mode {
                    lines.push(Line::from(""));
                }
                lines.push(Line::from(Span::styled(
                    format!("── {} ──", title),
                    Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
                )));
                continue;
            }
            SettingsItem::Toggle { label, value, .. } => {
                let checkbox = if *value { "[✓]" } else { "[ ]" };
                let checkbox_color = if *value { palette.primary } else { palette.dim };

                if is_selected {
                    lines.push(Line::from(vec![
                        Span::styled(
                            format!(" {} ", checkbox),
                            sel.fg(checkbox_color).add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(
                            format!(" {}", label),
                            sel.fg(palette.strong).add_modifier(Modifier::BOLD),
                        ),
                    ]));
                } else {
                    lines.push(Line::from(vec![
                        Span::styled(format!(" {} ", checkbox), Style::default().fg(checkbox_color)),
                        Span::styled(format!(" {}", label), Style::default().fg(palette.text)),
                    ]));
                }
            }
            SettingsItem::Choice { label, value, .. } => {
                let shown = format!("◀ {} ▶", value);
                if is_selected {
                    lines.push(Line::from(vec![
                        Span::styled(label_padded(label), sel.fg(palette.primary).add_modifier(Modifier::BOLD)),
                        Span::styled(shown, sel.fg(palette.strong).add_modifier(Modifier::BOLD)),
                    ]));
                } else {
                    lines.push(Line::from(vec![
                        Span::styled(label_padded(label), Style::default().fg(palette.primary)),
                        Span::styled(shown, Style::default().fg(palette.text)),
                    ]));
                }
            }
            SettingsItem::TextEdit { label, value, .. } => {
                if is_selected && view.editing {
                    // 编辑中：显示 buffer 和光标
                    let (before, cursor, after) = split_at_cursor(&view.edit_buffer, view.edit_cursor);
                    lines.push(Line::from(vec![
                        Span::styled(label_padded(label), sel.fg(palette.primary).add_modifier(Modifier::BOLD)),
                        Span::styled(before, sel.fg(palette.strong)),
                        Span::styled(cursor, Style::default().fg(Color::Black).bg(Color::Yellow)),
                        Span::styled(after, sel.fg(palette.strong)),
                    ]));
                } else {
                    let display_value = if value.is_empty() {
                        "(未设置)".to_string()
                    } else {
                        value.clone()
                    };
                    if is_selected {
                        lines.push(Line::from(vec![
                            Span::styled(label_padded(label), sel.fg(palette.primary).add_modifier(Modifier::BOLD)),
                            Span::styled(display_value, sel.fg(palette.strong).add_modifier(Modifier::BOLD)),
                        ]));
                    } else {
                        let value_color = if value.is_empty() { palette.dim } else { palette.text };
                        lines.push(Line::from(vec![
                            Span::styled(label_padded(label), Style::default().fg(palette.primary)),
                            Span::styled(display_value, Style::default().fg(value_color)),
                        ]));
                    }
                }
            }
            SettingsItem::Action { label, .. } => {
                let style = if is_selected {
                    sel.fg(palette.error).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(palette.error)
                };
                lines.push(Line::from(Span::styled(format!(" ↺ {}", label), style)));
            }
        }
        focusable_idx += 1;
    }

    // 滚动处理
    let total_lines = lines.len();
    let scroll = if total_lines > visible_height {
        let selected_line =
            find_selected_line(&view.items, view.selected, app.settings().compact_mode);
        if selected_line >= visible_height {
            selected_line.saturating_sub(visible_height / 2)
        } else {
            0
        }
    } else {
        0
    };

    let visible_lines: Vec<Line> = lines.into_iter().skip(scroll).take(visible_height).collect();
    f.render_widget(Paragraph::new(visible_lines), area);

    // 滚动条
    if total_lines > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));
        let mut state = ScrollbarState::new(total_lines).position(scroll);
        f.render_stateful_widget(
            scrollbar,
            area.inner(Margin { horizontal: 0, vertical: 0 }),
            &mut state,
        );
    }
}

/// 找到选中项在渲染行中的行号
fn find_selected_line(items: &[SettingsItem], selected: usize, compact: bool) -> usize {
    let mut line = 0;
    let mut focusable_idx = 0;

    for (i, item) in items.iter().enumerate() {
        match item {
            SettingsItem::Section(_) => {
                if i > 0 && !compact {
                    line += 1;
                }
                line += 1;
            }
            _ => {
                if focusable_idx == selected {
                    return line;
                }
                line += 1;
                focusable_idx += 1;
            }
        }
    }
    line
}
