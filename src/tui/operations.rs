use super::input::{
    cursor_line_col, split_at_cursor, str_delete_back, str_delete_forward, str_insert_char,
};
use super::layout::{self, spacer};
use super::state::App;
use super::theme::Palette;
use crate::gateway::{BatchUninstallReport, FailedUninstall, RollbackReport};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// 处理操作页按键
pub fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    if app.operations.confirm_rollback {
        let yes = matches!(key.code, KeyCode::Char('y' | 'Y') | KeyCode::Enter);
        app.answer_rollback(yes);
        return true;
    }
    if app.operations.editing {
        return handle_editing_key(key, app);
    }
    match key.code {
        KeyCode::Char('b') | KeyCode::Enter if app.settings().enable_batch_operations => {
            app.operations.editing = true;
            true
        }
        KeyCode::Char('e') => {
            app.export_lockfile();
            true
        }
        KeyCode::Char('t') => {
            app.copy_dependency_tree_link();
            true
        }
        KeyCode::Char('u') => {
            app.request_rollback();
            true
        }
        KeyCode::Left => {
            app.cycle_manager(false);
            true
        }
        KeyCode::Right => {
            app.cycle_manager(true);
            true
        }
        _ => false,
    }
}

/// 批量输入框：每行一个包名，Ctrl+S 提交
fn handle_editing_key(key: KeyEvent, app: &mut App) -> bool {
    if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.submit_batch();
        return true;
    }
    let ops = &mut app.operations;
    match key.code {
        KeyCode::Esc => ops.editing = false,
        KeyCode::Enter => str_insert_char(&mut ops.batch_input, &mut ops.batch_cursor, '\n'),
        KeyCode::Backspace => str_delete_back(&mut ops.batch_input, &mut ops.batch_cursor),
        KeyCode::Delete => str_delete_forward(&mut ops.batch_input, &mut ops.batch_cursor),
        KeyCode::Left => ops.batch_cursor = ops.batch_cursor.saturating_sub(1),
        KeyCode::Right => {
            if ops.batch_cursor < ops.batch_input.chars().count() {
                ops.batch_cursor += 1;
            }
        }
        KeyCode::Home => ops.batch_cursor = 0,
        KeyCode::End => ops.batch_cursor = ops.batch_input.chars().count(),
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            str_insert_char(&mut ops.batch_input, &mut ops.batch_cursor, c);
        }
        _ => return false,
    }
    true
}

pub fn hints(app: &App) -> &'static str {
    if app.operations.confirm_rollback {
        "y 确认回滚 | 其他键取消"
    } else if app.operations.editing {
        "每行一个包名 | Ctrl+S 提交 | Esc 完成编辑"
    } else if app.settings().enable_batch_operations {
        "b 编辑批量卸载 | u 回滚 | e 导出锁文件 | t 复制依赖树链接 | ←→ 切换管理器"
    } else {
        "u 回滚 | e 导出锁文件 | t 复制依赖树链接 | ←→ 切换管理器"
    }
}

pub fn render(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let block = Block::default()
        .title(" 批量操作 ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let inner = block.inner(area);
    f.render_widget(block, area);
    let padded = inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });

    let Some(manager) = app.selected_manager() else {
        let hint = Paragraph::new("请先在概览页选择一个包管理器")
            .style(Style::default().fg(palette.dim));
        f.render_widget(hint, padded);
        return;
    };

    let batch_enabled = app.settings().enable_batch_operations;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(if batch_enabled {
            [Constraint::Percentage(45), Constraint::Min(0)]
        } else {
            [Constraint::Length(0), Constraint::Min(0)]
        })
        .split(padded);

    if batch_enabled {
        render_batch_input(f, app, palette, chunks[0]);
    }

    let compact = app.settings().compact_mode;
    let ops = &app.operations;
    let dim = Style::default().fg(palette.dim);
    let pending = Style::default().fg(palette.border);
    let mut lines: Vec<Line> = Vec::new();
    spacer(&mut lines, compact);

    if ops.batch.is_pending() {
        lines.push(Line::from(Span::styled("正在批量卸载...", pending)));
        spacer(&mut lines, compact);
    } else if let Some(err) = ops.batch.error() {
        lines.push(Line::from(Span::styled(
            format!("✗ 批量卸载失败: {err}"),
            Style::default().fg(palette.error),
        )));
        spacer(&mut lines, compact);
    } else if let Some(report) = &ops.report {
        lines.extend(batch_report_lines(report, palette));
        spacer(&mut lines, compact);
    }

    // 快照与回滚
    if let Some(snapshot) = &ops.snapshot {
        lines.push(Line::from(vec![
            Span::styled("最近快照: ", Style::default().fg(palette.primary)),
            Span::styled(
                format!("{} ({})", snapshot.id, snapshot.manager_id),
                Style::default().fg(palette.text),
            ),
            Span::styled("  按 u 回滚", dim),
        ]));
        if ops.rollback.is_pending() {
            lines.push(Line::from(Span::styled("  正在回滚...", pending)));
        } else if ops.rollback.is_error() {
            let err = ops.rollback.error().map(|e| e.to_string()).unwrap_or_default();
            lines.push(Line::from(Span::styled(
                format!("  ✗ 回滚失败: {err}"),
                Style::default().fg(palette.error),
            )));
        } else if let Some(report) = &ops.rollback_report {
            lines.extend(rollback_report_lines(report, compact, palette));
        }
        spacer(&mut lines, compact);
    }

    // 锁文件导出
    let export_line = if ops.export.is_pending() {
        Span::styled("正在导出锁文件...", pending)
    } else if let Some(err) = ops.export.error() {
        Span::styled(format!("✗ 导出失败: {err}"), Style::default().fg(palette.error))
    } else if let Some(path) = &ops.exported {
        if ops.export.is_success() {
            Span::styled(
                format!("✓ 锁文件已保存到 {}", path.display()),
                Style::default().fg(palette.ok),
            )
        } else {
            Span::styled(format!("上次导出: {}", path.display()), dim)
        }
    } else {
        Span::styled(format!("按 e 导出 {} 的锁文件", manager.name), dim)
    };
    lines.push(Line::from(export_line));

    if let Some(url) = app.dependency_tree_url() {
        spacer(&mut lines, compact);
        lines.push(Line::from(vec![
            Span::styled("依赖树: ", Style::default().fg(palette.primary)),
            Span::styled(
                url,
                Style::default()
                    .fg(palette.text)
                    .add_modifier(Modifier::UNDERLINED),
            ),
        ]));
    }

    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[1]);
}

fn batch_report_lines(report: &BatchUninstallReport, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        format!(
            "批量卸载 {}: 共 {} 个，成功 {}，失败 {}",
            report.manager,
            report.total,
            report.succeeded.len(),
            report.failed.len()
        ),
        Style::default().fg(palette.strong).add_modifier(Modifier::BOLD),
    ))];
    for name in &report.succeeded {
        lines.push(Line::from(Span::styled(
            format!("  ✓ {name}"),
            Style::default().fg(palette.ok),
        )));
    }
    lines.extend(failed_lines(&report.failed, palette));
    lines
}

fn rollback_report_lines(
    report: &RollbackReport,
    compact: bool,
    palette: &Palette,
) -> Vec<Line<'static>> {
    let summary = if report.uninstalled.is_empty() {
        "  ✓ 已回滚，没有需要卸载的包".to_string()
    } else {
        format!("  ✓ 已回滚，卸载 {}", report.uninstalled.join(", "))
    };
    let mut lines = vec![Line::from(Span::styled(summary, Style::default().fg(palette.ok)))];
    lines.extend(failed_lines(&report.failed, palette));
    if let Some(note) = report.note.as_ref().filter(|_| !compact) {
        lines.push(Line::from(Span::styled(
            format!("  {note}"),
            Style::default().fg(palette.dim),
        )));
    }
    lines
}

fn failed_lines(failed: &[FailedUninstall], palette: &Palette) -> Vec<Line<'static>> {
    failed
        .iter()
        .map(|f| {
            let reason = f.error.as_deref().unwrap_or("未知错误");
            Line::from(Span::styled(
                format!("  ✗ {}: {}", f.package, reason),
                Style::default().fg(palette.error),
            ))
        })
        .collect()
}

/// 回滚确认弹窗
pub fn render_confirm(f: &mut Frame, app: &App, palette: &Palette) {
    if !app.operations.confirm_rollback {
        return;
    }
    if let Some(snapshot) = &app.operations.snapshot {
        layout::render_popup(
            f,
            "确认回滚",
            &format!(
                "回滚 {} 到快照 {}？快照之后安装的包会被卸载 (y/n)",
                snapshot.manager_id, snapshot.id
            ),
            palette,
        );
    }
}

/// 多行输入框，光标所在行高亮光标字符
fn render_batch_input(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let ops = &app.operations;
    let border = if ops.editing { palette.border } else { palette.dim };
    let block = Block::default()
        .title(" 要卸载的包（每行一个） ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if ops.batch_input.is_empty() && !ops.editing {
        let hint = Paragraph::new("按 b 开始输入").style(Style::default().fg(palette.dim));
        f.render_widget(hint, inner);
        return;
    }

    let (cursor_line, cursor_col) = cursor_line_col(&ops.batch_input, ops.batch_cursor);
    let visible = inner.height as usize;
    let scroll = cursor_line.saturating_sub(visible.saturating_sub(1));

    let lines: Vec<Line> = ops
        .batch_input
        .split('\n')
        .enumerate()
        .skip(scroll)
        .take(visible)
        .map(|(i, text)| {
            if ops.editing && i == cursor_line {
                let (before, cursor, after) = split_at_cursor(text, cursor_col);
                Line::from(vec![
                    Span::styled(before, Style::default().fg(palette.text)),
                    Span::styled(cursor, Style::default().fg(Color::Black).bg(palette.strong)),
                    Span::styled(after, Style::default().fg(palette.text)),
                ])
            } else {
                Line::from(Span::styled(text.to_string(), Style::default().fg(palette.text)))
            }
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}
