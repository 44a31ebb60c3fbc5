use super::input::render_input_box;
use super::layout::{self, list_scroll};
use super::state::App;
use super::theme::Palette;
use crate::cache::QueryKey;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout, Margin, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use unicode_width::UnicodeWidthStr;

const PAGE: usize = 10;

/// 处理软件包页按键
pub fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    if app.packages.confirm.is_some() {
        let yes = matches!(key.code, KeyCode::Char('y' | 'Y') | KeyCode::Enter);
        app.answer_confirm(yes);
        return true;
    }
    if app.packages.searching {
        return handle_search_key(key, app);
    }

    let total = app.visible_packages().len();
    match key.code {
        KeyCode::Char('/') => {
            app.packages.searching = true;
            true
        }
        KeyCode::Esc if !app.packages.search.content().is_empty() => {
            app.packages.search.clear();
            app.packages.selected = 0;
            true
        }
        KeyCode::Up => {
            app.packages.selected = app.packages.selected.saturating_sub(1);
            true
        }
        KeyCode::Down => {
            if app.packages.selected + 1 < total {
                app.packages.selected += 1;
            }
            true
        }
        KeyCode::PageUp => {
            app.packages.selected = app.packages.selected.saturating_sub(PAGE);
            true
        }
        KeyCode::PageDown => {
            app.packages.selected = (app.packages.selected + PAGE).min(total.saturating_sub(1));
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
        KeyCode::Char('d') | KeyCode::Delete => {
            app.request_uninstall();
            true
        }
        _ => false,
    }
}

/// 筛选输入状态：字符都进搜索框
fn handle_search_key(key: KeyEvent, app: &mut App) -> bool {
    let search = &mut app.packages.search;
    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            app.packages.searching = false;
        }
        KeyCode::Backspace => search.delete_back(),
        KeyCode::Delete => search.delete_forward(),
        KeyCode::Left => search.move_left(),
        KeyCode::Right => search.move_right(),
        KeyCode::Home => search.move_home(),
        KeyCode::End => search.move_end(),
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                return false;
            }
            search.insert(c);
        }
        _ => return false,
    }
    app.packages.selected = 0;
    true
}

pub fn hints(app: &App) -> &'static str {
    if app.packages.confirm.is_some() {
        "y 确认卸载 | 其他键取消"
    } else if app.packages.searching {
        "输入关键词筛选 | Enter/Esc 完成"
    } else {
        "↑↓ 选择 | / 筛选 | d 卸载 | ←→ 切换管理器 | r 刷新"
    }
}

pub fn render(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let content_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let content_inner = content_block.inner(area);
    f.render_widget(content_block, area);

    let padded = content_inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });
    if padded.height < 5 {
        return;
    }

    // 分割：搜索框 + 统计 + 列表
    let inner_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(padded);

    render_input_box(
        f,
        &app.packages.search,
        "筛选:",
        app.packages.searching,
        palette,
        inner_chunks[0],
    );

    let Some(id) = app.selected_manager_id() else {
        let hint = Paragraph::new("请先在概览页选择一个包管理器")
            .style(Style::default().fg(palette.dim));
        f.render_widget(hint, inner_chunks[2]);
        return;
    };

    let key = QueryKey::Packages(id);
    let state = app.cache.state(&key);
    if let Some(err) = state.error {
        let lines = vec![
            Line::from(Span::styled(format!("✗ {err}"), Style::default().fg(palette.error))),
            Line::from(Span::styled("按 r 重试", Style::default().fg(palette.dim))),
        ];
        f.render_widget(Paragraph::new(lines), inner_chunks[2]);
        return;
    }
    let Some(list) = state.data.and_then(|d| d.as_packages()) else {
        let loading = Paragraph::new("正在加载已安装包列表...")
            .style(Style::default().fg(palette.border));
        f.render_widget(loading, inner_chunks[2]);
        return;
    };

    let visible = app.visible_packages();

    // 统计行
    let mut stat = format!("共 {} 个匹配 / 已安装 {} 个", visible.len(), list.total);
    if let Some(at) = app.cache.updated_at(&key) {
        stat.push_str(&format!("  {} 秒前更新", at.elapsed().as_secs()));
    }
    if app.packages.uninstall.is_pending() {
        stat.push_str("  卸载中...");
    }
    f.render_widget(
        Paragraph::new(stat).style(Style::default().fg(palette.dim)),
        inner_chunks[1],
    );

    if visible.is_empty() {
        let hint = if app.packages.search.content().is_empty() {
            "  没有已安装的包"
        } else {
            "  未找到匹配的包"
        };
        f.render_widget(
            Paragraph::new(hint).style(Style::default().fg(palette.dim)),
            inner_chunks[2],
        );
        return;
    }

    render_package_list(f, app, &visible, palette, inner_chunks[2]);
}

/// 渲染已安装包列表
fn render_package_list(
    f: &mut Frame,
    app: &App,
    packages: &[&crate::gateway::Package],
    palette: &Palette,
    area: Rect,
) {
    let visible_height = area.height as usize;
    let total = packages.len();
    let scroll = list_scroll(app.packages.selected, visible_height);

    // 计算版本列对齐宽度
    let max_name_width = packages
        .iter()
        .skip(scroll)
        .take(visible_height)
        .map(|pkg| UnicodeWidthStr::width(pkg.name.as_str()))
        .max()
        .unwrap_or(20);

    let pending = app
        .packages
        .confirm
        .as_deref()
        .filter(|_| !app.packages.uninstall.is_pending());

    let lines: Vec<Line> = packages
        .iter()
        .enumerate()
        .skip(scroll)
        .take(visible_height)
        .map(|(idx, pkg)| {
            let is_selected = idx == app.packages.selected;
            let cursor = if is_selected { "> " } else { "  " };
            let padding = max_name_width.saturating_sub(UnicodeWidthStr::width(pkg.name.as_str())) + 2;

            if is_selected {
                // 选中行：深色背景 + 多色加粗
                let bg = Style::default().bg(palette.sel_bg);
                let name_color = if pending == Some(pkg.name.as_str()) {
                    palette.error
                } else {
                    palette.strong
                };
                Line::from(vec![
                    Span::styled(cursor, bg.fg(palette.strong).add_modifier(Modifier::BOLD)),
                    Span::styled(pkg.name.clone(), bg.fg(name_color).add_modifier(Modifier::BOLD)),
                    Span::styled(format!("{}{}", " ".repeat(padding), pkg.version), bg.fg(palette.desc_dim)),
                ])
            } else {
                Line::from(vec![
                    Span::styled(cursor, Style::default().fg(palette.text)),
                    Span::styled(pkg.name.clone(), Style::default().fg(palette.primary)),
                    Span::styled(format!("{}{}", " ".repeat(padding), pkg.version), Style::default().fg(palette.dim)),
                ])
            }
        })
        .collect();

    f.render_widget(Paragraph::new(lines), area);

    // 滚动条
    if total > visible_height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("↑"))
            .end_symbol(Some("↓"));
        let mut state = ScrollbarState::new(total).position(scroll);
        f.render_stateful_widget(
            scrollbar,
            area.inner(Margin { horizontal: 0, vertical: 0 }),
            &mut state,
        );
    }
}

/// 卸载确认弹窗
pub fn render_confirm(f: &mut Frame, app: &App, palette: &Palette) {
    if let Some(name) = &app.packages.confirm {
        let manager = app
            .selected_manager()
            .map(|m| m.name.as_str())
            .unwrap_or("?");
        layout::render_popup(
            f,
            "确认卸载",
            &format!("从 {manager} 卸载 {name}？ (y/n)"),
            palette,
        );
    }
}
