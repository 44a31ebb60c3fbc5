use super::layout::spacer;
use super::state::App;
use super::theme::{manager_icon, Palette};
use crate::cache::QueryKey;
use crate::store::Tab;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Margin, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub const HINTS: &str = "↑↓ 选择 | Enter 查看软件包 | r 重新检测 | Tab 切换页 | q 退出";

/// 处理概览页按键
pub fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    let count = app.managers().map(|m| m.len()).unwrap_or(0);
    match key.code {
        KeyCode::Up => {
            app.overview.selected = app.overview.selected.saturating_sub(1);
            true
        }
        KeyCode::Down => {
            if app.overview.selected + 1 < count {
                app.overview.selected += 1;
            }
            true
        }
        KeyCode::Enter => {
            let id = app
                .managers()
                .and_then(|m| m.get(app.overview.selected))
                .map(|m| m.id.clone());
            if let Some(id) = id {
                app.select_manager(id);
                app.switch_tab(Tab::Packages);
            }
            true
        }
        _ => false,
    }
}

pub fn render(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let compact = app.settings().compact_mode;
    let mut lines: Vec<Line> = Vec::new();
    spacer(&mut lines, compact);
    lines.push(section_line("── 包管理器 ──", palette));
    spacer(&mut lines, compact);
    lines.extend(manager_lines(app, palette));

    spacer(&mut lines, compact);
    spacer(&mut lines, compact);

    // 快捷键标题
    lines.push(section_line("── 快捷键 ──", palette));
    spacer(&mut lines, compact);

    lines.push(shortcut_line("Tab", " 切换标签页         ", palette));
    lines.push(shortcut_line("1-5", " 跳转到标签页       ", palette));
    lines.push(shortcut_line("←→", " 切换包管理器       ", palette));
    lines.push(shortcut_line("r", " 刷新当前页         ", palette));
    lines.push(shortcut_line("q", " 退出               ", palette));

    spacer(&mut lines, compact);

    // 版本号
    lines.push(Line::from(vec![Span::styled(
        format!("package-audit v{}  {}", env!("CARGO_PKG_VERSION"), app.client.base_url()),
        Style::default().fg(palette.dim),
    )]));

    let content_height = lines.len() as u16;
    let paragraph = Paragraph::new(lines).alignment(Alignment::Center);

    // 垂直居中：计算内容高度，用 Layout 居中
    let padded = inner.inner(Margin {
        horizontal: 1,
        vertical: 0,
    });
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(content_height),
            Constraint::Min(0),
        ])
        .split(padded);

    f.render_widget(paragraph, vertical[1]);
}

/// 管理器卡片；加载中、出错、为空时各有一行提示
fn manager_lines(app: &App, palette: &Palette) -> Vec<Line<'static>> {
    let state = app.cache.state(&QueryKey::Managers);
    if let Some(err) = state.error {
        return vec![
            Line::from(Span::styled(
                format!("✗ {err}"),
                Style::default().fg(palette.error),
            )),
            Line::from(Span::styled(
                "确认服务已启动后按 r 重试",
                Style::default().fg(palette.dim),
            )),
        ];
    }
    let Some(managers) = app.managers() else {
        return vec![Line::from(Span::styled(
            "正在检测包管理器...",
            Style::default().fg(palette.border),
        ))];
    };
    if managers.is_empty() {
        return vec![
            Line::from(Span::styled(
                "未检测到包管理器",
                Style::default().fg(palette.text),
            )),
            Line::from(Span::styled(
                "请在服务端所在机器上安装 npm、pip、winget 或 brew",
                Style::default().fg(palette.dim),
            )),
        ];
    }

    let show_icons = app.settings().show_icons;
    let current = app.selected_manager().map(|m| m.id.clone());
    managers
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let icon = if show_icons {
                format!("{} ", manager_icon(&m.id))
            } else {
                String::new()
            };
            let mark = if current.as_deref() == Some(m.id.as_str()) {
                " ●"
            } else {
                "  "
            };
            let base = if i == app.overview.selected {
                Style::default().bg(palette.sel_bg)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(
                    format!(" {icon}{:<10}", m.name),
                    base.fg(palette.strong).add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!(" v{:<10}", m.version), base.fg(palette.primary)),
                Span::styled(format!("{mark} "), base.fg(palette.accent)),
            ])
        })
        .collect()
}

fn section_line(title: &str, palette: &Palette) -> Line<'static> {
    Line::from(vec![Span::styled(
        title.to_string(),
        Style::default()
            .fg(palette.accent)
            .add_modifier(Modifier::BOLD),
    )])
}

/// 快捷键行: "  X  描述"
fn shortcut_line<'a>(key: &'a str, desc: &'a str, palette: &Palette) -> Line<'a> {
    Line::from(vec![
        Span::styled(
            format!("  {key}"),
            Style::default()
                .fg(palette.border)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(desc.to_string(), Style::default().fg(palette.text)),
    ])
}
