use super::layout::{render_scrollable_content, spacer, visible_content_height};
use super::state::App;
use super::theme::Palette;
use crate::cache::QueryKey;
use crate::gateway::Vulnerability;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    Frame,
};

pub const HINTS: &str = "↑↓ 滚动 | r 重新扫描 | ←→ 切换管理器";

/// 处理安全页按键
pub fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    match key.code {
        KeyCode::Up => {
            app.security.scroll = app.security.scroll.saturating_sub(1);
            true
        }
        KeyCode::Down => {
            let total = content_lines(app, &app.palette()).len();
            let visible = crossterm::terminal::size()
                .map(|(_, h)| visible_content_height(h))
                .unwrap_or(20);
            if app.security.scroll + visible < total {
                app.security.scroll += 1;
            }
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

pub fn render(f: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let lines = content_lines(app, palette);
    render_scrollable_content(f, "漏洞扫描", lines, app.security.scroll, palette, area);
}

/// 严重程度配色，未知等级按低处理
pub fn severity_color(severity: &str) -> Color {
    match severity.to_ascii_lowercase().as_str() {
        "critical" => Color::Rgb(220, 50, 70),
        "high" => Color::Rgb(240, 110, 80),
        "medium" | "moderate" => Color::Rgb(230, 190, 80),
        _ => Color::Rgb(130, 170, 200),
    }
}

fn content_lines(app: &App, palette: &Palette) -> Vec<Line<'static>> {
    let dim = Style::default().fg(palette.dim);
    if !app.settings().enable_vulnerability_scanning {
        return vec![Line::from(Span::styled("漏洞扫描已在设置中关闭", dim))];
    }
    let Some(id) = app.selected_manager_id() else {
        return vec![Line::from(Span::styled("请先在概览页选择一个包管理器", dim))];
    };

    if let Some(err) = app.cache.state(&QueryKey::Vulnerabilities(id)).error {
        return vec![
            Line::from(Span::styled(format!("✗ {err}"), Style::default().fg(palette.error))),
            Line::from(Span::styled("按 r 重试", dim)),
        ];
    }
    let Some(report) = app.vulnerability_report() else {
        return vec![Line::from(Span::styled(
            "正在扫描已知漏洞...",
            Style::default().fg(palette.border),
        ))];
    };

    let compact = app.settings().compact_mode;
    let mut lines = Vec::new();
    if let Some(scanned) = report.scanned {
        lines.push(Line::from(Span::styled(format!("已扫描 {scanned} 个包"), dim)));
    }
    if let Some(note) = &report.note {
        lines.push(Line::from(Span::styled(note.clone(), dim)));
    }
    if !lines.is_empty() {
        spacer(&mut lines, compact);
    }

    if report.vulnerabilities.is_empty() {
        lines.push(Line::from(Span::styled(
            "✓ 未发现已知漏洞",
            Style::default().fg(palette.ok).add_modifier(Modifier::BOLD),
        )));
        return lines;
    }

    lines.push(Line::from(Span::styled(
        format!("发现 {} 个漏洞", report.vulnerabilities.len()),
        Style::default().fg(palette.error).add_modifier(Modifier::BOLD),
    )));
    for vuln in &report.vulnerabilities {
        spacer(&mut lines, compact);
        lines.extend(vulnerability_lines(vuln, compact, palette));
    }
    lines
}

fn vulnerability_lines(vuln: &Vulnerability, compact: bool, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("[{}] ", vuln.severity.to_uppercase()),
            Style::default()
                .fg(severity_color(&vuln.severity))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            vuln.package.clone(),
            Style::default().fg(palette.strong).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", vuln.title), Style::default().fg(palette.text)),
    ])];
    if compact {
        return lines;
    }
    let detail = Style::default().fg(palette.desc_dim);
    if let Some(id) = &vuln.id {
        lines.push(Line::from(Span::styled(format!("    编号: {id}"), detail)));
    }
    if let Some(affected) = &vuln.affected_versions {
        lines.push(Line::from(Span::styled(format!("    受影响版本: {affected}"), detail)));
    }
    if let Some(fixed) = &vuln.fixed_in {
        lines.push(Line::from(Span::styled(format!("    修复版本: {fixed}"), detail)));
    }
    lines
}
