mod dashboard;
pub mod input;
mod layout;
mod operations;
mod packages;
mod security;
mod settings;
pub mod state;
mod theme;

use crate::cache::CacheEvent;
use crate::config::Config;
use crate::store::{FileStorage, SettingsStore, Tab};
use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Frame, Terminal};
use state::App;
use std::io;
use std::time::Instant;
use tokio::sync::mpsc;

pub async fn run(config: Config) -> Result<()> {
    let store = SettingsStore::open(Box::new(FileStorage::new(config.state_dir.clone())));
    let (tx, mut rx) = mpsc::channel::<CacheEvent>(32);
    let mut app = App::new(config, store, tx)?;
    app.sync_subscriptions();

    // 终端初始化
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // 主循环
    loop {
        app.tick(Instant::now());

        terminal.draw(|f| ui(f, &app))?;

        // 处理按键
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(key, &mut app);
                }
            }
        }

        // 处理异步事件
        while let Ok(event) = rx.try_recv() {
            app.handle_cache_event(event);
        }

        if app.should_quit {
            break;
        }
    }

    // 恢复终端
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(())
}

/// 当前是否有输入框在接收字符
fn capturing_input(app: &App) -> bool {
    match app.active_tab() {
        Tab::Packages => app.packages.searching || app.packages.confirm.is_some(),
        Tab::Operations => app.operations.editing || app.operations.confirm_rollback,
        Tab::Settings => app.settings_view.editing,
        _ => false,
    }
}

fn handle_key(key: KeyEvent, app: &mut App) {
    app.clear_errors();

    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // 全局按键
    if !capturing_input(app) {
        match key.code {
            KeyCode::Tab => return app.switch_tab(app.active_tab().next()),
            KeyCode::BackTab => return app.switch_tab(app.active_tab().prev()),
            KeyCode::Char(c @ '1'..='5') => {
                let idx = c as usize - '1' as usize;
                return app.switch_tab(Tab::ALL[idx]);
            }
            KeyCode::Char('q') if app.active_tab() == Tab::Overview => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('r') => return app.refresh_current(),
            _ => {}
        }
    }

    let handled = match app.active_tab() {
        Tab::Overview => dashboard::handle_key(key, app),
        Tab::Packages => packages::handle_key(key, app),
        Tab::Operations => operations::handle_key(key, app),
        Tab::Security => security::handle_key(key, app),
        Tab::Settings => settings::handle_key(key, app),
    };
    if !handled {
        log::trace!("未处理的按键 {:?}", key.code);
    }
}

fn ui(f: &mut Frame, app: &App) {
    let palette = app.palette();
    let chunks = layout::main_layout(f.area());

    let manager = app.selected_manager().map(|m| {
        if app.settings().show_icons {
            format!("{} {}", theme::manager_icon(&m.id), m.name)
        } else {
            m.name.clone()
        }
    });
    layout::render_header(f, app.active_tab(), manager.as_deref(), &palette, chunks[0]);

    let hints = match app.active_tab() {
        Tab::Overview => {
            dashboard::render(f, app, &palette, chunks[1]);
            dashboard::HINTS
        }
        Tab::Packages => {
            packages::render(f, app, &palette, chunks[1]);
            packages::hints(app)
        }
        Tab::Operations => {
            operations::render(f, app, &palette, chunks[1]);
            operations::hints(app)
        }
        Tab::Security => {
            security::render(f, app, &palette, chunks[1]);
            security::HINTS
        }
        Tab::Settings => {
            settings::render(f, app, &palette, chunks[1]);
            settings::hints(app)
        }
    };

    let message = app.footer_message();
    layout::render_footer(f, message.as_deref(), hints, &palette, chunks[2]);

    match app.active_tab() {
        Tab::Packages => packages::render_confirm(f, app, &palette),
        Tab::Operations => operations::render_confirm(f, app, &palette),
        _ => {}
    }
}
