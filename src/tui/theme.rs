//! 主题色定义，按设置里的主题挑选调色板

use crate::store::Theme;
use ratatui::style::Color;

/// 粉色 (MTF flag)
pub const PINK: Color = Color::Rgb(245, 169, 184);
/// 蓝色 (MTF flag)
pub const BLUE: Color = Color::Rgb(91, 206, 250);
/// 选中行背景色
pub const SEL_BG: Color = Color::Rgb(45, 35, 55);
/// 亮白色
pub const BRIGHT_WHITE: Color = Color::Rgb(255, 255, 255);
/// 暗灰色（次要信息）
pub const DIM: Color = Color::Rgb(130, 130, 140);
/// 描述文字灰色（选中行内）
pub const DESC_DIM: Color = Color::Rgb(180, 180, 190);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    /// 分组标题、标记
    pub accent: Color,
    /// 名称、标签
    pub primary: Color,
    pub sel_bg: Color,
    pub text: Color,
    pub strong: Color,
    pub dim: Color,
    pub desc_dim: Color,
    pub border: Color,
    pub ok: Color,
    pub error: Color,
}

const DARK: Palette = Palette {
    accent: PINK,
    primary: BLUE,
    sel_bg: SEL_BG,
    text: Color::White,
    strong: BRIGHT_WHITE,
    dim: DIM,
    desc_dim: DESC_DIM,
    border: Color::Yellow,
    ok: Color::Green,
    error: Color::Red,
};

const LIGHT: Palette = Palette {
    accent: Color::Rgb(190, 60, 100),
    primary: Color::Rgb(20, 100, 170),
    sel_bg: Color::Rgb(225, 230, 240),
    text: Color::Rgb(40, 40, 48),
    strong: Color::Black,
    dim: Color::Rgb(110, 110, 120),
    desc_dim: Color::Rgb(80, 80, 90),
    border: Color::Rgb(150, 120, 30),
    ok: Color::Rgb(20, 130, 50),
    error: Color::Rgb(190, 30, 30),
};

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => DARK,
            Theme::Light => LIGHT,
            Theme::Auto => {
                if terminal_is_light(std::env::var("COLORFGBG").ok().as_deref()) {
                    LIGHT
                } else {
                    DARK
                }
            }
        }
    }
}

/// `COLORFGBG` 形如 `15;0`，最后一段是背景色号；7 和 15 是浅色背景
fn terminal_is_light(colorfgbg: Option<&str>) -> bool {
    colorfgbg
        .and_then(|v| v.rsplit(';').next())
        .and_then(|bg| bg.trim().parse::<u8>().ok())
        .map(|bg| bg == 7 || bg == 15)
        .unwrap_or(false)
}

/// 包管理器图标
pub fn manager_icon(manager_id: &str) -> &'static str {
    match manager_id {
        "npm" => "📦",
        "pip" => "🐍",
        "winget" => "🪟",
        "brew" => "🍺",
        _ => "📋",
    }
}
