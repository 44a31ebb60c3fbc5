use super::theme::Palette;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// 通用文本输入框组件，支持 UTF-8 (中英文)
#[derive(Debug, Clone, Default)]
pub struct InputBox {
    /// 输入内容
    content: String,
    /// 光标位置（按字符计数，非字节）
    cursor: usize,
}

impl InputBox {
    /// 在光标处插入字符
    pub fn insert(&mut self, c: char) {
        str_insert_char(&mut self.content, &mut self.cursor, c);
    }

    pub fn delete_back(&mut self) {
        str_delete_back(&mut self.content, &mut self.cursor);
    }

    pub fn delete_forward(&mut self) {
        str_delete_forward(&mut self.content, &mut self.cursor);
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// 光标右移
    pub fn move_right(&mut self) {
        let char_count = self.content.chars().count();
        if self.cursor < char_count {
            self.cursor += 1;
        }
    }

    /// 光标移到行首
    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.content.chars().count();
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }

    /// 获取内容
    pub fn content(&self) -> &str {
        &self.content
    }

    /// 获取光标位置
    pub fn cursor_pos(&self) -> usize {
        self.cursor
    }
}

/// 把一行文本按光标拆成 (光标前, 光标字符, 光标后)
pub fn split_at_cursor(text: &str, cursor: usize) -> (String, String, String) {
    let before: String = text.chars().take(cursor).collect();
    let cursor_char: String = text.chars().skip(cursor).take(1).collect();
    let after: String = text.chars().skip(cursor + 1).collect();
    let cursor_char = if cursor_char.is_empty() {
        " ".to_string()
    } else {
        cursor_char
    };
    (before, cursor_char, after)
}

/// 渲染输入框
pub fn render_input_box(
    f: &mut Frame,
    input: &InputBox,
    label: &str,
    focused: bool,
    palette: &Palette,
    area: Rect,
) {
    let border_color = if focused { palette.border } else { palette.dim };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    // 构建显示内容：label + 输入文本 + 光标
    let (before, cursor_char, after) = split_at_cursor(input.content(), input.cursor_pos());

    let mut spans = vec![
        Span::styled(
            format!("{label} "),
            Style::default()
                .fg(palette.primary)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(before, Style::default().fg(palette.text)),
    ];

    if focused {
        spans.push(Span::styled(
            cursor_char,
            Style::default().fg(Color::Black).bg(palette.strong),
        ));
    } else {
        spans.push(Span::styled(cursor_char, Style::default().fg(palette.text)));
    }

    spans.push(Span::styled(after, Style::default().fg(palette.text)));

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    f.render_widget(paragraph, area);
}

// ===== 共享文本编辑工具函数 =====

/// UTF-8 安全的字符位置转字节位置
pub fn char_to_byte(s: &str, char_pos: usize) -> usize {
    s.char_indices()
        .nth(char_pos)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// 在字符串的指定光标位置插入字符，返回新的光标位置
pub fn str_insert_char(s: &mut String, cursor: &mut usize, c: char) {
    let byte_pos = char_to_byte(s, *cursor);
    s.insert(byte_pos, c);
    *cursor += 1;
}

/// Backspace: 删除光标前的字符
pub fn str_delete_back(s: &mut String, cursor: &mut usize) {
    if *cursor > 0 {
        *cursor -= 1;
        let byte_pos = char_to_byte(s, *cursor);
        let next_byte_pos = char_to_byte(s, *cursor + 1);
        s.drain(byte_pos..next_byte_pos);
    }
}

/// Delete: 删除光标后的字符
pub fn str_delete_forward(s: &mut String, cursor: &mut usize) {
    let char_count = s.chars().count();
    if *cursor < char_count {
        let byte_pos = char_to_byte(s, *cursor);
        let next_byte_pos = char_to_byte(s, *cursor + 1);
        s.drain(byte_pos..next_byte_pos);
    }
}

/// 多行文本中光标所在的 (行, 列)，均按字符计
pub fn cursor_line_col(s: &str, cursor: usize) -> (usize, usize) {
    let mut line = 0;
    let mut col = 0;
    for c in s.chars().take(cursor) {
        if c == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
    }
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_is_char_based() {
        let mut input = InputBox::default();
        for c in "左pad".chars() {
            input.insert(c);
        }
        input.move_home();
        input.move_right();
        input.delete_back();
        assert_eq!(input.content(), "pad");
        assert_eq!(input.cursor_pos(), 0);

        input.move_end();
        input.delete_forward();
        input.delete_back();
        assert_eq!(input.content(), "pa");
        input.clear();
        assert_eq!(input.content(), "");
        assert_eq!(input.cursor_pos(), 0);
    }

    #[test]
    fn cursor_position_in_multiline_text() {
        let text = "flask\n请求\nrequests";
        assert_eq!(cursor_line_col(text, 0), (0, 0));
        assert_eq!(cursor_line_col(text, 6), (1, 0));
        assert_eq!(cursor_line_col(text, 8), (1, 2));
        assert_eq!(cursor_line_col(text, 12), (2, 3));
    }

    #[test]
    fn cursor_split_pads_end_of_line() {
        assert_eq!(
            split_at_cursor("npm", 3),
            ("npm".to_string(), " ".to_string(), String::new())
        );
        assert_eq!(
            split_at_cursor("npm", 1),
            ("n".to_string(), "p".to_string(), "m".to_string())
        );
    }
}
