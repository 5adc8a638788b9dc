//! HTML helpers for Telegram messages

/// Maximum length of a single Telegram message
pub const MESSAGE_LIMIT: usize = 4096;

/// Escape text for Telegram's HTML parse mode
#[must_use]
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// An HTML deep link that mentions a user by id
#[must_use]
pub fn user_link(user_id: u64, label: &str) -> String {
    format!("<a href=\"tg://user?id={user_id}\">{}</a>", escape(label))
}

/// Deep link to a message inside a supergroup
///
/// Telegram addresses supergroup messages as `t.me/c/<internal>/<msg>`,
/// where `<internal>` is the chat id without the `-100` prefix.
#[must_use]
pub fn message_link(chat_id: i64, message_id: i64) -> String {
    let raw = chat_id.to_string();
    let internal = raw
        .strip_prefix("-100")
        .filter(|rest| !rest.is_empty())
        .map_or_else(|| chat_id.unsigned_abs().to_string(), ToString::to_string);
    format!("https://t.me/c/{internal}/{message_id}")
}

/// Split pre-rendered lines into chunks that fit in one message each
///
/// Lines longer than the limit are truncated rather than split mid-tag.
#[must_use]
pub fn chunk_lines(lines: &[String], limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in lines {
        let line: &str = if line.len() > limit {
            let mut cut = limit;
            while cut > 0 && !line.is_char_boundary(cut) {
                cut -= 1;
            }
            &line[..cut]
        } else {
            line
        };
        let needed = line.len() + usize::from(!current.is_empty());
        if !current.is_empty() && current.len() + needed > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
