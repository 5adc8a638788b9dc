//! User-facing strings, localized per group
//!
//! Groups carry a two-letter language code; Italian is the network default
//! and the fallback for unknown codes.

use crate::perms::ModAction;
use crate::telegram::html;

/// Message language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    It,
    En,
}

impl Lang {
    /// Parse a stored language code, falling back to Italian
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code {
            "en" => Self::En,
            _ => Self::It,
        }
    }
}

/// Usage hint posted when a moderation command has no resolvable target
#[must_use]
pub const fn usage_hint(lang: Lang) -> &'static str {
    match lang {
        Lang::It => {
            "\u{2753} <b>Errore: utente non trovato</b>\
             \n<b>Sintassi dei comandi di moderazione</b>:\
             \n- <code>/comando @username [motivazione]</code>\
             \n- <code>/comando menzione [motivazione]</code>\
             \n- <code>/comando [motivazione]</code> <i>(in risposta a un messaggio)</i>\
             \nRicorda che il campo <code>[motivazione]</code>, \
             nonostante sia vivamente consigliato, \u{e8} facoltativo."
        }
        Lang::En => {
            "\u{2753} <b>Error: user not found</b>\
             \n<b>Moderation command syntax</b>:\
             \n- <code>/command @username [reason]</code>\
             \n- <code>/command mention [reason]</code>\
             \n- <code>/command [reason]</code> <i>(replying to a message)</i>\
             \nThe <code>[reason]</code> field is optional but strongly encouraged."
        }
    }
}

/// Past-participle fragment for a moderation confirmation
#[must_use]
pub const fn action_done(lang: Lang, action: ModAction) -> &'static str {
    match (lang, action) {
        (Lang::It, ModAction::Warn) => "ammoniti",
        (Lang::It, ModAction::Kick) => "kickati",
        (Lang::It, ModAction::Ban) => "bannati",
        (Lang::It, ModAction::Mute) => "mutati",
        (Lang::It, ModAction::Free) => "liberati",
        (Lang::It, ModAction::Superban) => "bannati da tutti i gruppi del network",
        (Lang::It, ModAction::Superfree) => "sbannati da tutti i gruppi del network",
        (Lang::It, _) => "moderati",
        (Lang::En, ModAction::Warn) => "warned",
        (Lang::En, ModAction::Kick) => "kicked",
        (Lang::En, ModAction::Ban) => "banned",
        (Lang::En, ModAction::Mute) => "muted",
        (Lang::En, ModAction::Free) => "freed",
        (Lang::En, ModAction::Superban) => "banned from every group of the network",
        (Lang::En, ModAction::Superfree) => "unbanned from every group of the network",
        (Lang::En, _) => "moderated",
    }
}

/// In-chat confirmation for an applied moderation action
#[must_use]
pub fn confirmation(lang: Lang, action: ModAction, target_name: &str, reason: Option<&str>) -> String {
    let name = html::escape(target_name);
    let mut text = match lang {
        Lang::It => format!(
            "I seguenti utenti sono stati {}: {name}",
            action_done(lang, action)
        ),
        Lang::En => format!(
            "The following users have been {}: {name}",
            action_done(lang, action)
        ),
    };
    if let Some(reason) = reason {
        let label = match lang {
            Lang::It => "per",
            Lang::En => "reason",
        };
        text.push_str(&format!("\n\u{1f4ac} {label}: <i>{}</i>", html::escape(reason)));
    }
    text
}

/// Greeting fragment substituted into a group's welcome template
#[must_use]
pub fn greetings(lang: Lang, names: &[String]) -> String {
    let joined = names.join(", ");
    match (lang, names.len()) {
        (Lang::It, 1) => format!("Benvenuto/a {joined}"),
        (Lang::It, _) => format!("Benvenuti/e {joined}"),
        (Lang::En, _) => format!("Welcome {joined}"),
    }
}

/// Render a group welcome from its template
///
/// The template carries `{greetings}` and `{title}` slots.
#[must_use]
pub fn render_welcome(template: &str, greetings: &str, title: &str) -> String {
    template
        .replace("{greetings}", greetings)
        .replace("{title}", &html::escape(title))
}

/// Acknowledgement posted in chat after an @admin report
#[must_use]
pub const fn admin_call_ack(lang: Lang) -> &'static str {
    match lang {
        Lang::It => "\u{2705} Grazie per la segnalazione, lo staff \u{e8} stato avvisato.",
        Lang::En => "\u{2705} Thanks for your report, the staff has been notified.",
    }
}

/// Notice posted after toggling the @admin opt-out
#[must_use]
pub const fn admin_tagging_toggled(lang: Lang, ignored: bool) -> &'static str {
    match (lang, ignored) {
        (Lang::It, true) => "Le menzioni @admin ora sono ignorate in questo gruppo.",
        (Lang::It, false) => "Le menzioni @admin ora sono attive in questo gruppo.",
        (Lang::En, true) => "@admin mentions are now ignored in this group.",
        (Lang::En, false) => "@admin mentions are now active in this group.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_falls_back_to_italian() {
        assert_eq!(Lang::parse("it"), Lang::It);
        assert_eq!(Lang::parse("en"), Lang::En);
        assert_eq!(Lang::parse("de"), Lang::It);
    }

    #[test]
    fn kick_confirmation_lists_target() {
        let text = confirmation(Lang::It, ModAction::Kick, "Bob", None);
        assert_eq!(text, "I seguenti utenti sono stati kickati: Bob");
    }

    #[test]
    fn confirmation_appends_reason() {
        let text = confirmation(Lang::It, ModAction::Ban, "Bob", Some("spam"));
        assert!(text.contains("bannati: Bob"));
        assert!(text.contains("<i>spam</i>"));
    }

    #[test]
    fn welcome_substitutes_both_slots() {
        let text = render_welcome(
            "<b>{greetings}</b> nel gruppo {title}",
            "Benvenuto/a Ada",
            "Algebra & Geometria",
        );
        assert_eq!(
            text,
            "<b>Benvenuto/a Ada</b> nel gruppo Algebra &amp; Geometria"
        );
    }

    #[test]
    fn greetings_number_agreement() {
        assert!(greetings(Lang::It, &["Ada".to_string()]).starts_with("Benvenuto/a"));
        assert!(
            greetings(Lang::It, &["Ada".to_string(), "Bob".to_string()])
                .starts_with("Benvenuti/e")
        );
    }
}
