use std::sync::OnceLock;

use regex::Regex;

struct Patterns {
    amp_chain: Regex,
    blocks: Regex,
    tags: Regex,
    window_open: Regex,
    event_handler: Regex,
    javascript: Regex,
    return_false: Regex,
    truncation: Regex,
    braces: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        amp_chain: compile(r"&(?:amp;)+"),
        blocks: compile(r"(?is)<(script|style)\b.*?(</(script|style)\s*>|$)"),
        tags: compile(r"<[^<>]*>"),
        window_open: compile(r"(?i)window\.open\([^)]*\)?;?"),
        event_handler: compile(r#"(?i)\bon[a-z]+\s*=\s*("[^"]*"?|'[^']*'?|[^\s>]*)"#),
        javascript: compile(r#"(?i)javascript:[^\s"';]*;?"#),
        return_false: compile(r"(?i)return\s+false\s*;?"),
        truncation: compile(r"\[\+\d+\s*chars?\]"),
        braces: compile(r"[{}]"),
    })
}

fn compile(pattern: &str) -> Regex {
    // Patterns are literals above; a failure here is a programming error.
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid sanitizer pattern {pattern}: {err}"))
}

/// Strip markup, inline script remnants and provider noise from article text.
///
/// - `None` or empty input yields an empty string
/// - `<script>`/`<style>` blocks and any other `<tag>` spans are dropped
/// - inline handlers (`onclick=...`), `window.open(...)`, `javascript:` urls
///   and `return false;` fragments are dropped
/// - the `[+N chars]` truncation marker is dropped
/// - tokens made only of quotes are dropped, whitespace is collapsed and trimmed
///
/// The result is a fixpoint: feeding it back in returns it unchanged.
pub fn sanitize(input: Option<&str>) -> String {
    let Some(input) = input else {
        return String::new();
    };
    if input.trim().is_empty() {
        return String::new();
    }

    // A changing pass shortens the text or only normalizes whitespace.
    let mut current = clean_once(input);
    for _ in 0..=input.len() {
        let next = clean_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn clean_once(input: &str) -> String {
    let p = patterns();

    let text = p.blocks.replace_all(input, " ");
    let text = p.tags.replace_all(&text, " ");
    let text = p.braces.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = p.window_open.replace_all(&text, " ");
    let text = p.event_handler.replace_all(&text, " ");
    let text = p.javascript.replace_all(&text, " ");
    let text = p.return_false.replace_all(&text, " ");
    let text = p.truncation.replace_all(&text, " ");

    text.split_whitespace()
        .filter(|token| !token.chars().all(|ch| matches!(ch, '"' | '\'' | '`')))
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    patterns()
        .amp_chain
        .replace_all(input, "&")
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

/// Cut `text` to at most `max_chars` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => {
            let mut out = text[..byte_idx].trim_end().to_string();
            out.push('…');
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_string() {
        assert_eq!(sanitize(None), "");
        assert_eq!(sanitize(Some("")), "");
        assert_eq!(sanitize(Some("   \n\t")), "");
    }

    #[test]
    fn strips_tags() {
        assert_eq!(sanitize(Some("<b>Hi</b> there")), "Hi there");
        assert_eq!(sanitize(Some("<p>One</p><p>Two</p>")), "One Two");
    }

    #[test]
    fn strips_inline_script_fragments() {
        let cleaned = sanitize(Some("Click <a onclick=\"window.open('x')\">here</a>"));
        assert!(!cleaned.contains("onclick"));
        assert!(!cleaned.contains("window.open"));
        assert_eq!(cleaned, "Click here");

        let loose = sanitize(Some(
            "Read more onclick=\"track()\" window.open('https://x.test', '_blank'); return false; now",
        ));
        assert_eq!(loose, "Read more now");

        let js = sanitize(Some("Open javascript:void(0); the story"));
        assert_eq!(js, "Open the story");
    }

    #[test]
    fn drops_script_and_style_blocks() {
        let cleaned = sanitize(Some(
            "Lead<script type=\"text/javascript\">var a = {b: 1};</script> text<style>p{}</style>",
        ));
        assert_eq!(cleaned, "Lead text");
    }

    #[test]
    fn drops_truncation_marker() {
        let cleaned = sanitize(Some("Breaking news... [+1234 chars]"));
        assert!(!cleaned.contains("chars]"));
        assert_eq!(cleaned, "Breaking news...");
    }

    #[test]
    fn drops_brace_and_quote_noise() {
        assert_eq!(sanitize(Some("Markets { \" } rally ''")), "Markets rally");
        assert_eq!(sanitize(Some("It&#39;s &quot;big&quot; &amp; bold")), "It's \"big\" & bold");
    }

    #[test]
    fn collapses_nested_ampersand_escapes() {
        assert_eq!(
            sanitize(Some("&amp;amp;amp;amp;amp;amp;amp;amp;amp;amp;lt;b&amp;gt; x")),
            "&lt;b&gt; x"
        );
        assert_eq!(sanitize(Some("Q&amp;amp;A")), "Q&A");
    }

    #[test]
    fn is_idempotent() {
        let inputs = [
            "<b>Hi</b> there",
            "Click <a onclick=\"window.open('x')\">here</a>",
            "Breaking news... [+1234 chars]",
            "<<b>x>y",
            "a \" \" b",
            "&amp;lt;b&amp;gt; text",
            "&amp;amp;amp;amp;amp;amp;amp;amp;amp;amp;lt;b&amp;gt; x",
            "&{amp;}quot;nested&amp;amp;nbsp;entities",
            "{ \"key\": \"value\" } plain",
            "multi\n\nline   text\twith tabs",
        ];
        for input in inputs {
            let once = sanitize(Some(input));
            assert_eq!(sanitize(Some(&once)), once, "input: {input:?}");
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo…");
        assert_eq!(truncate_chars("anything", 0), "");
    }
}
