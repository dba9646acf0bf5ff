//! MathML markup for places where no image is rendered: palette tiles and the
//! no-script fallback of the advanced preview.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MathStyle {
    Inline,
    Display,
}

#[derive(Debug, Clone)]
pub(crate) enum MathMarkup {
    MathMl(String),
    /// The converter rejected the formula; holds the escaped source instead.
    Source(String),
}

impl MathMarkup {
    pub(crate) fn into_html(self) -> String {
        match self {
            MathMarkup::MathMl(html) | MathMarkup::Source(html) => html,
        }
    }
}

/// Converts `tex` to MathML. Formulas `latex2mathml` cannot handle come back
/// as a `<code>` block with the raw source.
pub(crate) fn render_mathml(tex: &str, style: MathStyle) -> MathMarkup {
    let display_style = match style {
        MathStyle::Inline => latex2mathml::DisplayStyle::Inline,
        MathStyle::Display => latex2mathml::DisplayStyle::Block,
    };

    match latex2mathml::latex_to_mathml(tex, display_style) {
        Ok(mathml) => MathMarkup::MathMl(sanitize_mathml(&mathml)),
        Err(_) => MathMarkup::Source(format!(
            r#"<code class="tex-source">{}</code>"#,
            html_escape(tex)
        )),
    }
}

const TOKEN_ELEMENTS: [&str; 5] = ["mi", "mn", "mo", "mtext", "ms"];

/// Makes `latex2mathml` output well-formed XML. The converter writes token
/// text verbatim, so `a<b` comes out as `<mo><</mo>`, and angle brackets use
/// the HTML-only `&lang;`/`&rang;` entities.
pub(crate) fn sanitize_mathml(mathml: &str) -> String {
    let mut out = String::with_capacity(mathml.len());
    let mut rest = mathml;
    while let Some(open) = rest.find('<') {
        let (before, tail) = rest.split_at(open);
        out.push_str(before);
        let Some(end) = tail.find('>') else {
            rest = tail;
            break;
        };
        let tag = &tail[..=end];
        out.push_str(tag);
        rest = &tail[end + 1..];

        let name = tag[1..tag.len() - 1]
            .split_whitespace()
            .next()
            .unwrap_or_default();
        if tag.ends_with("/>") || !TOKEN_ELEMENTS.contains(&name) {
            continue;
        }
        let close = format!("</{name}>");
        let Some(stop) = rest.find(&close) else {
            continue;
        };
        let text = rest[..stop]
            .replace("&lang;", "\u{27e8}")
            .replace("&rang;", "\u{27e9}");
        escape_token_text(&mut out, &text);
        out.push_str(&close);
        rest = &rest[stop + close.len()..];
    }
    out.push_str(rest);
    out
}

/// Escapes markup characters, keeping numeric character references.
fn escape_token_text(out: &mut String, text: &str) {
    for (index, c) in text.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' if !is_char_reference(&text[index..]) => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
}

fn is_char_reference(text: &str) -> bool {
    let Some(body) = text.strip_prefix("&#") else {
        return false;
    };
    let Some(end) = body.find(';') else {
        return false;
    };
    let digits = &body[..end];
    match digits.strip_prefix(['x', 'X']) {
        Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
    }
}

/// Escapes text for HTML and XML content or attribute values.
pub(crate) fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
