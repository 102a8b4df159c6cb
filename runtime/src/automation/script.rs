//! Page scripts injected into the calculation surface.
//!
//! ## Security: JS encoding
//!
//! Every caller-provided value (field ids, names, labels, form values) is
//! escaped with [`sanitize_js_string`] and only ever placed inside a string
//! literal, never in a code position.

use super::GlyphQuery;

/// Hides the automation flag some surfaces check before rendering results.
pub const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// True once the document has finished loading.
pub const DOCUMENT_READY: &str = "document.readyState === 'complete'";

/// XPath locating the submit control by visible label or input value.
pub fn submit_xpath(label: &str) -> String {
    format!("//input[@value='{label}'] | //*[contains(normalize-space(text()),'{label}')]")
}

/// Assign `value` to the element with id `id` and fire `change`.
/// Evaluates to `false` when the page has no such element.
pub fn set_field(id: &str, value: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.getElementById('{}');
            if (!el) return false;
            el.value = '{}';
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        sanitize_js_string(id),
        sanitize_js_string(value)
    )
}

/// Click the radio input `name` with the given `value`.
pub fn check_radio(name: &str, value: &str) -> String {
    format!(
        r#"(() => {{
            const el = document.querySelector("input[name='{}'][value='{}']");
            if (!el) return false;
            el.click();
            return true;
        }})()"#,
        sanitize_js_string(name),
        sanitize_js_string(value)
    )
}

/// True when `selector` matches at least one element.
pub fn selector_present(selector: &str) -> String {
    format!(
        "document.querySelector('{}') !== null",
        sanitize_js_string(selector)
    )
}

fn locate_submit(label: &str) -> String {
    format!(
        "document.evaluate('{}', document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
        sanitize_js_string(&submit_xpath(label))
    )
}

/// True when the submit control exists, is rendered and is enabled.
pub fn submit_interactable(label: &str) -> String {
    format!(
        r#"(() => {{
            const el = {};
            if (!el) return false;
            const rect = el.getBoundingClientRect();
            return !el.disabled && rect.width > 0 && rect.height > 0;
        }})()"#,
        locate_submit(label)
    )
}

/// Invoke the submit control's action directly, skipping interactivity checks.
pub fn force_click(label: &str) -> String {
    format!(
        r#"(() => {{
            const el = {};
            if (!el) return false;
            el.click();
            return true;
        }})()"#,
        locate_submit(label)
    )
}

/// Collect the trimmed text of marker-tagged leaves for a glyph query.
pub fn collect_glyphs(query: &GlyphQuery) -> String {
    match query {
        GlyphQuery::Scoped {
            container,
            required_markers,
            leaf,
        } => {
            let markers = required_markers
                .iter()
                .map(|m| format!("'{}'", sanitize_js_string(m)))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                r#"(() => {{
                    const markers = [{markers}];
                    for (const c of document.querySelectorAll('{}')) {{
                        const text = c.textContent || '';
                        if (markers.every(m => text.includes(m))) {{
                            return [...c.querySelectorAll('{}')].map(s => (s.textContent || '').trim());
                        }}
                    }}
                    return [];
                }})()"#,
                sanitize_js_string(container),
                sanitize_js_string(leaf)
            )
        }
        GlyphQuery::Global { leaf } => format!(
            "[...document.querySelectorAll('{}')].map(s => (s.textContent || '').trim())",
            sanitize_js_string(leaf)
        ),
    }
}

/// Sanitize a string for safe injection into a JavaScript string literal.
///
/// Escapes all characters that could break out of a JS string context:
/// - Backslashes, single/double quotes, backticks
/// - Newlines, carriage returns, tabs
/// - HTML script tags
/// - Null bytes
pub fn sanitize_js_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize_js_string("命主"), "命主");
        assert_eq!(sanitize_js_string("it's"), "it\\'s");
        assert_eq!(sanitize_js_string("a\"b"), "a\\\"b");
        assert_eq!(sanitize_js_string("abc\0def"), "abcdef");
    }

    #[test]
    fn test_set_field_escapes_value() {
        let js = set_field("_Name", "x'); alert(1); ('");
        assert!(js.contains("getElementById('_Name')"));
        assert!(js.contains("el.value = 'x\\'); alert(1); (\\''"));
    }

    #[test]
    fn test_submit_xpath_matches_label_and_input() {
        let xpath = submit_xpath("確定送出");
        assert!(xpath.contains("//input[@value='確定送出']"));
        assert!(xpath.contains("normalize-space(text()),'確定送出'"));
        // Embedded in a JS literal the XPath quotes must be escaped.
        assert!(force_click("確定送出").contains("@value=\\'確定送出\\'"));
    }

    #[test]
    fn test_collect_glyphs_scripts() {
        let scoped = collect_glyphs(&GlyphQuery::Scoped {
            container: "div.w10".into(),
            required_markers: vec!["四".into(), "柱".into()],
            leaf: "span.w-blue".into(),
        });
        assert!(scoped.contains("const markers = ['四', '柱'];"));
        assert!(scoped.contains("querySelectorAll('div.w10')"));

        let global = collect_glyphs(&GlyphQuery::Global {
            leaf: "span.w-blue".into(),
        });
        assert!(global.starts_with("[...document.querySelectorAll('span.w-blue')]"));
    }
}
