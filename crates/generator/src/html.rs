use serde_json::Value;
use site_builder_core::FieldData;
use site_builder_validator::{is_hex_color, is_unsafe_url};

/// HTML-escape a string to prevent XSS attacks
///
/// Escapes: & < > " '
pub fn html_escape(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#x27;".to_string(),
            _ => c.to_string(),
        })
        .collect()
}

/// Escaped URL for href/src attributes; script URLs become `#`
pub fn safe_url(url: &str) -> String {
    if is_unsafe_url(url) {
        "#".to_string()
    } else {
        html_escape(url.trim())
    }
}

/// The color if it is a hex literal, otherwise `fallback`
pub fn css_color<'a>(color: &'a str, fallback: &'a str) -> &'a str {
    if is_hex_color(color) { color } else { fallback }
}

/// Typed access to merged component data.
///
/// Missing or mistyped values read as empty, so a component with an absent
/// required field still renders.
pub struct Fields<'a> {
    data: &'a FieldData,
}

impl<'a> Fields<'a> {
    pub fn new(data: &'a FieldData) -> Self {
        Self { data }
    }

    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        self.data.get(name)
    }

    /// Text value, numbers included, unescaped
    pub fn text(&self, name: &str) -> String {
        match self.data.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    /// HTML-escaped text
    pub fn escaped(&self, name: &str) -> String {
        html_escape(&self.text(name))
    }

    pub fn url(&self, name: &str) -> String {
        safe_url(&self.text(name))
    }

    pub fn flag(&self, name: &str) -> bool {
        self.data.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.data.get(name) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> &'a [Value] {
        self.data
            .get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Select value if it is one of `allowed`, otherwise `fallback`
    pub fn choice(&self, name: &str, allowed: &[&'static str], fallback: &'static str) -> &'static str {
        let value = self.text(name);
        allowed
            .iter()
            .copied()
            .find(|a| *a == value)
            .unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#x27;y&#x27;"
        );
    }

    #[test]
    fn test_safe_url() {
        assert_eq!(safe_url("javascript:alert(1)"), "#");
        assert_eq!(safe_url(" /about.html "), "/about.html");
        assert_eq!(safe_url("https://x.com/?a=1&b=2"), "https://x.com/?a=1&amp;b=2");
    }

    #[test]
    fn test_fields() {
        let data = json!({
            "title": "<b>Hi</b>",
            "count": 3,
            "flag": true,
            "level": "h7",
            "images": ["a.png"]
        });
        let data = data.as_object().unwrap();
        let fields = Fields::new(data);

        assert_eq!(fields.escaped("title"), "&lt;b&gt;Hi&lt;/b&gt;");
        assert_eq!(fields.text("count"), "3");
        assert_eq!(fields.number("count"), Some(3.0));
        assert!(fields.flag("flag"));
        assert!(!fields.flag("missing"));
        assert_eq!(fields.text("missing"), "");
        assert_eq!(fields.choice("level", &["h1", "h2", "h3"], "h2"), "h2");
        assert_eq!(fields.list("images").len(), 1);
        assert!(fields.list("title").is_empty());
    }

    #[test]
    fn test_css_color() {
        assert_eq!(css_color("#112233", "var(--x)"), "#112233");
        assert_eq!(css_color("red;}</style>", "var(--x)"), "var(--x)");
    }
}
