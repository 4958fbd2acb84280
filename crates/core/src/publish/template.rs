//! Template launch documents.
//!
//! A template is a set of files posted with a publish. Text files are
//! embedded in the document; binary files are stored separately and
//! referenced by URL. The document is a form that submits itself to the
//! configured launch URL on load.

use std::collections::HashMap;

use serde_json::Value;

const DEPENDENCY_FIELDS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// How an asset appears in the launch document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetBody {
    Inline(String),
    Url(String),
}

/// Anything that is not NUL-free UTF-8.
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.contains(&0) || std::str::from_utf8(bytes).is_err()
}

/// Point dependencies on freshly published packages at their download URLs.
///
/// Text that is not a JSON object is returned unchanged.
pub fn rewrite_package_json(text: &str, published: &HashMap<String, String>) -> String {
    let Ok(mut manifest) = serde_json::from_str::<Value>(text) else {
        return text.to_string();
    };
    let Some(fields) = manifest.as_object_mut() else {
        return text.to_string();
    };

    let mut changed = false;
    for field in DEPENDENCY_FIELDS {
        let Some(Value::Object(deps)) = fields.get_mut(field) else {
            continue;
        };
        for (name, version) in deps.iter_mut() {
            if let Some(url) = published.get(name) {
                *version = Value::String(url.clone());
                changed = true;
            }
        }
    }

    if !changed {
        return text.to_string();
    }
    serde_json::to_string_pretty(&manifest).unwrap_or_else(|_| text.to_string())
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Self-submitting HTML form carrying every asset of one template.
pub fn render_launch_document(
    title: &str,
    launch_url: &str,
    assets: &[(String, AssetBody)],
) -> String {
    let mut inputs = String::new();
    for (path, body) in assets {
        let (field, value) = match body {
            AssetBody::Inline(text) => ("files", text.as_str()),
            AssetBody::Url(url) => ("urls", url.as_str()),
        };
        inputs.push_str(&format!(
            "    <input type=\"hidden\" name=\"project[{field}][{}]\" value=\"{}\">\n",
            escape_html(path),
            escape_html(value)
        ));
    }

    let title = escape_html(title);
    format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
</head>
<body>
  <form id="launch" method="post" action="{action}">
    <input type="hidden" name="project[title]" value="{title}">
    <input type="hidden" name="project[template]" value="node">
{inputs}  </form>
  <script>document.getElementById("launch").submit();</script>
</body>
</html>
"#,
        action = escape_html(launch_url),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_detection() {
        assert!(!is_binary(b"console.log('hi')\n"));
        assert!(!is_binary("héllo".as_bytes()));
        assert!(is_binary(&[0x89, b'P', b'N', b'G', 0x00]));
        assert!(is_binary(&[0xff, 0xfe]));
    }

    #[test]
    fn test_rewrite_package_json() {
        let published = HashMap::from([(
            "widgets".to_string(),
            "https://pkg.example/acme/widgets@deadbee".to_string(),
        )]);
        let text = r#"{"name":"demo","dependencies":{"widgets":"^1.0.0","left-pad":"1.3.0"},"devDependencies":{"widgets":"*"}}"#;

        let rewritten: Value = serde_json::from_str(&rewrite_package_json(text, &published)).unwrap();
        assert_eq!(
            rewritten["dependencies"]["widgets"],
            "https://pkg.example/acme/widgets@deadbee"
        );
        assert_eq!(rewritten["dependencies"]["left-pad"], "1.3.0");
        assert_eq!(
            rewritten["devDependencies"]["widgets"],
            "https://pkg.example/acme/widgets@deadbee"
        );
    }

    #[test]
    fn test_rewrite_leaves_unrelated_text_untouched() {
        let published = HashMap::new();
        assert_eq!(rewrite_package_json("not json", &published), "not json");
        let text = r#"{"dependencies":{"a":"1"}}"#;
        assert_eq!(rewrite_package_json(text, &published), text);
    }

    #[test]
    fn test_launch_document_escapes_values() {
        let html = render_launch_document(
            "default",
            "https://launch.example/run",
            &[
                (
                    "index.js".to_string(),
                    AssetBody::Inline("if (a < b && c) { \"x\" }".to_string()),
                ),
                (
                    "logo.png".to_string(),
                    AssetBody::Url("/template/1234".to_string()),
                ),
            ],
        );
        assert!(html.contains(r#"action="https://launch.example/run""#));
        assert!(html.contains(
            r#"name="project[files][index.js]" value="if (a &lt; b &amp;&amp; c) { &quot;x&quot; }""#
        ));
        assert!(html.contains(r#"name="project[urls][logo.png]" value="/template/1234""#));
        assert!(html.contains(".submit()"));
    }
}
