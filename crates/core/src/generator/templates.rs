//! Embedded artifact templates and the placeholder renderer.
//!
//! Templates live in the crate's `templates/` directory and are embedded
//! into the binary at compile time with `rust-embed`. A template is plain
//! text with `{{ key }}` placeholders; each placeholder is replaced by the
//! matching context value, verbatim and without further substitution.

use std::collections::BTreeMap;

use rust_embed::RustEmbed;

use super::error::{TemplateError, TemplateResult};

/// Embedded template files from the `templates/` directory.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/templates"]
pub struct TemplateAssets;

/// Get template content by name, e.g. `agent.ts.tmpl`.
pub fn get_template(name: &str) -> Option<String> {
    TemplateAssets::get(name).map(|file| String::from_utf8_lossy(file.data.as_ref()).to_string())
}

/// Names of every embedded template, sorted.
pub fn list_templates() -> Vec<String> {
    let mut names: Vec<String> = TemplateAssets::iter().map(|name| name.to_string()).collect();
    names.sort();
    names
}

/// Render an embedded template.
///
/// # Errors
///
/// Returns `TemplateError::NotFound` for an unknown template name, and the
/// errors of [`render_str`] otherwise.
pub fn render(name: &str, context: &BTreeMap<String, String>) -> TemplateResult<String> {
    let source = get_template(name).ok_or_else(|| TemplateError::NotFound {
        name: name.to_string(),
    })?;
    render_str(name, &source, context)
}

/// Render template text, replacing every `{{ key }}` with `context[key]`.
///
/// # Example
///
/// ```
/// use std::collections::BTreeMap;
/// use sc_core::generator::templates::render_str;
///
/// let context = BTreeMap::from([("name".to_string(), "architect".to_string())]);
/// let rendered = render_str("inline", "agent {{ name }}", &context).expect("renders");
/// assert_eq!(rendered, "agent architect");
/// ```
pub fn render_str(name: &str, source: &str, context: &BTreeMap<String, String>) -> TemplateResult<String> {
    let mut output = String::with_capacity(source.len());
    let mut rest = source;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            return Err(TemplateError::Malformed {
                template: name.to_string(),
                offset: offset + start,
                reason: "unterminated placeholder".to_string(),
            });
        };

        let key = after_open[..end].trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(TemplateError::Malformed {
                template: name.to_string(),
                offset: offset + start,
                reason: format!("invalid placeholder name `{key}`"),
            });
        }
        let value = context.get(key).ok_or_else(|| TemplateError::MissingValue {
            template: name.to_string(),
            key: key.to_string(),
        })?;
        output.push_str(value);

        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::template;

    fn context(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_every_template_name_is_embedded() {
        let names = list_templates();
        for name in [
            template::AGENT,
            template::AGENTS_INDEX,
            template::COMMAND,
            template::COMMANDS_INDEX,
            template::MCP_SERVER,
            template::MCP_README,
            template::COMMAND_MCP,
            template::COMPRESSION_RULES,
            template::SUMMARY,
            template::JSON,
        ] {
            assert!(names.contains(&name.to_string()), "{name} should be embedded");
        }
    }

    #[test]
    fn test_values_are_not_substituted_again() {
        let rendered = render_str(
            "inline",
            "a={{ a }}; b={{b}}",
            &context(&[("a", "{{ b }}"), ("b", "2")]),
        )
        .expect("Failed to render");
        assert_eq!(rendered, "a={{ b }}; b=2");
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let result = render(template::JSON, &BTreeMap::new());
        assert!(matches!(result, Err(TemplateError::MissingValue { ref key, .. }) if key == "json"));
    }

    #[test]
    fn test_malformed_placeholders() {
        assert!(matches!(
            render_str("inline", "x {{ name", &BTreeMap::new()),
            Err(TemplateError::Malformed { offset: 2, .. })
        ));
        assert!(matches!(
            render_str("inline", "{{ not valid }}", &BTreeMap::new()),
            Err(TemplateError::Malformed { .. })
        ));
    }

    #[test]
    fn test_unknown_template() {
        assert!(matches!(
            render("missing.tmpl", &BTreeMap::new()),
            Err(TemplateError::NotFound { .. })
        ));
    }
}
