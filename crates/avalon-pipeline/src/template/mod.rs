//! `{variable}` template resolution.
//!
//! Templates use a small subset of Python's format-string grammar:
//!
//! - `{name}` is replaced by the value of `name`;
//! - `{name:spec}` pads the value according to `spec`, written
//!   `[[fill]align][width]` with `<`, `>` or `^` as alignment, so
//!   `v{version:0>3}` renders version `7` as `v007`;
//! - `{{` and `}}` produce literal braces.
//!
//! [`format_value`] applies [`format_str`] recursively over a
//! [`TemplateValue`], preserving its shape. [`prepare_environment`] flattens
//! an application environment template into plain strings first.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

use avalon_config::TemplateValue;
use tracing::error;

use crate::error::PipelineError;

/// Tracing target for template resolution.
const TEMPLATE_TARGET: &str = "avalon_pipeline::template";

/// Separator used to join path lists in environment values.
#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: &str = ";";

/// Separator used to join path lists in environment values.
#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: &str = ":";

/// Variables available to a template.
pub type TemplateVars = BTreeMap<String, String>;

/// Replaces every placeholder in `template` with its value from `vars`.
///
/// # Errors
///
/// Returns [`PipelineError::MissingVariable`] for a placeholder without a
/// value and [`PipelineError::TemplateSyntax`] for unbalanced braces, an
/// empty placeholder or an invalid format spec.
pub fn format_str(template: &str, vars: &TemplateVars) -> Result<String, PipelineError> {
    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.next_if_eq(&'{').is_some() => output.push('{'),
            '{' => {
                let field = read_field(template, &mut chars)?;
                output.push_str(&render_field(template, &field, vars)?);
            }
            '}' if chars.next_if_eq(&'}').is_some() => output.push('}'),
            '}' => return Err(syntax(template, "single '}' encountered")),
            other => output.push(other),
        }
    }

    Ok(output)
}

/// Formats every string inside `value`, keeping lists and maps intact.
///
/// # Errors
///
/// Returns the first error raised by [`format_str`].
pub fn format_value(
    value: &TemplateValue,
    vars: &TemplateVars,
) -> Result<TemplateValue, PipelineError> {
    match value {
        TemplateValue::Text(text) => format_str(text, vars).map(TemplateValue::Text),
        TemplateValue::List(items) => items
            .iter()
            .map(|item| format_value(item, vars))
            .collect::<Result<Vec<_>, _>>()
            .map(TemplateValue::List),
        TemplateValue::Map(entries) => entries
            .iter()
            .map(|(key, item)| Ok((key.clone(), format_value(item, vars)?)))
            .collect::<Result<BTreeMap<_, _>, PipelineError>>()
            .map(TemplateValue::Map),
    }
}

/// Flattens an environment template into unresolved strings.
///
/// Lists of strings become path lists joined with
/// [`PATH_LIST_SEPARATOR`]. Entries that are neither strings nor lists of
/// strings are logged and dropped.
#[must_use]
pub fn prepare_environment(environment: &BTreeMap<String, TemplateValue>) -> TemplateVars {
    let mut prepared = TemplateVars::new();
    for (key, value) in environment {
        match value {
            TemplateValue::Text(text) => {
                prepared.insert(key.clone(), text.clone());
            }
            TemplateValue::List(items) => {
                let texts: Option<Vec<&str>> = items.iter().map(TemplateValue::as_text).collect();
                match texts {
                    Some(parts) => {
                        prepared.insert(key.clone(), parts.join(PATH_LIST_SEPARATOR));
                    }
                    None => error!(
                        target: TEMPLATE_TARGET,
                        variable = key.as_str(),
                        "unsupported nested value in path list; entry dropped"
                    ),
                }
            }
            TemplateValue::Map(_) => {
                error!(
                    target: TEMPLATE_TARGET,
                    variable = key.as_str(),
                    "unsupported mapping in environment template; entry dropped"
                );
            }
        }
    }
    prepared
}

fn read_field(template: &str, chars: &mut Peekable<Chars<'_>>) -> Result<String, PipelineError> {
    let mut field = String::new();
    for ch in chars.by_ref() {
        match ch {
            '}' => return Ok(field),
            '{' => return Err(syntax(template, "unexpected '{' inside placeholder")),
            other => field.push(other),
        }
    }
    Err(syntax(template, "unterminated placeholder"))
}

fn render_field(template: &str, field: &str, vars: &TemplateVars) -> Result<String, PipelineError> {
    let (name, spec) = match field.split_once(':') {
        Some((name, spec)) => (name, Some(spec)),
        None => (field, None),
    };
    if name.is_empty() {
        return Err(syntax(template, "empty placeholder"));
    }

    let Some(value) = vars.get(name) else {
        error!(
            target: TEMPLATE_TARGET,
            key = name,
            context = %serde_json::to_string_pretty(vars).unwrap_or_default(),
            "template variable was not found in this session"
        );
        return Err(PipelineError::MissingVariable {
            key: name.to_owned(),
            context: vars.clone(),
        });
    };

    match spec {
        Some(format_spec) => {
            FormatSpec::parse(template, format_spec).map(|format| format.apply(value))
        }
        None => Ok(value.clone()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
}

impl Align {
    const fn from_char(ch: char) -> Option<Self> {
        match ch {
            '<' => Some(Self::Left),
            '>' => Some(Self::Right),
            '^' => Some(Self::Center),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormatSpec {
    fill: char,
    align: Align,
    width: usize,
}

impl FormatSpec {
    fn parse(template: &str, spec: &str) -> Result<Self, PipelineError> {
        let mut chars = spec.chars();
        let first = chars.next();
        let explicit_align = chars.clone().next().and_then(Align::from_char);

        let (fill, align, digits) = match (first, explicit_align) {
            (Some(fill), Some(align)) => {
                chars.next();
                (fill, align, chars.as_str())
            }
            (Some(marker), None) => match Align::from_char(marker) {
                Some(align) => (' ', align, chars.as_str()),
                None if marker == '0' => ('0', Align::Right, spec),
                None => (' ', Align::Left, spec),
            },
            (None, _) => (' ', Align::Left, spec),
        };

        let width = if digits.is_empty() {
            0
        } else {
            digits
                .parse::<usize>()
                .map_err(|_| syntax(template, &format!("invalid format spec '{spec}'")))?
        };

        Ok(Self { fill, align, width })
    }

    fn apply(self, value: &str) -> String {
        let padding = self.width.saturating_sub(value.chars().count());
        let (left, right) = match self.align {
            Align::Left => (0, padding),
            Align::Right => (padding, 0),
            Align::Center => {
                let left = padding.div_euclid(2);
                (left, padding - left)
            }
        };
        let mut output = String::with_capacity(value.len() + padding);
        output.extend(std::iter::repeat_n(self.fill, left));
        output.push_str(value);
        output.extend(std::iter::repeat_n(self.fill, right));
        output
    }
}

fn syntax(template: &str, message: &str) -> PipelineError {
    PipelineError::TemplateSyntax {
        template: template.to_owned(),
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests;
