//! Unit tests for template resolution.

use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn vars() -> TemplateVars {
    TemplateVars::from([
        (String::from("x"), String::from("root")),
        (String::from("y"), String::from("leaf")),
        (String::from("version"), String::from("7")),
    ])
}

// ---------------------------------------------------------------------------
// format_str
// ---------------------------------------------------------------------------

#[rstest]
#[case::plain("no placeholders", "no placeholders")]
#[case::two_vars("{x}/{y}", "root/leaf")]
#[case::escaped("{{x}} is {x}", "{x} is root")]
#[case::zero_pad("v{version:0>3}", "v007")]
#[case::implicit_zero("v{version:03}", "v007")]
#[case::left_align("[{y:<6}]", "[leaf  ]")]
#[case::right_align("[{y:>6}]", "[  leaf]")]
#[case::center("[{y:*^8}]", "[**leaf**]")]
#[case::width_only("[{y:6}]", "[leaf  ]")]
#[case::narrow_width("{y:2}", "leaf")]
fn format_str_renders(vars: TemplateVars, #[case] template: &str, #[case] expected: &str) {
    assert_eq!(format_str(template, &vars).expect("format"), expected);
}

#[rstest]
fn missing_variable_names_the_key_and_carries_context(vars: TemplateVars) {
    let err = format_str("{x}/{z}", &vars).expect_err("z is missing");
    match err {
        PipelineError::MissingVariable { key, context } => {
            assert_eq!(key, "z");
            assert_eq!(context, vars);
        }
        other => panic!("expected MissingVariable, got {other:?}"),
    }
}

#[rstest]
#[case::unterminated("{x")]
#[case::stray_close("x}")]
#[case::empty("{}")]
#[case::nested("{x{y}}")]
#[case::bad_width("{x:>abc}")]
fn malformed_templates_are_rejected(vars: TemplateVars, #[case] template: &str) {
    let err = format_str(template, &vars).expect_err("template is malformed");
    assert!(
        matches!(err, PipelineError::TemplateSyntax { .. }),
        "expected TemplateSyntax, got {err:?}"
    );
}

// ---------------------------------------------------------------------------
// format_value
// ---------------------------------------------------------------------------

#[rstest]
fn format_value_preserves_structure(vars: TemplateVars) {
    let value = TemplateValue::Map(BTreeMap::from([
        (String::from("A"), TemplateValue::from("{x}/{y}")),
        (
            String::from("B"),
            TemplateValue::from(vec!["{x}", "{y}"]),
        ),
    ]));

    let formatted = format_value(&value, &vars).expect("format value");

    let expected = TemplateValue::Map(BTreeMap::from([
        (String::from("A"), TemplateValue::from("root/leaf")),
        (
            String::from("B"),
            TemplateValue::from(vec!["root", "leaf"]),
        ),
    ]));
    assert_eq!(formatted, expected);
}

#[test]
fn format_value_without_variable_fails_with_its_name() {
    let value = TemplateValue::Map(BTreeMap::from([(
        String::from("A"),
        TemplateValue::from("{x}/{y}"),
    )]));
    let vars = TemplateVars::from([(String::from("x"), String::from("root"))]);

    let err = format_value(&value, &vars).expect_err("y is missing");
    assert!(matches!(err, PipelineError::MissingVariable { ref key, .. } if key == "y"));
}

// ---------------------------------------------------------------------------
// prepare_environment
// ---------------------------------------------------------------------------

#[test]
fn prepare_environment_joins_lists_and_drops_nested_values() {
    let environment = BTreeMap::from([
        (String::from("SIMPLE"), TemplateValue::from("{x}")),
        (
            String::from("PYTHONPATH"),
            TemplateValue::from(vec!["/a", "/b"]),
        ),
        (
            String::from("NESTED"),
            TemplateValue::List(vec![TemplateValue::from(vec!["/c"])]),
        ),
        (String::from("MAPPING"), TemplateValue::Map(BTreeMap::new())),
    ]);

    let prepared = prepare_environment(&environment);

    assert_eq!(prepared.get("SIMPLE").map(String::as_str), Some("{x}"));
    assert_eq!(
        prepared.get("PYTHONPATH").cloned(),
        Some(format!("/a{PATH_LIST_SEPARATOR}/b"))
    );
    assert!(!prepared.contains_key("NESTED"));
    assert!(!prepared.contains_key("MAPPING"));
}
