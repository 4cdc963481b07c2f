//! Template collaborator: detection and rendering of Jinja2-style strings.
//!
//! The task pipeline itself never interprets template syntax. It only needs
//! to know whether a scalar *is* a template (so typed values can defer
//! resolution) and a way to render one against an assembled variable scope.
//! Rendering is delegated to minijinja.

use minijinja::Environment;
use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::vars::VarMap;

static ENV: Lazy<Environment<'static>> = Lazy::new(Environment::new);

const VAR_START: &str = "{{";
const VAR_END: &str = "}}";
const BLOCK_START: &str = "{%";
const BLOCK_END: &str = "%}";

/// Answers whether the string contains a template expression or block.
///
/// A marker pair only counts when the opening marker appears before the last
/// closing marker, so a stray `}}` in front of a `{{` is not a template.
pub fn is_template(input: &str) -> bool {
    if let Some(start) = input.find(BLOCK_START) {
        if input.rfind(BLOCK_END).is_some_and(|end| start < end) {
            return true;
        }
    }
    if let Some(start) = input.find(VAR_START) {
        if input.rfind(VAR_END).is_some_and(|end| start < end) {
            return true;
        }
    }
    false
}

/// Renders a template string against the variable scope.
pub fn render(template: &str, vars: &VarMap) -> Result<String> {
    ENV.render_str(template, minijinja::Value::from_serialize(vars))
        .map_err(Error::Template)
}

/// Evaluates a conditional expression (a `when`/`failed_when` body) to a
/// boolean against the variable scope.
pub fn eval_condition(expr: &str, vars: &VarMap) -> Result<bool> {
    let compiled = ENV.compile_expression(expr).map_err(Error::Template)?;
    let result = compiled
        .eval(minijinja::Value::from_serialize(vars))
        .map_err(Error::Template)?;
    Ok(result.is_true())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_variable_markers() {
        assert!(is_template("{{ item }}"));
        assert!(is_template("prefix {{ var }} suffix"));
        assert!(is_template("{% if x %}y{% endif %}"));
    }

    #[test]
    fn rejects_plain_and_unbalanced_strings() {
        assert!(!is_template("plain text"));
        assert!(!is_template("closed }} before {{ open"));
        assert!(!is_template("{{ never closed"));
        assert!(!is_template("%} backwards {%"));
    }

    #[test]
    fn renders_against_vars() {
        let mut vars = VarMap::new();
        vars.insert("who".to_string(), crate::omap::Value::String("world".into()));
        assert_eq!(render("hello {{ who }}", &vars).unwrap(), "hello world");
    }

    #[test]
    fn evaluates_conditions() {
        let mut vars = VarMap::new();
        vars.insert("count".to_string(), crate::omap::Value::Int(3));
        assert!(eval_condition("count > 1", &vars).unwrap());
        assert!(!eval_condition("count > 5", &vars).unwrap());
    }
}
