//! Prompt template rendering.
//!
//! Templates are minijinja source referencing exactly two variables, `{{ PRD }}`
//! and `{{ PROGRESS }}`. Undefined names are rejected instead of rendering as
//! empty text, so a misspelled placeholder fails the run rather than silently
//! producing a hollow prompt.

use minijinja::{AutoEscape, Environment, UndefinedBehavior, context};

use crate::error::TemplateError;

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env
}

/// Render `template` with the requirements document and progress log.
pub fn render_prompt(template: &str, prd: &str, progress: &str) -> Result<String, TemplateError> {
    let env = environment();
    let rendered = env.render_str(
        template,
        context! {
            PRD => prd,
            PROGRESS => progress,
        },
    )?;
    Ok(rendered)
}
