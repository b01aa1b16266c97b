//! Shared minijinja setup for conditional expressions

pub mod filters;

use minijinja::{Environment, UndefinedBehavior};

/// Set up a minijinja environment with the custom filters
pub fn setup_minijinja_env(env: &mut Environment) {
    filters::add_filters(env);
}

/// Environment used to evaluate `when` expressions.
///
/// Undefined variables are strict so a typo in a conditional fails
/// loudly instead of silently evaluating to false.
pub fn expression_env() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    setup_minijinja_env(&mut env);
    env
}
