use crate::commands::command_error::CommandError;

/// Parses a sorted-set score. `inf`/`-inf` are valid scores; NaN is not.
pub fn parse_score(token: &str) -> Result<f64, CommandError> {
    let score = token
        .trim()
        .parse::<f64>()
        .map_err(|_| CommandError::NotAFloat)?;

    if score.is_nan() {
        return Err(CommandError::NotAFloat);
    }

    Ok(score)
}

/// Renders a score the way clients expect: no trailing `.0` on integral
/// values.
pub fn format_score(score: f64) -> String {
    format!("{}", score)
}
