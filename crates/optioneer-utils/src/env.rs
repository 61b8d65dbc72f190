//! Environment variable helpers

/// Read an environment variable, treating unset and blank values alike
///
/// Returns the trimmed value, or `None` when the variable is missing or empty.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
