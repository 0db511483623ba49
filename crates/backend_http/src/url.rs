/// Endpoint used when the configured one is blank.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8765";

const PROPOSE_PATH: &str = "/propose";

/// Normalizes a configured endpoint to the proposal route.
///
/// Blank input falls back to [`DEFAULT_BACKEND_URL`]; trailing slashes are
/// dropped and `/propose` is appended unless already present.
pub fn normalize_endpoint(input: &str) -> String {
    let base = match input.trim() {
        "" => DEFAULT_BACKEND_URL,
        trimmed => trimmed,
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(PROPOSE_PATH) {
        return trimmed.to_string();
    }
    format!("{trimmed}{PROPOSE_PATH}")
}
