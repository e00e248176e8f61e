use axum::extract::State;

use crate::routes::{AppState, MESSAGE_KEY};

/// Current value of `app.message`, as plain text.
///
/// Reads the bound snapshot only, so it never fails; a missing key reads as empty.
pub async fn get_message(State(state): State<AppState>) -> String {
    state.binding.get(MESSAGE_KEY)
}
