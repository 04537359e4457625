use crate::session::{PromptStyle, SessionState};

/// Render the prompt for the current session state.
///
/// ```text
/// LONG:  terminal-default<time>:(BASE)command:[IN=ASCII:OUT=ASCII] $
/// SHORT: terminal-default->time@(BASE)command[I=A:O=A] $
/// ```
///
/// The `NONE` style always renders as an empty string.
pub fn format_prompt(state: &SessionState) -> String {
    match state.prompt_style {
        PromptStyle::Long => format!(
            "{}-{}<{}>:({}){}:[{}] $ ",
            state.terminal_node_name,
            state.active_connection_label,
            state.target_node_name,
            state.bus_type,
            state.bus_name,
            state.mode_string(),
        ),
        PromptStyle::Short => format!(
            "{}-{}->{}@({}){}[{}] $ ",
            state.terminal_node_name,
            state.active_connection_label,
            state.target_node_name,
            state.bus_type,
            state.bus_name,
            state.short_mode_string(),
        ),
        PromptStyle::None => String::new(),
    }
}
