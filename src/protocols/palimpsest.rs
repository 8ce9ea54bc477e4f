//! Palimpsest: the five-layer PaRDeS reading ending in contemporary embodiment.

use super::{wrap_passage, OutputConstraints, Protocol};

pub const SYSTEM_PROMPT: &str = include_str!("../../prompts/palimpsest.md");

pub const PROTOCOL: Protocol = Protocol::new("palimpsest", SYSTEM_PROMPT, 5000, output_constraints);

/// Interpretive layers, in reading order.
pub const LAYERS: [&str; 5] = ["peshat", "remez", "derash", "sod", "incarnation"];

pub fn wrap_input(text: &str, reference: &str) -> String {
    wrap_passage("Palimpsest", text, reference)
}

pub fn output_constraints() -> OutputConstraints {
    OutputConstraints::markdown(3000, 4000, "layered-scholarly-contemplative", &LAYERS)
}
