//! Threshold: four progressive thresholds plus a technology touchpoint.

use super::{wrap_passage, OutputConstraints, Protocol};

pub const SYSTEM_PROMPT: &str = include_str!("../../prompts/threshold.md");

pub const PROTOCOL: Protocol = Protocol::new("threshold", SYSTEM_PROMPT, 4000, output_constraints);

pub const SECTIONS: [&str; 5] = [
    "archaeological_dive",
    "theological_combustion",
    "present_friction",
    "embodied_practice",
    "tech_touchpoint",
];

pub fn wrap_input(text: &str, reference: &str) -> String {
    wrap_passage("Threshold", text, reference)
}

pub fn output_constraints() -> OutputConstraints {
    OutputConstraints::markdown(2500, 3500, "scholarly-accessible-challenging", &SECTIONS)
}
