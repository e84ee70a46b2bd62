//! Mode listing

use crate::core::mode::ModeRegistry;

pub fn list_modes(registry: &ModeRegistry, active: Option<&str>) {
    println!("🎭 Available Modes");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    for line in format_mode_lines(registry, active) {
        println!("{line}");
    }

    println!();
    println!("Pick one with `jarvis --mode <ID>`, `/mode <ID>` while chatting,");
    println!("or make it the default with `jarvis set default-mode <ID>`.");
}

fn format_mode_lines(registry: &ModeRegistry, active: Option<&str>) -> Vec<String> {
    registry
        .list_modes()
        .iter()
        .map(|mode| {
            let marker = if active == Some(mode.id.as_str()) {
                "●"
            } else {
                " "
            };
            format!("{marker} {:<10} {}", mode.id, mode.description)
        })
        .collect()
}
