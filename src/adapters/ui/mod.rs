pub mod tui;

/// Prints the welcome line and applies the theme for all subsequent inquire prompts.
/// Call once at startup (e.g. in main after tracing init).
pub fn init_ui() {
    println!("claim-audit v{}", env!("CARGO_PKG_VERSION"));
    println!("Marketing claims vs. customer reviews\n");
    tui::apply_theme();
}
