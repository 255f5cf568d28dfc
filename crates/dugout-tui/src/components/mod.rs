pub mod chat_panel;
pub mod context_panel;
pub mod help_overlay;
pub mod log_panel;
pub mod player_panel;
