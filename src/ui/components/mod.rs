pub mod activity_heatmap;
pub mod chat_log;
pub mod stats_panel;
