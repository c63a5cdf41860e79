pub mod chat;
pub mod settings;
pub mod sidebar;

pub use chat::ChatView;
pub use settings::SettingsView;
pub use sidebar::SidebarView;
