mod browser_tabs;
mod extension_messenger;
mod host_environment;
mod key_value_storage;
mod offscreen_documents;
mod script_injector;

pub use browser_tabs::BrowserTabs;
pub use extension_messenger::ExtensionMessenger;
pub use host_environment::HostEnvironment;
pub use key_value_storage::KeyValueStorage;
pub use offscreen_documents::{OffscreenDocuments, OffscreenReason};
pub use script_injector::ScriptInjector;
