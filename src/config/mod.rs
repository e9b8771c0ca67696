mod settings;

pub use settings::{DispatchConfig, FirebaseConfig, ServerConfig, Settings};
