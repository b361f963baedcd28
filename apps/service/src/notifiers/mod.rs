pub mod log;
pub mod mqtt;
pub mod webhook;

pub use log::LogNotifier;
pub use mqtt::MqttNotifier;
pub use webhook::WebhookNotifier;
