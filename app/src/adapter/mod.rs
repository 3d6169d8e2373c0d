pub mod homeassistant;
pub mod sensor_api;
