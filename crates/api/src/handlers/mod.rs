pub mod actuator;
pub mod health;
pub mod message;
