pub(crate) mod emit_controller;
pub(crate) mod health_check_controller;
