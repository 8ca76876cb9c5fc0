pub mod calendar_setup;
pub mod clearer;
pub mod commands;
pub mod oauth;
pub mod plan_loader;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod fakes;
