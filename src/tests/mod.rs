// Test modules

mod common;
mod determinism_test;
mod endpoints_test;
