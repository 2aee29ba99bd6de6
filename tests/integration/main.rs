//! Integration test entry point

mod harvest_tests;
mod page_tests;
mod request_tests;
