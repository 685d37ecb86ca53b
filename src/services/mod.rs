pub mod confirmation;
pub mod lifecycle;
pub mod reporting;
pub mod request;
pub mod runner;

#[cfg(test)]
mod reporting_tests;
#[cfg(test)]
mod request_tests;
