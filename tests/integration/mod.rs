//! Integration tests for tagship, driving the compiled binary

mod helpers;
mod test_cli;
mod test_release;
