//! Scenario suites for the store facade, run against every handler.

pub mod test_util;

// Setup only one time per test binary.
#[ctor::ctor]
fn init() {
    colog::init();
}
