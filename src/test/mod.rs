mod attendance;
mod utils;

pub use utils::test_utils;
