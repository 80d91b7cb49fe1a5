pub mod net;

pub mod util;

#[cfg(test)]
mod utils_test;
