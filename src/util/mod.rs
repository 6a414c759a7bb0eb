pub mod format;
pub mod logging;
#[cfg(test)]
pub mod test_server;
