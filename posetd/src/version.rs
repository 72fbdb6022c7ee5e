pub const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version() -> &'static str {
    CARGO_PKG_VERSION
}
