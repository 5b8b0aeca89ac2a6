pub mod scanner;

pub use scanner::{BluerScanner, ScanError, Scanner};
