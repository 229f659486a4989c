mod backend;
pub use backend::*;

mod record;
pub use record::*;

mod report;
pub use report::*;
