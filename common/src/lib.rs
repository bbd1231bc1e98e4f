pub mod output;
pub mod parser;
pub mod record;
pub mod scan;

pub const DEFAULT_MAX_IMAGE_SIZE: u32 = 8192;
pub const DEFAULT_OUTPUT: &str = "finaldata.p";
