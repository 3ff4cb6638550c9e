mod shader;
pub mod types;

pub use shader::key_rgba8;
pub use types::{parse_hex_color, KeyColorConfig, KeyColorUpdate};
