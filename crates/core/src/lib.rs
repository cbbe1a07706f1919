pub mod archive;
pub mod comic;
pub mod config;
pub mod detect;
pub mod epub;
pub mod error;
pub mod href;
pub mod imaging;
pub mod model;
pub mod security;
pub mod sort;

pub mod prelude {
    pub use crate::comic::{DivinaExtractor, ZipExtractor};
    pub use crate::epub::EpubExtractor;
    pub use crate::error::*;
    pub use crate::model::*;
}
