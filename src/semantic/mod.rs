pub mod descriptor;
pub mod element;
pub mod mapper;
pub mod matcher;
pub mod text;

pub use descriptor::{Descriptor, SelectorSet};
pub use element::{ElementKind, RawElement, EXTRACT_ELEMENTS_SCRIPT};
pub use mapper::{MapperPass, SemanticMapping};
pub use matcher::{resolve, Resolution};
pub use text::{semantic_text, SemanticText};
