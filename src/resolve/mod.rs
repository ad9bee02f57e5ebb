//! Cross-file symbol resolution: the pre-scan symbol map and the resolver
//! that rewrites call and base-class references to defining files.

pub mod prescan;
pub mod resolver;

pub use prescan::{PreScanner, SymbolMap};
pub use resolver::Resolver;
