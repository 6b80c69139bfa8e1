pub mod pages;
pub mod parser;
pub mod selectors;

pub use pages::{PagePlan, PageRequest};
pub use parser::parse_page;
pub use selectors::ListingSelectors;
