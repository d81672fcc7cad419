pub mod doi;
pub mod extract;
pub mod isbn;

pub use doi::{Doi, clean_doi};
pub use extract::{TextIdentifiers, find_doi, find_identifiers, find_isbns};
pub use isbn::Isbn;
