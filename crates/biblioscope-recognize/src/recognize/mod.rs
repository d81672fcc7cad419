//! Resolving one attachment: identifier lookups, the recognition service,
//! full-text phrase queries and title validation.

pub mod queries;
pub mod remote;
pub mod resolver;
pub mod validate;

pub use queries::{full_text_queries, good_lines};
pub use remote::{
    METADATA_SERVICE_CATALOG, RecognitionServiceClient, RemoteAuthor, RemoteRecognizer,
    RemoteResponse,
};
pub use resolver::{MetadataResolver, ResolverSettings};
pub use validate::TitleValidator;
