//! biblioscope recognize: identify PDFs by DOI, ISBN, a recognition service
//! or full-text search, and queue them for recognition.

pub mod connectivity;
pub mod error;
pub mod extract;
pub mod http;
pub mod identifiers;
pub mod queue;
pub mod recognize;
pub mod sources;
pub mod store;

pub use connectivity::{AlwaysOnline, Connectivity, TcpProbe};
pub use error::{DomainFailure, RecognizeError, Result, ScienceError};
pub use extract::{PdfToTextExtractor, TextExtractor};
pub use identifiers::{Doi, Isbn, TextIdentifiers, find_identifiers};
pub use queue::{
    AttachmentResolver, ChannelObserver, JobRow, RecognitionObserver, Recognizer,
    RecognizerSettings, RowEvent, RowSnapshot, RowStatus,
};
pub use recognize::{
    MetadataResolver, RecognitionServiceClient, RemoteRecognizer, RemoteResponse,
    ResolverSettings, TitleValidator,
};
pub use sources::{CrossRefSource, OpenLibrarySource, ScholarlySearch, SearchQuery, StructuredSearch};
pub use store::{ItemStore, SqliteItemStore};
