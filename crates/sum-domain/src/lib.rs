// sum-domain library entry point
pub mod error;
pub mod params;
pub mod registry;
pub mod request;
pub mod status;
pub mod summary;
pub mod warnings;

pub use error::DomainError;
pub use params::{default_params, validate_params, ParamKind, ParamSpec};
pub use registry::{SupportedFileType, SupportedLanguage, SupportedModel};
pub use request::{NormalizedRequest, SummaryRequest, SummaryResponse};
pub use status::SummaryStatus;
pub use summary::{IdentifierBinding, SourceKind, Summary, SummaryPatch};
pub use warnings::{merge_warnings, Warnings};
