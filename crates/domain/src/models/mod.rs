//! Domain models for DocForge.

pub mod activity_log;
pub mod batch;
pub mod certificate;
pub mod document;
pub mod signature;
pub mod template;

pub use activity_log::{ActivityEntry, ActivityStatus, CreateActivityInput};
pub use batch::{Batch, BatchStatus, CreateBatchInput};
pub use certificate::{Certificate, CertificateKind, CreateCertificateInput};
pub use document::{CreateDocumentInput, Document, DocumentSource, DocumentStatus};
pub use signature::{CreateSignatureInput, Signature, SignatureStatus};
pub use template::{CreateTemplateInput, Template};
