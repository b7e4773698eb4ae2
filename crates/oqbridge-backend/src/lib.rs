//! HTTP clients for the two search backends, plus the capability traits the
//! proxy and the migration driver consume. Backend status codes are always
//! preserved in typed errors so auth decisions never depend on message
//! strings.

pub mod cold;
pub mod hot;
pub mod http;
pub mod traits;

pub use cold::ColdStoreClient;
pub use hot::HotStoreClient;
pub use http::build_client;
pub use traits::{ColdStore, DocEnvelope, HotStore, PutDocOptions, ScrollSlice};
