pub mod fetcher;
pub mod statement_resolver;
pub mod trust_chain;

pub use fetcher::{EntityStatementFetcher, HttpEntityStatementFetcher};
pub use statement_resolver::EntityStatementResolver;
pub use trust_chain::TrustChainResolver;
