pub mod entity_statement;

pub use entity_statement::{EntityStatement, EntityStatementClaims};
