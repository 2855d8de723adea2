pub mod connection_like;
pub mod find;
pub mod relation_fetcher;
pub mod select_hook;

pub use connection_like::SelectRows;
pub use find::FindQueryBuilder;
pub use relation_fetcher::{BelongsTo, HasMany};
pub use select_hook::{build_select, SelectClause};
