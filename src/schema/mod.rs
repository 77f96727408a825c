pub mod alias;
pub mod arrow;
pub mod types;

pub use alias::{fold_key, ColumnAliasMap};
pub use self::arrow::{build_arrow_schema, map_to_arrow_type};
pub use types::{CanonicalField, FieldKind};
