mod versioned_schema;

pub use versioned_schema::{
    column_exists, open_in_memory, open_versioned, Column, SqlType, Table, VersionedSchema,
    BASE_DB_VERSION,
};
