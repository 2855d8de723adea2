use sea_orm::DbBackend;

// Words that cannot appear bare as a column or table name on at least one
// of the supported backends.
const RESERVED: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "check", "column", "constraint",
    "create", "default", "delete", "desc", "distinct", "drop", "else", "end", "exists", "from",
    "group", "having", "in", "index", "insert", "into", "is", "join", "key", "like", "limit",
    "not", "null", "offset", "on", "or", "order", "primary", "references", "select", "set",
    "table", "then", "to", "union", "unique", "update", "user", "using", "values", "when",
    "where", "with",
];

/// Quote an identifier for `backend`.
///
/// Plain lowercase identifiers are emitted bare; anything else (mixed case,
/// punctuation, reserved words) is wrapped in the backend's quote character
/// with embedded quotes doubled.
pub fn quote_ident(backend: DbBackend, name: &str) -> String {
    if !needs_quoting(name) {
        return name.to_string();
    }
    let quote = match backend {
        DbBackend::MySql => '`',
        _ => '"',
    };
    let mut out = String::with_capacity(name.len() + 2);
    out.push(quote);
    for c in name.chars() {
        if c == quote {
            out.push(quote);
        }
        out.push(c);
    }
    out.push(quote);
    out
}

fn needs_quoting(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    if !starts_ok {
        return true;
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return true;
    }
    RESERVED.contains(&name)
}

/// `a, b, c` or `t.a, t.b, t.c`
pub fn column_list<S: AsRef<str>>(quoted_columns: &[S], quoted_table: Option<&str>) -> String {
    let mut sql = String::new();
    for (i, column) in quoted_columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        if let Some(table) = quoted_table {
            sql.push_str(table);
            sql.push('.');
        }
        sql.push_str(column.as_ref());
    }
    sql
}
