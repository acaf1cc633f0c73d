//! Statement compilation.
//!
//! Turns a [`Statement`] into dialect-specific SQL text plus positional
//! parameters, and classifies it so the session knows whether to fetch rows
//! or just execute.
//!
//! Classification uses [sqlparser](https://docs.rs/sqlparser/) with the
//! dialect of the target backend. SQL the parser does not understand (vendor
//! extensions, multi-statement scripts) falls back to a token scan.

use crate::error::{DbError, DbResult};
use crate::models::{
    Comparison, DatabaseType, Filter, Params, QueryParam, RawStatement, Select, SortOrder,
    Statement,
};
use sqlparser::ast::Statement as SqlStatement;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::fmt::Write;

/// Broad statement category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT, VALUES, EXPLAIN, SHOW, PRAGMA and friends
    Query,
    Insert,
    Update,
    Delete,
    /// DDL, transaction control, anything else
    Other,
}

/// SQL ready to hand to the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<QueryParam>,
    pub kind: StatementKind,
    /// DML carrying a RETURNING clause
    pub returning: bool,
}

impl CompiledStatement {
    /// Compile raw SQL written for the target dialect.
    pub fn raw(sql: impl Into<String>, params: Vec<QueryParam>, db_type: DatabaseType) -> Self {
        let sql = sql.into();
        let (kind, returning) = classify(&sql, db_type);
        Self {
            sql,
            params,
            kind,
            returning,
        }
    }

    /// Whether executing this statement yields a row set.
    pub fn returns_rows(&self) -> bool {
        self.kind == StatementKind::Query || self.returning
    }
}

/// Compile a statement for the given dialect.
pub fn compile(statement: &Statement, db_type: DatabaseType) -> DbResult<CompiledStatement> {
    match statement {
        Statement::Raw(raw) => compile_raw(raw, db_type),
        Statement::Select(select) => compile_select(select, db_type),
    }
}

fn compile_raw(raw: &RawStatement, db_type: DatabaseType) -> DbResult<CompiledStatement> {
    if raw.sql.trim().is_empty() {
        return Err(DbError::invalid_input("Empty SQL statement"));
    }
    let (sql, params) = match &raw.params {
        Params::Positional(params) => (raw.sql.clone(), params.clone()),
        Params::Named(named) => rewrite_named(&raw.sql, named, db_type)?,
    };
    Ok(CompiledStatement::raw(sql, params, db_type))
}

/// Dialect placeholder for the 1-based parameter `n`.
pub fn placeholder(n: usize, db_type: DatabaseType) -> String {
    match db_type {
        DatabaseType::PostgreSQL => format!("${}", n),
        DatabaseType::MySQL | DatabaseType::SQLite => "?".to_string(),
    }
}

/// Placeholder for a value bound against a column of `column_type`.
///
/// PostgreSQL does not coerce a text parameter into timestamp, uuid, date or
/// numeric columns, so values for non-character columns are cast to the
/// column's declared type. Character columns are left alone so length limits
/// still reject oversized values instead of truncating them.
pub fn typed_placeholder(n: usize, column_type: Option<&str>, db_type: DatabaseType) -> String {
    match column_type {
        Some(ty) if db_type == DatabaseType::PostgreSQL && !is_character_type(ty) => {
            format!("CAST({} AS {})", placeholder(n, db_type), ty)
        }
        _ => placeholder(n, db_type),
    }
}

fn is_character_type(ty: &str) -> bool {
    let ty = ty.trim().to_ascii_lowercase();
    ty == "text" || ty == "name" || ty.starts_with("character") || ty.starts_with("varchar")
}

/// Quote an identifier for the dialect, escaping embedded quote characters.
/// Dotted names are quoted per part (`schema.table`).
pub fn quote_identifier(name: &str, db_type: DatabaseType) -> String {
    let quote = match db_type {
        DatabaseType::MySQL => '`',
        DatabaseType::PostgreSQL | DatabaseType::SQLite => '"',
    };
    name.split('.')
        .map(|part| {
            let escaped = part.replace(quote, &format!("{quote}{quote}"));
            format!("{quote}{escaped}{quote}")
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Rewrite `:name` placeholders into dialect placeholders.
///
/// Placeholders inside string literals, quoted identifiers, comments and
/// PostgreSQL dollar-quoted bodies are left alone, as are `::type` casts.
/// Every occurrence becomes its own positional parameter, so a name used twice
/// is bound twice.
pub fn rewrite_named(
    sql: &str,
    named: &std::collections::BTreeMap<String, QueryParam>,
    db_type: DatabaseType,
) -> DbResult<(String, Vec<QueryParam>)> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut params = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let end = skip_quoted(&chars, i, c);
                out.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = skip_block_comment(&chars, i, db_type == DatabaseType::PostgreSQL);
                out.extend(&chars[i..end]);
                i = end;
            }
            '$' if db_type == DatabaseType::PostgreSQL => {
                match dollar_tag(&chars, i) {
                    Some(tag_len) => {
                        let tag = &chars[i..i + tag_len];
                        let end = find_seq(&chars, i + tag_len, tag)
                            .map_or(chars.len(), |p| p + tag_len);
                        out.extend(&chars[i..end]);
                        i = end;
                    }
                    None => {
                        out.push(c);
                        i += 1;
                    }
                }
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars
                .get(i + 1)
                .is_some_and(|ch| ch.is_alphabetic() || *ch == '_') =>
            {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|ch| !(ch.is_alphanumeric() || *ch == '_'))
                    .map_or(chars.len(), |p| start + p);
                let name: String = chars[start..end].iter().collect();
                let value = named.get(&name).ok_or_else(|| {
                    DbError::invalid_input(format!("Missing value for named parameter ':{}'", name))
                })?;
                params.push(value.clone());
                out.push_str(&placeholder(params.len(), db_type));
                i = end;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok((out, params))
}

/// Index just past the closing quote; doubled quotes are escapes.
fn skip_quoted(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == '\\' && quote == '\'' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// Index just past the block comment opened at `start`.
/// PostgreSQL block comments nest; MySQL and SQLite end at the first `*/`.
fn skip_block_comment(chars: &[char], start: usize, nested: bool) -> usize {
    let mut depth = 1u32;
    let mut i = start + 2;
    while i < chars.len() {
        match (chars[i], chars.get(i + 1).copied()) {
            ('/', Some('*')) if nested => {
                depth += 1;
                i += 2;
            }
            ('*', Some('/')) => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    chars.len()
}

fn find_seq(chars: &[char], from: usize, seq: &[char]) -> Option<usize> {
    if seq.is_empty() || from > chars.len() {
        return None;
    }
    chars[from..]
        .windows(seq.len())
        .position(|w| w == seq)
        .map(|p| from + p)
}

/// Length of a `$tag$` opener at `start`, if there is one.
fn dollar_tag(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '$' {
            return Some(i - start + 1);
        }
        if !(c.is_alphanumeric() || c == '_') || (i == start + 1 && c.is_ascii_digit()) {
            return None;
        }
        i += 1;
    }
    None
}

/// Compile a structured select for the dialect.
pub fn compile_select(select: &Select, db_type: DatabaseType) -> DbResult<CompiledStatement> {
    if select.table.trim().is_empty() {
        return Err(DbError::invalid_input("Select requires a table name"));
    }

    let mut sql = String::from("SELECT ");
    if select.columns.is_empty() {
        sql.push('*');
    } else {
        let cols: Vec<String> = select
            .columns
            .iter()
            .map(|c| quote_identifier(c, db_type))
            .collect();
        sql.push_str(&cols.join(", "));
    }
    let _ = write!(sql, " FROM {}", quote_identifier(&select.table, db_type));

    let mut params = Vec::new();
    if !select.filters.is_empty() {
        let conditions = select
            .filters
            .iter()
            .map(|f| render_filter(f, db_type, &mut params))
            .collect::<Vec<_>>();
        let _ = write!(sql, " WHERE {}", conditions.join(" AND "));
    }

    if !select.order_by.is_empty() {
        let order: Vec<String> = select
            .order_by
            .iter()
            .map(|(col, dir)| {
                let dir = match dir {
                    SortOrder::Asc => "ASC",
                    SortOrder::Desc => "DESC",
                };
                format!("{} {}", quote_identifier(col, db_type), dir)
            })
            .collect();
        let _ = write!(sql, " ORDER BY {}", order.join(", "));
    }

    match (select.limit, select.offset) {
        (Some(limit), Some(offset)) => {
            let _ = write!(sql, " LIMIT {} OFFSET {}", limit, offset);
        }
        (Some(limit), None) => {
            let _ = write!(sql, " LIMIT {}", limit);
        }
        (None, Some(offset)) => match db_type {
            // Neither accepts OFFSET without LIMIT
            DatabaseType::MySQL => {
                let _ = write!(sql, " LIMIT 18446744073709551615 OFFSET {}", offset);
            }
            DatabaseType::SQLite => {
                let _ = write!(sql, " LIMIT -1 OFFSET {}", offset);
            }
            DatabaseType::PostgreSQL => {
                let _ = write!(sql, " OFFSET {}", offset);
            }
        },
        (None, None) => {}
    }

    Ok(CompiledStatement {
        sql,
        params,
        kind: StatementKind::Query,
        returning: false,
    })
}

fn render_filter(filter: &Filter, db_type: DatabaseType, params: &mut Vec<QueryParam>) -> String {
    let mut bind = |value: &QueryParam| {
        params.push(value.clone());
        placeholder(params.len(), db_type)
    };
    match filter {
        Filter::Compare { column, op, value } => {
            let column = quote_identifier(column, db_type);
            // `= NULL` never matches
            match (op, value) {
                (Comparison::Eq, QueryParam::Null) => format!("{column} IS NULL"),
                (Comparison::Ne, QueryParam::Null) => {
                    format!("{column} IS NOT NULL")
                }
                _ => format!("{} {} {}", column, op.operator(), bind(value)),
            }
        }
        Filter::In { column, values } => {
            if values.is_empty() {
                return "1 = 0".to_string();
            }
            let placeholders: Vec<String> = values.iter().map(&mut bind).collect();
            format!(
                "{} IN ({})",
                quote_identifier(column, db_type),
                placeholders.join(", ")
            )
        }
        Filter::IsNull(column) => format!("{} IS NULL", quote_identifier(column, db_type)),
        Filter::IsNotNull(column) => format!("{} IS NOT NULL", quote_identifier(column, db_type)),
    }
}

/// Wrap a row-returning statement so it yields a single `count` column.
pub fn wrap_count(inner: &CompiledStatement) -> DbResult<CompiledStatement> {
    if !inner.returns_rows() {
        return Err(DbError::invalid_input(
            "count_query requires a row-returning statement",
        ));
    }
    let trimmed = inner.sql.trim().trim_end_matches(';').trim_end();
    Ok(CompiledStatement {
        sql: format!("SELECT COUNT(*) AS count FROM ({}) AS counted", trimmed),
        params: inner.params.clone(),
        kind: StatementKind::Query,
        returning: false,
    })
}

/// Get the appropriate SQL dialect for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Classify SQL text into a kind and whether it carries RETURNING.
///
/// A multi-statement script is classified by its final statement, so a
/// script ending in a query yields that query's rows.
pub fn classify(sql: &str, db_type: DatabaseType) -> (StatementKind, bool) {
    let dialect = get_dialect(db_type);
    let tokens = Tokenizer::new(dialect.as_ref(), sql)
        .tokenize()
        .unwrap_or_default();
    let last = last_statement_tokens(&tokens);
    let returning = last.iter().any(|t| is_keyword(t, Keyword::RETURNING));

    let kind = match Parser::parse_sql(dialect.as_ref(), sql) {
        Ok(statements) => statements
            .last()
            .map_or(StatementKind::Other, classify_statement),
        Err(_) => classify_tokens(last),
    };

    (kind, returning && kind != StatementKind::Query)
}

fn classify_statement(stmt: &SqlStatement) -> StatementKind {
    match stmt {
        SqlStatement::Query(_)
        | SqlStatement::Explain { .. }
        | SqlStatement::ExplainTable { .. }
        | SqlStatement::ShowTables { .. }
        | SqlStatement::ShowColumns { .. }
        | SqlStatement::ShowDatabases { .. }
        | SqlStatement::ShowSchemas { .. }
        | SqlStatement::ShowCreate { .. }
        | SqlStatement::ShowFunctions { .. }
        | SqlStatement::ShowVariable { .. }
        | SqlStatement::ShowVariables { .. }
        | SqlStatement::ShowStatus { .. }
        | SqlStatement::ShowCollation { .. }
        | SqlStatement::Pragma { .. } => StatementKind::Query,
        SqlStatement::Insert(_) => StatementKind::Insert,
        SqlStatement::Update { .. } => StatementKind::Update,
        SqlStatement::Delete(_) => StatementKind::Delete,
        _ => StatementKind::Other,
    }
}

/// Tokens of the last non-empty statement in a script.
fn last_statement_tokens(tokens: &[Token]) -> &[Token] {
    tokens
        .split(|t| matches!(t, Token::SemiColon))
        .rfind(|segment| segment.iter().any(|t| !matches!(t, Token::Whitespace(_))))
        .unwrap_or(&[])
}

fn is_keyword(token: &Token, keyword: Keyword) -> bool {
    matches!(token, Token::Word(w) if w.keyword == keyword)
}

/// Fallback classification from the leading keyword.
fn classify_tokens(tokens: &[Token]) -> StatementKind {
    let first = tokens.iter().find_map(|t| match t {
        Token::Word(w) => Some(w.keyword),
        Token::Whitespace(_) | Token::LParen => None,
        _ => Some(Keyword::NoKeyword),
    });
    match first {
        Some(
            Keyword::SELECT
            | Keyword::WITH
            | Keyword::VALUES
            | Keyword::EXPLAIN
            | Keyword::SHOW
            | Keyword::PRAGMA
            | Keyword::DESCRIBE
            | Keyword::DESC,
        ) => StatementKind::Query,
        Some(Keyword::INSERT | Keyword::REPLACE) => StatementKind::Insert,
        Some(Keyword::UPDATE) => StatementKind::Update,
        Some(Keyword::DELETE) => StatementKind::Delete,
        _ => StatementKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn named(pairs: &[(&str, QueryParam)]) -> BTreeMap<String, QueryParam> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_classify_queries() {
        for (sql, db) in [
            ("SELECT 1", DatabaseType::SQLite),
            ("  select * from users", DatabaseType::PostgreSQL),
            ("WITH x AS (SELECT 1) SELECT * FROM x", DatabaseType::MySQL),
            ("SHOW TABLES", DatabaseType::MySQL),
            ("EXPLAIN SELECT 1", DatabaseType::PostgreSQL),
            ("PRAGMA table_info('users')", DatabaseType::SQLite),
        ] {
            assert_eq!(classify(sql, db).0, StatementKind::Query, "{sql}");
        }
    }

    #[test]
    fn test_classify_dml() {
        assert_eq!(
            classify("INSERT INTO t (a) VALUES (1)", DatabaseType::SQLite),
            (StatementKind::Insert, false)
        );
        assert_eq!(
            classify("UPDATE t SET a = 1", DatabaseType::MySQL),
            (StatementKind::Update, false)
        );
        assert_eq!(
            classify("DELETE FROM t WHERE a = 1", DatabaseType::PostgreSQL),
            (StatementKind::Delete, false)
        );
        assert_eq!(
            classify("CREATE TABLE t (a INT)", DatabaseType::SQLite).0,
            StatementKind::Other
        );
    }

    #[test]
    fn test_classify_script_by_last_statement() {
        let script = "CREATE TABLE t (a INT); INSERT INTO t VALUES (1); SELECT a FROM t;";
        assert_eq!(
            classify(script, DatabaseType::SQLite),
            (StatementKind::Query, false)
        );
        assert_eq!(
            classify("SELECT 1; DELETE FROM t", DatabaseType::PostgreSQL).0,
            StatementKind::Delete
        );
        // Unparsable scripts fall back to the last statement's leading keyword
        assert_eq!(
            classify("FROBNICATE the table; SELECT 1", DatabaseType::SQLite).0,
            StatementKind::Query
        );
    }

    #[test]
    fn test_classify_returning() {
        let compiled = CompiledStatement::raw(
            "INSERT INTO t (a) VALUES ($1) RETURNING id",
            vec![QueryParam::Int(1)],
            DatabaseType::PostgreSQL,
        );
        assert_eq!(compiled.kind, StatementKind::Insert);
        assert!(compiled.returning);
        assert!(compiled.returns_rows());
    }

    #[test]
    fn test_returning_inside_string_is_ignored() {
        let (kind, returning) = classify(
            "INSERT INTO t (note) VALUES ('returning soon')",
            DatabaseType::SQLite,
        );
        assert_eq!(kind, StatementKind::Insert);
        assert!(!returning);
    }

    #[test]
    fn test_classify_unparsable_falls_back_to_tokens() {
        let (kind, _) = classify("SELEC oops; SELECT 1", DatabaseType::SQLite);
        assert_eq!(kind, StatementKind::Query);
        let (kind, _) = classify("INSERT INTO t VALUES (1) ON WHATEVER", DatabaseType::SQLite);
        assert_eq!(kind, StatementKind::Insert);
    }

    #[test]
    fn test_rewrite_named_postgres() {
        let (sql, params) = rewrite_named(
            "SELECT * FROM t WHERE a = :a AND b = :b OR a = :a",
            &named(&[("a", QueryParam::Int(1)), ("b", QueryParam::from("x"))]),
            DatabaseType::PostgreSQL,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = $1 AND b = $2 OR a = $3");
        assert_eq!(
            params,
            vec![QueryParam::Int(1), QueryParam::from("x"), QueryParam::Int(1)]
        );
    }

    #[test]
    fn test_rewrite_named_question_marks() {
        let (sql, params) = rewrite_named(
            "INSERT INTO t (name) VALUES (:name)",
            &named(&[("name", QueryParam::from("Alice"))]),
            DatabaseType::SQLite,
        )
        .unwrap();
        assert_eq!(sql, "INSERT INTO t (name) VALUES (?)");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_rewrite_named_skips_literals_comments_and_casts() {
        let (sql, params) = rewrite_named(
            "SELECT ':x', \":y\", a::text -- :z\nFROM t /* :w */ WHERE b = :b",
            &named(&[("b", QueryParam::Int(2))]),
            DatabaseType::PostgreSQL,
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT ':x', \":y\", a::text -- :z\nFROM t /* :w */ WHERE b = $1"
        );
        assert_eq!(params, vec![QueryParam::Int(2)]);
    }

    #[test]
    fn test_rewrite_named_nested_block_comments() {
        let sql = "SELECT 1 /* outer /* inner */ :hidden */ WHERE a = :a";
        let (pg, params) = rewrite_named(
            sql,
            &named(&[("a", QueryParam::Int(1))]),
            DatabaseType::PostgreSQL,
        )
        .unwrap();
        assert_eq!(pg, "SELECT 1 /* outer /* inner */ :hidden */ WHERE a = $1");
        assert_eq!(params, vec![QueryParam::Int(1)]);

        // MySQL closes the comment at the first `*/`
        let err = rewrite_named(
            sql,
            &named(&[("a", QueryParam::Int(1))]),
            DatabaseType::MySQL,
        )
        .unwrap_err();
        assert!(err.to_string().contains(":hidden"));
    }

    #[test]
    fn test_rewrite_named_skips_dollar_quotes() {
        let (sql, params) = rewrite_named(
            "SELECT $body$ :inside $body$, :outside",
            &named(&[("outside", QueryParam::Bool(true))]),
            DatabaseType::PostgreSQL,
        )
        .unwrap();
        assert_eq!(sql, "SELECT $body$ :inside $body$, $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_rewrite_named_missing_value() {
        let err = rewrite_named("SELECT :nope", &BTreeMap::new(), DatabaseType::MySQL).unwrap_err();
        assert!(err.to_string().contains(":nope"));
    }

    #[test]
    fn test_typed_placeholder() {
        assert_eq!(
            typed_placeholder(2, Some("timestamp without time zone"), DatabaseType::PostgreSQL),
            "CAST($2 AS timestamp without time zone)"
        );
        assert_eq!(
            typed_placeholder(1, Some("numeric(10,2)"), DatabaseType::PostgreSQL),
            "CAST($1 AS numeric(10,2))"
        );
        assert_eq!(
            typed_placeholder(1, Some("character varying(100)"), DatabaseType::PostgreSQL),
            "$1"
        );
        assert_eq!(typed_placeholder(1, Some("text"), DatabaseType::PostgreSQL), "$1");
        assert_eq!(typed_placeholder(3, None, DatabaseType::PostgreSQL), "$3");
        assert_eq!(typed_placeholder(1, Some("DATETIME"), DatabaseType::MySQL), "?");
        assert_eq!(typed_placeholder(1, Some("TIMESTAMP"), DatabaseType::SQLite), "?");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users", DatabaseType::PostgreSQL), "\"users\"");
        assert_eq!(quote_identifier("users", DatabaseType::MySQL), "`users`");
        assert_eq!(
            quote_identifier("public.users", DatabaseType::PostgreSQL),
            "\"public\".\"users\""
        );
        assert_eq!(quote_identifier("a\"b", DatabaseType::SQLite), "\"a\"\"b\"");
    }

    #[test]
    fn test_compile_select() {
        let select = Select::from("users")
            .columns(["id", "name"])
            .filter(Filter::eq("name", "Alice"))
            .filter(Filter::is_in("id", [1, 2]))
            .order_by("id", SortOrder::Desc)
            .limit(5);
        let compiled = compile_select(&select, DatabaseType::PostgreSQL).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT \"id\", \"name\" FROM \"users\" WHERE \"name\" = $1 AND \"id\" IN ($2, $3) ORDER BY \"id\" DESC LIMIT 5"
        );
        assert_eq!(compiled.params.len(), 3);
        assert!(compiled.returns_rows());
    }

    #[test]
    fn test_compile_select_null_and_empty_in() {
        let select = Select::from("t")
            .filter(Filter::eq("a", QueryParam::Null))
            .filter(Filter::is_in("b", Vec::<i64>::new()));
        let compiled = compile_select(&select, DatabaseType::SQLite).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"t\" WHERE \"a\" IS NULL AND 1 = 0"
        );
        assert!(compiled.params.is_empty());
    }

    #[test]
    fn test_compile_select_offset_without_limit() {
        let select = Select::from("t").offset(10);
        let compiled = compile_select(&select, DatabaseType::SQLite).unwrap();
        assert_eq!(compiled.sql, "SELECT * FROM \"t\" LIMIT -1 OFFSET 10");
    }

    #[test]
    fn test_compile_empty_raw_rejected() {
        let err = compile(&Statement::raw("   "), DatabaseType::SQLite).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_wrap_count() {
        let inner = CompiledStatement::raw("SELECT * FROM t;", vec![], DatabaseType::SQLite);
        let wrapped = wrap_count(&inner).unwrap();
        assert_eq!(
            wrapped.sql,
            "SELECT COUNT(*) AS count FROM (SELECT * FROM t) AS counted"
        );

        let insert = CompiledStatement::raw("INSERT INTO t VALUES (1)", vec![], DatabaseType::SQLite);
        assert!(wrap_count(&insert).is_err());
    }
}
