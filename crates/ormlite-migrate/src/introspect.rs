//! Parsing of table definitions stored in the SQLite catalog.
//!
//! Only the table name and the set of column names are extracted. The
//! scanner understands just enough of `CREATE TABLE` to find the column
//! list: quoting, nested parentheses and top-level commas.

use std::collections::BTreeSet;

use ormlite_core::model::is_column_identifier;

use crate::error::{MigrateError, Result};

/// A table as it currently exists in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveTable {
    /// Table name.
    pub name: String,
    /// Names of the existing columns.
    pub columns: BTreeSet<String>,
}

/// Parses a stored `CREATE TABLE` statement.
pub fn parse_create_table(sql: &str) -> Result<LiveTable> {
    let mut scanner = Scanner::new(sql);

    scanner.skip_whitespace();
    scanner.expect_keyword("CREATE")?;
    scanner.skip_whitespace();
    scanner.expect_keyword("TABLE")?;
    scanner.skip_whitespace();
    if scanner.eat_keyword("IF") {
        scanner.skip_whitespace();
        scanner.expect_keyword("NOT")?;
        scanner.skip_whitespace();
        scanner.expect_keyword("EXISTS")?;
        scanner.skip_whitespace();
    }
    let name = scanner.table_name()?;
    scanner.skip_whitespace();
    scanner.expect_char('(')?;
    let definitions = scanner.column_list()?;

    let columns = definitions
        .iter()
        .filter_map(|definition| definition.split_whitespace().next())
        .filter(|token| is_column_identifier(token))
        .map(str::to_string)
        .collect();

    Ok(LiveTable { name, columns })
}

/// Returns the column names of a stored `CREATE TABLE` statement.
///
/// Fragments whose first token is not a lowercase identifier, such as
/// `FOREIGN KEY (...)` or `PRIMARY KEY (...)` table constraints, are skipped.
pub fn parse_column_names(sql: &str) -> Result<BTreeSet<String>> {
    parse_create_table(sql).map(|table| table.columns)
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> MigrateError {
        MigrateError::schema_parse(self.input, message)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn word(&self) -> &'a str {
        let rest = &self.input[self.pos..];
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        &rest[..end]
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let word = self.word();
        if word.eq_ignore_ascii_case(keyword) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {keyword}")))
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<()> {
        if self.peek() == Some(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}'")))
        }
    }

    /// Reads a bare or quoted (`"..."`, `` `...` ``, `[...]`) table name.
    fn table_name(&mut self) -> Result<String> {
        let close = match self.peek() {
            Some('"') => '"',
            Some('`') => '`',
            Some('[') => ']',
            _ => {
                let word = self.word();
                if word.is_empty() {
                    return Err(self.error("expected table name"));
                }
                self.pos += word.len();
                return Ok(word.to_string());
            }
        };

        self.advance();
        let mut name = String::new();
        loop {
            match self.advance() {
                Some(c) if c == close => {
                    // A doubled quote is an escaped quote character.
                    if close != ']' && self.peek() == Some(close) {
                        self.advance();
                        name.push(c);
                    } else {
                        break;
                    }
                }
                Some(c) => name.push(c),
                None => return Err(self.error("unterminated table name")),
            }
        }

        if name.is_empty() {
            return Err(self.error("expected table name"));
        }
        Ok(name)
    }

    /// Skips a quoted span whose opening quote has just been consumed.
    fn skip_quoted(&mut self, close: char) -> Result<()> {
        loop {
            match self.advance() {
                Some(c) if c == close => {
                    if close != ']' && self.peek() == Some(close) {
                        self.advance();
                    } else {
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => return Err(self.error("unterminated quoted text")),
            }
        }
    }

    /// Reads the definitions between the opening parenthesis (already
    /// consumed) and its matching closing parenthesis, split on top-level
    /// commas.
    fn column_list(&mut self) -> Result<Vec<&'a str>> {
        let input = self.input;
        let mut definitions = Vec::new();
        let mut start = self.pos;
        let mut depth = 0usize;

        loop {
            let here = self.pos;
            match self.advance() {
                Some('\'') => self.skip_quoted('\'')?,
                Some('"') => self.skip_quoted('"')?,
                Some('`') => self.skip_quoted('`')?,
                Some('[') => self.skip_quoted(']')?,
                Some('(') => depth += 1,
                Some(')') if depth == 0 => {
                    definitions.push(input[start..here].trim());
                    break;
                }
                Some(')') => depth -= 1,
                Some(',') if depth == 0 => {
                    definitions.push(input[start..here].trim());
                    start = self.pos;
                }
                Some(_) => {}
                None => return Err(self.error("unterminated column list")),
            }
        }

        definitions.retain(|definition| !definition.is_empty());
        Ok(definitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(sql: &str) -> Vec<String> {
        parse_column_names(sql).unwrap().into_iter().collect()
    }

    #[test]
    fn test_parse_simple_table() {
        let table = parse_create_table(
            r#"CREATE TABLE "persons" (age INTEGER NOT NULL, name TEXT NOT NULL, address TEXT)"#,
        )
        .unwrap();
        assert_eq!(table.name, "persons");
        assert_eq!(
            table.columns.into_iter().collect::<Vec<_>>(),
            vec!["address", "age", "name"]
        );
    }

    #[test]
    fn test_parse_unquoted_and_lowercase_keywords() {
        assert_eq!(names("create table items (id INTEGER PRIMARY KEY)"), vec!["id"]);
        assert_eq!(
            parse_create_table("CREATE TABLE IF NOT EXISTS [my items](x TEXT)")
                .unwrap()
                .name,
            "my items"
        );
    }

    #[test]
    fn test_constraints_are_not_columns() {
        let sql = r#"CREATE TABLE "foos" (fk TEXT NOT NULL, bar_id TEXT, FOREIGN KEY (fk) REFERENCES bars(fk), FOREIGN KEY (bar_id) REFERENCES bars(id), PRIMARY KEY (fk, bar_id), UNIQUE (bar_id)) WITHOUT ROWID"#;
        assert_eq!(names(sql), vec!["bar_id", "fk"]);
    }

    #[test]
    fn test_nested_commas_do_not_split() {
        let sql = "CREATE TABLE t (price NUMERIC(10, 2) NOT NULL, label TEXT DEFAULT 'a, b' NOT NULL, CHECK (price > 0))";
        assert_eq!(names(sql), vec!["label", "price"]);
    }

    #[test]
    fn test_quoted_and_uppercase_columns_are_skipped() {
        let sql = r#"CREATE TABLE t ("Quoted" TEXT, Upper TEXT, lower_1 TEXT)"#;
        assert_eq!(names(sql), vec!["lower_1"]);
    }

    #[test]
    fn test_columns_appended_by_alter_table() {
        let sql = r#"CREATE TABLE "persons" (age INTEGER NOT NULL, name TEXT NOT NULL, funny BOOL NOT NULL, height REAL NOT NULL)"#;
        assert_eq!(names(sql), vec!["age", "funny", "height", "name"]);
    }

    #[test]
    fn test_empty_column_list() {
        assert!(parse_column_names("CREATE TABLE t ()").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_definitions_are_errors() {
        for sql in [
            "Crit TABlE",
            "",
            "CREATE INDEX idx ON t (x)",
            "CREATE TABLE (x TEXT)",
            "CREATE TABLE t x TEXT",
            "CREATE TABLE t (x TEXT",
            "CREATE TABLE \"t (x TEXT)",
            "CREATE TABLE t (x TEXT DEFAULT 'oops)",
        ] {
            let err = parse_column_names(sql).unwrap_err();
            assert!(
                matches!(err, MigrateError::SchemaParse { .. }),
                "{sql:?} gave {err:?}"
            );
        }
    }
}
