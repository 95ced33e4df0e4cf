use anyhow::Result;

use crate::db::Database;
use crate::model::Trigger;

pub const ADDED_DATE_TRIGGER: &str = "trg_set_added_date";

const ADDED_DATE_TRIGGER_SQL: &str = r#"
CREATE TRIGGER trg_set_added_date
AFTER INSERT ON shelf_items
FOR EACH ROW
WHEN NEW.added_date IS NULL
BEGIN
    UPDATE shelf_items
    SET added_date = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
    WHERE id = NEW.id;
END;
"#;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Semicolon,
    Punct(char),
}

/// Splits SQL into tokens with their end offsets, skipping whitespace and
/// comments. String literals are kept as opaque `Punct('\'')` tokens.
fn tokenize(sql: &str) -> Result<Vec<(Token, usize)>, String> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b if b.is_ascii_whitespace() => i += 1,
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let close = sql[i + 2..]
                    .find("*/")
                    .ok_or_else(|| "Unterminated comment".to_string())?;
                i += 2 + close + 2;
            }
            b'\'' | b'"' | b'`' | b'[' => {
                let close_char = if c == b'[' { b']' } else { c };
                let mut j = i + 1;
                let mut text = Vec::new();
                loop {
                    match bytes.get(j) {
                        None => return Err("Unterminated quoted text".to_string()),
                        Some(&b) if b == close_char => {
                            if c != b'[' && bytes.get(j + 1) == Some(&close_char) {
                                text.push(b);
                                j += 2;
                            } else {
                                j += 1;
                                break;
                            }
                        }
                        Some(&b) => {
                            text.push(b);
                            j += 1;
                        }
                    }
                }
                let token = if c == b'\'' {
                    Token::Punct('\'')
                } else {
                    Token::Quoted(String::from_utf8_lossy(&text).into_owned())
                };
                tokens.push((token, j));
                i = j;
            }
            b';' => {
                i += 1;
                tokens.push((Token::Semicolon, i));
            }
            b if b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80 => {
                let mut j = i;
                while j < bytes.len()
                    && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_' || bytes[j] == b'$' || bytes[j] >= 0x80)
                {
                    j += 1;
                }
                tokens.push((Token::Word(sql[i..j].to_string()), j));
                i = j;
            }
            other => {
                i += 1;
                tokens.push((Token::Punct(other as char), i));
            }
        }
    }

    Ok(tokens)
}

fn is_keyword(token: Option<&(Token, usize)>, keyword: &str) -> bool {
    matches!(token, Some((Token::Word(w), _)) if w.eq_ignore_ascii_case(keyword))
}

/// A single, validated `CREATE TRIGGER` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTrigger<'a> {
    pub name: String,
    pub statement: &'a str,
}

/// Accepts exactly one `CREATE [TEMP|TEMPORARY] TRIGGER [IF NOT EXISTS] name
/// ... BEGIN ... END` statement, optionally followed by semicolons.
/// Anything after the closing `END` is rejected.
pub fn parse_create_trigger(sql: &str) -> Result<CreateTrigger<'_>, String> {
    const NOT_A_TRIGGER: &str = "Trigger SQL must be a single CREATE TRIGGER statement";

    let tokens = tokenize(sql)?;
    let mut pos = 0;

    if !is_keyword(tokens.get(pos), "CREATE") {
        return Err(NOT_A_TRIGGER.to_string());
    }
    pos += 1;
    if is_keyword(tokens.get(pos), "TEMP") || is_keyword(tokens.get(pos), "TEMPORARY") {
        pos += 1;
    }
    if !is_keyword(tokens.get(pos), "TRIGGER") {
        return Err(NOT_A_TRIGGER.to_string());
    }
    pos += 1;
    if is_keyword(tokens.get(pos), "IF")
        && is_keyword(tokens.get(pos + 1), "NOT")
        && is_keyword(tokens.get(pos + 2), "EXISTS")
    {
        pos += 3;
    }

    let mut name = match tokens.get(pos) {
        Some((Token::Word(w), _)) | Some((Token::Quoted(w), _)) => w.clone(),
        _ => return Err("Trigger SQL has no trigger name".to_string()),
    };
    pos += 1;
    // schema-qualified: keep the trigger part
    if matches!(tokens.get(pos), Some((Token::Punct('.'), _))) {
        name = match tokens.get(pos + 1) {
            Some((Token::Word(w), _)) | Some((Token::Quoted(w), _)) => w.clone(),
            _ => return Err("Trigger SQL has no trigger name".to_string()),
        };
        pos += 2;
    }

    let begin = tokens[pos..]
        .iter()
        .position(|(t, _)| matches!(t, Token::Word(w) if w.eq_ignore_ascii_case("BEGIN")))
        .ok_or_else(|| "Trigger SQL has no BEGIN ... END body".to_string())?;
    pos += begin + 1;

    // CASE ... END nests inside the body
    let mut depth = 1;
    let mut end_offset = None;
    while let Some((token, offset)) = tokens.get(pos) {
        pos += 1;
        if let Token::Word(w) = token {
            if w.eq_ignore_ascii_case("CASE") {
                depth += 1;
            } else if w.eq_ignore_ascii_case("END") {
                depth -= 1;
                if depth == 0 {
                    end_offset = Some(*offset);
                    break;
                }
            }
        }
    }

    let end_offset = end_offset.ok_or_else(|| "Trigger body is missing its END".to_string())?;

    if tokens[pos..].iter().any(|(t, _)| *t != Token::Semicolon) {
        return Err(NOT_A_TRIGGER.to_string());
    }

    Ok(CreateTrigger {
        name,
        statement: sql[..end_offset].trim(),
    })
}

/// Quotes an identifier for SQLite.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub struct Triggers<'a> {
    db: &'a Database,
}

impl<'a> Triggers<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn list_triggers(&self) -> Result<Vec<Trigger>> {
        let query = r#"
            SELECT name, tbl_name, sql
            FROM sqlite_master
            WHERE type = 'trigger'
            ORDER BY name
        "#;

        let mut rows = self.db.connection().query(query, ()).await?;
        let mut triggers = Vec::new();

        while let Some(row) = rows.next().await? {
            triggers.push(Trigger {
                trigger_name: row.get(0)?,
                event_object_table: row.get(1)?,
                sql: row.get(2)?,
            });
        }

        Ok(triggers)
    }

    /// Runs one parsed `CREATE TRIGGER` statement and nothing else.
    pub async fn create_trigger(&self, trigger: &CreateTrigger<'_>) -> Result<()> {
        self.db.connection().execute(trigger.statement, ()).await?;
        Ok(())
    }

    pub async fn drop_trigger(&self, name: &str) -> Result<()> {
        let query = format!("DROP TRIGGER IF EXISTS {}", quote_identifier(name));
        self.db.connection().execute(&query, ()).await?;
        Ok(())
    }

    /// (Re)installs the trigger that stamps `added_date` on new shelf items
    /// inserted without one.
    pub async fn install_added_date_trigger(&self) -> Result<()> {
        let trigger = parse_create_trigger(ADDED_DATE_TRIGGER_SQL).map_err(anyhow::Error::msg)?;
        self.drop_trigger(ADDED_DATE_TRIGGER).await?;
        self.create_trigger(&trigger).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_single_trigger_statement() {
        let sql = "CREATE TRIGGER t AFTER INSERT ON books BEGIN SELECT 1; END;";
        let parsed = parse_create_trigger(sql).unwrap();
        assert_eq!(parsed.name, "t");
        assert_eq!(parsed.statement, "CREATE TRIGGER t AFTER INSERT ON books BEGIN SELECT 1; END");

        let parsed = parse_create_trigger(
            "create temp trigger if not exists main.\"odd name\" after update on books\n\
             begin select case when new.pages > 0 then 'end;' else 'x' end; end ; ;",
        )
        .unwrap();
        assert_eq!(parsed.name, "odd name");
        assert!(parsed.statement.ends_with("end"));
    }

    #[test]
    fn test_rejects_statements_after_the_trigger() {
        for sql in [
            "CREATE TRIGGER t AFTER INSERT ON books BEGIN SELECT 1; END; DROP TABLE book_authors;",
            "CREATE TRIGGER t AFTER INSERT ON books BEGIN SELECT 1; END DROP TABLE book_authors",
            "CREATE TRIGGER t AFTER INSERT ON books BEGIN SELECT 1; END; -- ok\nDELETE FROM users;",
        ] {
            assert!(parse_create_trigger(sql).is_err(), "{sql}");
        }
    }

    #[test]
    fn test_rejects_other_or_broken_statements() {
        for sql in [
            "",
            "DROP TABLE users",
            "CREATE TABLE t (id)",
            "CREATE TRIGGER t AFTER INSERT ON books BEGIN SELECT 1;",
            "CREATE TRIGGER t AFTER INSERT ON books BEGIN SELECT 'unterminated; END;",
        ] {
            assert!(parse_create_trigger(sql).is_err(), "{sql}");
        }
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("trg"), "\"trg\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[tokio::test]
    async fn test_install_list_and_drop() {
        let db = Database::in_memory().await.unwrap();
        let triggers = Triggers::new(&db);

        triggers.install_added_date_trigger().await.unwrap();
        triggers.install_added_date_trigger().await.unwrap();

        let listed = triggers.list_triggers().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].trigger_name, ADDED_DATE_TRIGGER);
        assert_eq!(listed[0].event_object_table, "shelf_items");

        triggers.drop_trigger(ADDED_DATE_TRIGGER).await.unwrap();
        assert!(triggers.list_triggers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_added_date_trigger_fills_explicit_null() {
        let db = Database::in_memory().await.unwrap();
        Triggers::new(&db).install_added_date_trigger().await.unwrap();

        let conn = db.connection();
        conn.execute("INSERT INTO users (username, email) VALUES ('a', 'a@b.c')", ()).await.unwrap();
        conn.execute("INSERT INTO custom_shelves (user_id, name) VALUES (1, 's')", ()).await.unwrap();
        conn.execute("INSERT INTO books (title) VALUES ('b')", ()).await.unwrap();
        conn.execute(
            "INSERT INTO shelf_items (shelf_id, book_id, added_date) VALUES (1, 1, NULL)",
            (),
        )
        .await
        .unwrap();

        let mut rows = conn.query("SELECT added_date FROM shelf_items", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let added: Option<String> = row.get(0).unwrap();
        assert!(added.is_some());
    }

    #[tokio::test]
    async fn test_create_runs_only_the_trigger() {
        let db = Database::in_memory().await.unwrap();
        let triggers = Triggers::new(&db);

        let trigger = parse_create_trigger(
            "CREATE TRIGGER trg_touch AFTER INSERT ON books BEGIN SELECT 1; END;",
        )
        .unwrap();
        triggers.create_trigger(&trigger).await.unwrap();

        let names: Vec<String> = triggers
            .list_triggers()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.trigger_name)
            .collect();
        assert_eq!(names, vec!["trg_touch"]);

        let mut rows = db
            .connection()
            .query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'book_authors'", ())
            .await
            .unwrap();
        assert!(rows.next().await.unwrap().is_some());
    }
}
