use super::models::ChatMessage;
use super::LlmError;
use crate::db::models::SchemaInfo;

pub const SYSTEM_PROMPT: &str =
    "You are a PostgreSQL expert. You convert natural language into SQL.";

/// Builds the user prompt: the table list, the question verbatim, and the output rules.
pub fn compose_prompt(schema: &SchemaInfo, question: &str) -> String {
    let mut schema_text = String::from("Database schema:\n");
    for table in schema.table_names() {
        schema_text.push_str(&format!("- {}\n", table));
    }

    format!(
        r#"You are a PostgreSQL expert. Convert the user's natural-language question into SQL based on the database schema below.

{}
User question: {}

Requirements:
1. Generate PostgreSQL-compatible SQL
2. Generate a SELECT query only (UPDATE, DELETE, DROP, INSERT and other modifying statements are forbidden)
3. Return only the SQL (no explanation)
4. Generate exactly one query

SQL:"#,
        schema_text, question
    )
}

/// The two-message exchange sent to chat backends.
pub fn chat_messages(schema: &SchemaInfo, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(compose_prompt(schema, question)),
    ]
}

/// Removes ```` ```sql ```` and ```` ``` ```` fences and surrounding whitespace.
pub fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .replace("```sql", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Strips the completion and rejects an empty statement.
pub fn finish_sql(raw: &str) -> Result<String, LlmError> {
    let sql = strip_code_fences(raw);
    if sql.is_empty() {
        return Err(LlmError::ResponseError(
            "Model returned no SQL".to_string(),
        ));
    }
    Ok(sql)
}
