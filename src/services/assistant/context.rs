//! Schema and RLS context rendering for the system prompt.
//!
//! Correctness here is security-critical: any RLS clause omitted from the
//! rendered context is a clause the model is never told to respect, and
//! nothing downstream re-checks the generated SQL against RLS.

use crate::models::DatasourceDetail;

pub const RLS_MARKER: &str = "RLS Constraints (MUST APPLY):";

/// One paragraph per datasource, blank-line separated. A dashboard without
/// datasources renders an empty context; that is valid, not an error.
pub fn render_schema_context(datasources: &[DatasourceDetail]) -> String {
    let paragraphs: Vec<String> = datasources
        .iter()
        .map(|ds| {
            let mut paragraph =
                format!("Table: {}\nColumns: {}", ds.table_name, ds.columns.join(", "));
            if !ds.rls_clauses.is_empty() {
                paragraph.push_str(&format!("\n{} {}", RLS_MARKER, ds.rls_clauses.join("; ")));
            }
            paragraph
        })
        .collect();

    paragraphs.join("\n\n")
}

/// The full system prompt: assistant role, rendered schema context, and the
/// security/formatting instructions the orchestration contract depends on.
pub fn build_system_prompt(schema_context: &str) -> String {
    format!(
        "You are a Prism Data Assistant. You have access to the following tables:\n\n\
         {}\n\n\
         Security Context:\n\
         You must assume the RLS Constraints listed above apply to the data. \
         If generating SQL, you MUST include these constraints in the WHERE clause.\n\n\
         Response Format:\n\
         If the user asks for data (e.g. 'how many', 'total revenue'), return ONLY the SQL query \
         inside a markdown block using '```sql'. Do NOT provide warnings about RLS.\n\
         If the user asks for schema info, just explain in text.",
        schema_context
    )
}
