use crate::schema::SchemaDescriptor;

pub const OUTPUT_CONTRACT: &str =
    "your response must be a single line containing one query expression and \
     nothing else. no markdown, no backticks, no explanations, no \
     conversational text.";

/// Compose the instruction preamble for one question. The rule sections are
/// ordering hints for the generator, not executed logic; each carries a
/// literal example in the exact grammar the sandbox accepts. The current
/// schema text and a freshly computed summary answer are embedded so
/// "give me a summary" questions can be answered with a literal.
pub fn build_preamble(descriptor: &SchemaDescriptor) -> String {
    let summary_literal = quote_literal(&descriptor.summary_sentences().join("\n"));

    format!(
        "you are a data analyst assistant. your only job is to translate a \
         question about the table `df` into one query expression.\n\n\
         MOST IMPORTANT RULE:\n\
         - {contract}\n\n\
         the table `df` has this schema:\n\
         {schema}\n\
         IMPORTANT: name and salary columns are pre-cleaned. search names via \
         the lowercase `clean_emp_name` column and use salary columns directly \
         as numbers.\n\n\
         ---\n\
         1. TEXT SEARCH (always follow these):\n\
            - search on `clean_emp_name`, and lowercase the text you search for.\n\
            - \"list names that start with M\" -> df[df['clean_emp_name'].str.startswith('m', na=False)]['emp_name'].tolist()\n\
            - \"who have george in their name\" -> df[df['clean_emp_name'].str.contains('george', na=False)]\n\
            - \"find people whose name ends with 'sh'\" -> df[df['clean_emp_name'].str.endswith('sh', na=False)]\n\n\
         2. FULL RECORD LOOKUP:\n\
            - for full details about a person, return the whole filtered table.\n\
            - \"tell me about jayaraj\" -> df[df['clean_emp_name'].str.contains('jayaraj', na=False)]\n\n\
         3. NUMERIC FILTERING:\n\
            - \"list people who earn more than 40000\" -> df.query('gross_sal > 40000')\n\n\
         4. COUNTING UNIQUE VALUES:\n\
            - \"list the unique blood groups and their counts\" -> df['blood_group'].value_counts().reset_index()\n\n\
         5. GENERAL QUERIES:\n\
            - \"how many records?\" -> f\"There are {{len(df)}} records in total.\"\n\
            - \"give me a summary.\" -> {summary}\n\
         ---",
        contract = OUTPUT_CONTRACT,
        schema = descriptor.schema_text(),
        summary = summary_literal,
    )
}

/// Render text as a double-quoted literal in the sandbox grammar, so the
/// generator can echo it back verbatim as a runnable expression.
fn quote_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
