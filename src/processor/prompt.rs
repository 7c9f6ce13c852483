//! Prompt templates for the summarization passes

use crate::profile::profile_schema;

const MAP_TEMPLATE: &str = "Summarize the following text in a clear and concise way:
TEXT:`{text}`
Brief Summary:";

const COMBINE_TEMPLATE: &str = "Generate a summary of the following text that includes the following elements in JSON format:

* title: A title that accurately reflects the content of the text.
* summary: The summary of the website's content, as a string.
* company_name: The name of the company, as a string.
* industry: The industry that this company is in.
* employees: Every team member, director and advisor named in the text, with their name, title, position and location when given. List only real individuals whose names appear in the text. Do not summarize or aggregate the members and never invent employees.
* value_proposition: The value proposition of the company.
* competition: Competing firms. Each entry is a string and may include details about their products, pricing strategies, market share, customer base, marketing approaches and any other factors that impact their competitiveness in the industry.

Answer with a single JSON object and nothing else. title, summary and company_name are required. Use null for unknown optional values and [] for empty lists. All values are strings.

The object must match this JSON schema:
{schema}

Text:`{text}`";

const REFINE_HEADER: &str = "Your job is to produce a final company profile in JSON format.
We have provided an existing profile up to a certain point:";

const REFINE_CONTEXT: &str =
    "We have the opportunity to refine the existing profile (only if needed) with some more context below.";

const REFINE_RULE: &str = "------------";

const REFINE_INSTRUCTIONS: &str = "Given the new context, refine the profile. Keep the same JSON structure and fields, keep every employee that is named in either the profile or the context, and never invent employees. If the context isn't useful, return the existing profile unchanged. Answer with the JSON object only.";

/// Prompt for summarizing a single chunk, also used to collapse partial summaries
pub fn map_prompt(text: &str) -> String {
    MAP_TEMPLATE.replace("{text}", text)
}

/// Prompt that turns summaries or raw text into the structured profile
pub fn combine_prompt(text: &str) -> String {
    COMBINE_TEMPLATE
        .replace("{schema}", profile_schema())
        .replace("{text}", text)
}

/// Prompt that refines a running profile with one more chunk
///
/// Built from fixed pieces so placeholder-like text inside the running
/// answer or the chunk is passed through untouched.
pub fn refine_prompt(existing: &str, text: &str) -> String {
    format!(
        "{}\n{}\n\n{}\n{rule}\n{}\n{rule}\n{}",
        REFINE_HEADER,
        existing,
        REFINE_CONTEXT,
        text,
        REFINE_INSTRUCTIONS,
        rule = REFINE_RULE,
    )
}
