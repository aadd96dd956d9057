//! Fixed instruction prompts, one per extraction operation.
//!
//! Each prompt pins the output contract: plain text for tidying, answers
//! and summaries; a bare JSON document for everything else.

use rolo_core::ContactFields;

pub const TIDY_SYSTEM: &str = "You clean up voice note transcripts before they are processed. \
Fix transcription artifacts: misheard names of people and companies, homophones, \
run-on words, and filler words such as \"um\", \"uh\" and \"you know\".

Rules:
- Keep the meaning exactly the same. Do not add, remove, or reinterpret facts.
- Keep the speaker's wording where it is already clear.
- Return ONLY the cleaned transcript text, with no preamble or commentary.";

pub const EXTRACT_PERSON_SYSTEM: &str = "You extract structured information about a person from voice note transcripts. \
Return ONLY valid JSON, no other text.

The JSON must have these fields:
- name (string, required): The person's full name
- company (string or null): Where they work
- role (string or null): Their job title or role
- email (string or null): Email address, if stated
- phone (string or null): Phone number, if stated
- personalDetails (string or null): Personal information like family, pets, hobbies, interests, preferences
- notes (string or null): Any other relevant information that doesn't fit above
- source (string or null): Where/how the speaker met this person (event, introduction, context)
- birthdayMonth (integer 1-12 or null): Birthday month, if stated
- birthdayDay (integer 1-31 or null): Birthday day of month, if stated
- children (string or null): Information about their children

If a field isn't mentioned in the transcript, set it to null. Never use an empty string. \
Clean up any transcription artifacts or filler words. Write in clear, concise language.";

pub const EXTRACT_PEOPLE_SYSTEM: &str = "You are a data extraction assistant. Your job is to find ALL contacts/people \
mentioned in the provided file content and extract structured information about each one.

The file content could be in any format: CSV, TSV, spreadsheet data, plain text notes, JSON, markdown, \
or any other format. Analyze the structure and extract every person you can find.

Return ONLY a valid JSON array of objects. Each object must have these fields:
- name (string, required): The person's full name
- company (string or null): Where they work / their organization
- role (string or null): Their job title or role
- email (string or null): Email address
- phone (string or null): Phone number
- personalDetails (string or null): Personal information like family, pets, hobbies, interests, preferences
- notes (string or null): Any other relevant information that doesn't fit above
- source (string or null): Where/how the user knows this person, or any context about the relationship
- birthdayMonth (integer 1-12 or null)
- birthdayDay (integer 1-31 or null)
- children (string or null): Information about their children

Rules:
- Return ONLY the JSON array, no other text
- If a field isn't available for a person, set it to null
- Every entry MUST have a name. Skip entries that don't have a name
- Combine related information intelligently (e.g. separate first/last name columns become one \"name\")
- If the data has columns that don't map to the above fields, include that information in \"notes\"
- Do NOT invent information that isn't in the source data";

/// Queryable fields as described to the backend.
pub const SCHEMA_DESCRIPTION: &str = "The \"people\" table has these columns:
- name (text, required): Person's full name
- company (text, nullable): Where they work
- role (text, nullable): Job title
- email (text, nullable): Email address
- phone (text, nullable): Phone number
- personalDetails (text, nullable): Personal info (family, hobbies, interests)
- notes (text, nullable): Misc notes
- source (text, nullable): How the user met them
- birthdayMonth (integer, nullable): Birth month 1-12
- birthdayDay (integer, nullable): Birth day 1-31
- children (text, nullable): Info about their children
- createdAt (timestamp): When record was created
- updatedAt (timestamp): When record was last updated";

/// Instruction for translating a question into a query spec.
pub fn translate_system() -> String {
    format!(
        "You convert natural language questions about a user's contacts into structured JSON filters.

{}

Return ONLY valid JSON with this shape:
{{
  \"filters\": [
    {{ \"field\": \"<column_name>\", \"op\": \"<operator>\", \"value\": \"<value>\" }}
  ],
  \"sort\": {{ \"field\": \"<column_name>\", \"direction\": \"asc\" | \"desc\" }} | null,
  \"summary\": \"<one sentence describing what this query finds>\"
}}

Supported operators: eq, ilike, gt, lt, gte, lte, isNull, isNotNull
- For text searches use \"ilike\" with % wildcards (e.g. \"%Google%\")
- For date-related queries use birthdayMonth and birthdayDay integers
- Only use the columns listed above
- \"filters\" can be an empty array if the query asks for all contacts
- \"sort\" can be null for default ordering (by updatedAt desc)

Examples:
- \"Who works at Google?\" -> filters: [{{\"field\":\"company\",\"op\":\"ilike\",\"value\":\"%Google%\"}}]
- \"People with birthdays in March\" -> filters: [{{\"field\":\"birthdayMonth\",\"op\":\"eq\",\"value\":3}}]
- \"Who have I met recently?\" -> filters: [], sort: {{\"field\":\"createdAt\",\"direction\":\"desc\"}}
- \"People I met at the conference\" -> filters: [{{\"field\":\"source\",\"op\":\"ilike\",\"value\":\"%conference%\"}}]
- \"Contacts without a company\" -> filters: [{{\"field\":\"company\",\"op\":\"isNull\"}}]",
        SCHEMA_DESCRIPTION
    )
}

pub const ANSWER_SYSTEM: &str = "You are a helpful assistant answering questions about a user's personal contacts. \
Based on the search results provided, give a clear, concise answer to the user's question. \
If results are truncated, mention that more may exist. Keep answers brief and conversational. \
Only use the contacts listed; never invent people or details.";

pub const SUMMARY_SYSTEM: &str = "You generate a short one-sentence summary of a contact for display in a contacts list. \
The summary should help the user quickly remember who this person is when scrolling through their contacts.

Rules:
- Write exactly ONE concise sentence (under 120 characters if possible)
- Focus on the most identifying or memorable details (role, company, how they met, personal connection)
- Do not start with the person's name (it's already shown separately)
- Write in a natural, informal tone
- If very little information is available, summarize what you have
- Do not include email or phone, those are shown elsewhere
- Return ONLY the summary sentence, nothing else";

pub fn tidy_prompt(raw: &str) -> String {
    format!("Clean up this voice note transcript:\n\n{}", raw)
}

pub fn extract_person_prompt(transcript: &str) -> String {
    format!(
        "Extract information about the person from this voice note transcript:\n\n{}",
        transcript
    )
}

pub fn extract_people_prompt(text: &str) -> String {
    format!("Extract all contacts from this file content:\n\n{}", text)
}

pub fn answer_prompt(question: &str, context: &str) -> String {
    format!("Question: {}\n\n{}", question, context)
}

/// Contact fields as the summary prompt lists them. Email and phone are
/// left out so they cannot leak into the sentence.
pub fn summary_prompt(fields: &ContactFields) -> String {
    let mut lines = vec![format!("Name: {}", fields.name)];
    let optional = [
        ("Role", &fields.role),
        ("Company", &fields.company),
        ("How we met", &fields.source),
        ("Personal details", &fields.personal_details),
        ("Notes", &fields.notes),
        ("Children", &fields.children),
    ];
    for (label, value) in optional {
        if let Some(v) = value {
            lines.push(format!("{}: {}", label, v));
        }
    }
    if let (Some(month), Some(day)) = (fields.birthday_month, fields.birthday_day) {
        lines.push(format!("Birthday: {}/{}", month, day));
    }
    format!(
        "Generate a one-sentence summary for this contact:\n\n{}",
        lines.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_prompt_lists_every_operator() {
        let prompt = translate_system();
        for op in ["eq", "ilike", "gt", "lt", "gte", "lte", "isNull", "isNotNull"] {
            assert!(prompt.contains(op), "missing {}", op);
        }
        assert!(prompt.contains("birthdayMonth (integer, nullable)"));
        assert!(prompt.contains("{ \"field\""));
    }

    #[test]
    fn test_summary_prompt_excludes_contact_details() {
        let fields = ContactFields {
            name: "Ana".into(),
            email: Some("ana@example.com".into()),
            phone: Some("555-0100".into()),
            role: Some("CTO".into()),
            birthday_month: Some(4),
            birthday_day: Some(2),
            ..Default::default()
        };
        let prompt = summary_prompt(&fields);
        assert!(prompt.contains("Role: CTO"));
        assert!(prompt.contains("Birthday: 4/2"));
        assert!(!prompt.contains("ana@example.com"));
        assert!(!prompt.contains("555-0100"));
    }
}
