//! Extraction prompt rendering.

use crate::providers::{CompletionRequest, Message};

/// Keys the model is asked to return, in prompt order.
pub const EXTRACTION_KEYS: [&str; 9] = [
    "from",
    "to",
    "depdate",
    "retdate",
    "adults",
    "children",
    "infants",
    "cabin",
    "airline_include",
];

const EXTRACTION_INSTRUCTIONS: &str = "\
You are a flight booking assistant.

Extract and return only JSON with the following keys:
- from: departure city
- to: arrival city
- depdate: departure date (natural format like \"after 5 days\" allowed)
- retdate: return date (optional)
- adults: number of adults (default: 1)
- children: number of children (default: 0)
- infants: number of infants (default: 0)
- cabin: cabin class like economy, business (default: economy)
- airline_include: preferred airline if mentioned (e.g., \"by Indigo\")

Only assign a value if it is clearly mentioned in the query.
If a field is missing, set its value to null or \"Not Provided\", except:
- Set \"adults\" to 1 by default
- Set \"children\" and \"infants\" to 0 by default
- Set \"cabin\" to \"economy\" by default

Return valid JSON only. Do not explain anything.";

/// Render the completion prompt for a query. The query is embedded verbatim.
pub fn build_prompt(query: &str) -> String {
    format!("{EXTRACTION_INSTRUCTIONS}\n\nQuery: \"{query}\"\n")
}

/// Wrap the rendered prompt in a single user-role completion request.
pub fn build_request(
    query: &str,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
) -> CompletionRequest {
    CompletionRequest {
        messages: vec![Message::user(build_prompt(query))],
        temperature,
        max_tokens,
    }
}
