use serde::{Deserialize, Serialize};

pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Prompt text with a single `{text}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn has_placeholder(&self) -> bool {
        self.0.contains(TEXT_PLACEHOLDER)
    }

    pub fn render(&self, text: &str) -> String {
        self.0.replace(TEXT_PLACEHOLDER, text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Templates consumed by the reducer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    /// Applied to every chunk in the map step.
    pub map: PromptTemplate,
    /// Applied once to the ordered partial summaries.
    pub combine: PromptTemplate,
    /// Combine prompt for the conservative pass; falls back to `combine`.
    pub conservative_combine: Option<PromptTemplate>,
}

impl Prompts {
    pub fn combine_for_conservative(&self) -> &PromptTemplate {
        self.conservative_combine.as_ref().unwrap_or(&self.combine)
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            map: PromptTemplate::new(MAP_PROMPT),
            combine: PromptTemplate::new(SUMMARY_PROMPT),
            conservative_combine: Some(PromptTemplate::new(SAFE_SUMMARY_PROMPT)),
        }
    }
}

static MAP_PROMPT: &str = r#"Write a concise summary of the following:


"{text}"


CONCISE SUMMARY:"#;

static SUMMARY_PROMPT: &str = r#"
Task: As an expert content analyzer, create a comprehensive summary and Q&A set for the following YouTube video transcript.

### Transcript to Analyze:
{text}

Please provide your analysis in the following structured format:

## Summary:
[Create a clear, well-organized summary of the main points and key insights from the video]

## Example Questions and Answers:
1. **Question:** [Specific, detailed question about a key point]
   **Answer:** [Clear, accurate answer based on the transcript]

2. **Question:** [Specific, detailed question about another important aspect]
   **Answer:** [Clear, accurate answer based on the transcript]

3. **Question:** [Specific, detailed question about unique insights]
   **Answer:** [Clear, accurate answer based on the transcript]

Guidelines:
- Focus on factual content and valuable insights
- Make questions specific and detailed
- Format output in clean Markdown
- Maintain professional, objective tone
- Include the most important and interesting information
"#;

static SAFE_SUMMARY_PROMPT: &str = r#"
Task: Create an academic summary and educational Q&A for the following video transcript.

### Content to Analyze:
{text}

Please provide:

## Key Points Summary:
[Present main educational points and insights]

## Learning Questions:
1. **Study Question:** [Educational question about main concept]
   **Key Learning:** [Educational answer focusing on facts]

2. **Study Question:** [Educational question about key details]
   **Key Learning:** [Educational answer focusing on facts]

3. **Study Question:** [Educational question about practical takeaways]
   **Key Learning:** [Educational answer focusing on facts]

Guidelines:
- Focus on educational value
- Use academic language
- Maintain objective tone
- Format in clear Markdown
- Emphasize factual content
"#;
