//! Instruction templates, rendered with minijinja.

use minijinja::{Environment, Value, context};

#[derive(Debug, thiserror::Error)]
#[error("failed to render {template} prompt: {source}")]
pub struct PromptError {
  template: &'static str,
  #[source]
  source: minijinja::Error,
}

const CONFIDENCE: &str = "\
Rate your confidence (0-10) in creating {{ action }} for the {{ name }} integration.
Consider: API knowledge, parameter understanding ({{ parameters }}), and documentation need.
Respond ONLY with the confidence number enclosed in ||, for example ||7||.";

const GENERATION: &str = "\
You are an expert in the domain of the {{ name }} integration, generating code. Your task is to create the {{ action }} for the integration.

PREFACE:
A. Use and do EXACTLY what the context tells you to or gives you.
B. The parameters provided are real values, not examples.
C. Ensure all imports are included.
D. Check the validation feedback, if any, and fix what it reports.

RULES:
1. From the context below, identify ALL parameters needed for this action.
2. Use the available parameters wherever needed: {{ parameters }}
3. Include error handling.
4. Return ONLY code.

Documentation:
{{ context }}

Output descriptions of the upstream tasks feeding this one. Ignore the ones that are not relevant:
{% for source in sources %}- {{ source.action }}: {{ source.description }}
{% else %}(none)
{% endfor %}
Extra task description:
{{ task_description }}";

const PLACEHOLDERS: &str = "\
IMPORTANT: For MISSING required parameters only, create placeholders strictly like {{ name_upper }}:PARAM_NAME";

const RETRY: &str =
  "Now, try again. Re-write the code, considering the errors, with the imports and code block:";

const DESCRIPTION: &str = "\
Generate ONLY A TEXT DESCRIPTION (NO CODE) of the outputs of the generated code, for downstream tasks. Rules:
1. NEVER include code or markdown.
2. Describe data formats and structure.
3. Use plain English only.
4. Maximum 2 sentences.

Context: {{ context }}
Parameters: {{ parameters }}";

const VALIDATION: &str = "\
You are an expert {{ name }} API code validator. Analyze this code for {{ action }} using the {{ name }} API.

READ FIRST: IGNORE ALL PLACEHOLDERS. Their format: {{ name_upper }}:PARAM_NAME

Respond ONLY with, as the first thing in your answer:
- \"CODE:VALID\" if the code looks correct. Do not explain anything.
- \"CODE:INVALID\" followed by a list of issues, if and only if problems are found.

Check ONLY for:
1. Missing imports, if needed
2. Incorrect parameter usage
3. Logical errors

Provided parameters:
{{ parameters }}";

const MERGE: &str = "\
Combine these code snippets into a cohesive workflow:
{% for snippet in snippets %}
# {{ snippet.integration }}: {{ snippet.action }}
{{ snippet.artifact }}
{% endfor %}
Requirements:
1. Create a main function that connects all components in the order given
2. Add shared error handling
3. Keep every placeholder from the snippets. For other missing information use <Integration Name:Placeholder Name> format
4. Include necessary imports
5. Make sure indentation and linting are correct
6. Return ONLY the final code";

fn render(
  env: &Environment<'_>,
  template: &'static str,
  text: &str,
  ctx: Value,
) -> Result<String, PromptError> {
  env
    .render_str(text, ctx)
    .map_err(|source| PromptError { template, source })
}

/// Prompt renderer shared by a pipeline's stages.
pub(crate) struct Prompts {
  env: Environment<'static>,
}

impl Prompts {
  pub fn new() -> Self {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    Self { env }
  }

  pub fn confidence(&self, action: &str, name: &str, parameters: &str) -> Result<String, PromptError> {
    render(
      &self.env,
      "confidence",
      CONFIDENCE,
      context! { action, name, parameters },
    )
  }

  pub fn generation(&self, vars: GenerationVars<'_>) -> Result<String, PromptError> {
    render(&self.env, "generation", GENERATION, Value::from_serialize(&vars))
  }

  pub fn placeholders(&self, name: &str) -> Result<String, PromptError> {
    render(
      &self.env,
      "placeholders",
      PLACEHOLDERS,
      context! { name_upper => name.to_uppercase() },
    )
  }

  pub fn retry(&self) -> &'static str {
    RETRY
  }

  pub fn description(&self, context: &str, parameters: &str) -> Result<String, PromptError> {
    render(
      &self.env,
      "description",
      DESCRIPTION,
      context! { context, parameters },
    )
  }

  pub fn validation(&self, action: &str, name: &str, parameters: &str) -> Result<String, PromptError> {
    render(
      &self.env,
      "validation",
      VALIDATION,
      context! { action, name, name_upper => name.to_uppercase(), parameters },
    )
  }

  pub fn merge<S: serde::Serialize>(&self, snippets: &[S]) -> Result<String, PromptError> {
    render(&self.env, "merge", MERGE, context! { snippets })
  }
}

#[derive(serde::Serialize)]
pub(crate) struct GenerationVars<'a> {
  pub name: &'a str,
  pub action: &'a str,
  pub parameters: &'a str,
  pub context: &'a str,
  pub sources: Vec<SourceVar<'a>>,
  pub task_description: &'a str,
}

#[derive(serde::Serialize)]
pub(crate) struct SourceVar<'a> {
  pub action: &'a str,
  pub description: &'a str,
}
