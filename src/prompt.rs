//! Prompt templates for the query agent and the copywriter.
//!
//! Templates use `{{name}}` placeholders filled by [`render`]. Placeholders
//! without a binding are left intact so a missing value is visible instead of
//! silently blank.

/// Single-shot analyst instructions: the whole table travels with the prompt
/// and one reply settles the question.
pub const ANALYST_TOOL_CALLING: &str = "\
You are a meticulous data analyst. A table has been loaded for you; it is the \
only data source you may use.

Table shape: {{rows}} rows x {{cols}} columns.
Columns: {{columns}}

Table data (CSV):
{{table}}

Answer the user's question about this table. The question arrives as a JSON \
object with a single \"input\" key. Work out any arithmetic carefully. Reply \
with a single JSON object of the form {\"output\": \"<answer>\"} and nothing \
else. Answer in the language of the question.";

/// Iterative analyst instructions: the model reasons in bounded
/// Thought/Action/Observation rounds before committing to the final object.
pub const ANALYST_REACT: &str = "\
You are a meticulous data analyst. A table has been loaded for you; it is the \
only data source you may use.

Table shape: {{rows}} rows x {{cols}} columns.
Columns: {{columns}}

Table data (CSV):
{{table}}

Answer the user's question about this table. The question arrives as a JSON \
object with a single \"input\" key. Reason through at most {{max_iterations}} \
internal rounds, each a Thought, an Action (the table operation you run), and \
its Observation. Keep the rounds to yourself: the reply must be exactly one \
JSON object of the form {\"output\": \"<answer>\"}. Answer in the language of \
the question.";

/// Marketing copy brief used by the copywriter binary.
pub const MARKETING_COPY: &str = "\
Eres un copywriter senior especializado en marketing digital.

Escribe un copy de marketing para {{producto}}, dirigido a {{publico}}, en \
tono {{tono}}. Beneficios clave que debes destacar: {{beneficios}}.

Estructura: un gancho inicial, dos o tres frases de desarrollo y una llamada \
a la acción clara. Devuelve solo el texto del copy, sin explicaciones.";

/// Fill `{{name}}` placeholders from the given bindings.
pub fn render(template: &str, bindings: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in bindings {
        out = out.replace(&format!("{{{{{}}}}}", name), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_all_occurrences() {
        let out = render("{{a}} y {{b}} y {{a}}", &[("a", "uno"), ("b", "dos")]);
        assert_eq!(out, "uno y dos y uno");
    }

    #[test]
    fn unbound_placeholders_stay_visible() {
        let out = render("hola {{nombre}}", &[]);
        assert_eq!(out, "hola {{nombre}}");
    }

    #[test]
    fn analyst_templates_demand_the_output_envelope() {
        assert!(ANALYST_TOOL_CALLING.contains("{\"output\":"));
        assert!(ANALYST_REACT.contains("{\"output\":"));
        assert!(ANALYST_REACT.contains("{{max_iterations}}"));
    }
}
