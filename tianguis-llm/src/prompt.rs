//! Prompt templates for vendor replies.
//!
//! The system prompt is assembled from three pieces: the vendor's persona,
//! the game rules (always present) and, on the terminal round only, the
//! scoring rubric that asks for a `[REWARD: X]` line. Templates use `{key}`
//! placeholders filled by [`render_template`].

/// Game rules shown on every round.
pub const GAME_RULES: &str = "REGLAS DEL JUEGO:
- Estás en un tianguis mexicano y el jugador (un gatito) quiere que le regales {reward_item}.
- Tu dificultad de convencer es {difficulty}/10 (donde 10 es muy difícil).
- Esta es la ronda {round} de {round_target}.
- Responde SIEMPRE en español mexicano, de forma natural y en primera persona.
- Tus respuestas deben ser cortas (1-2 oraciones completas).
- NUNCA dejes oraciones incompletas. Siempre termina lo que empiezas a decir.
- Mantén tu personalidad consistente.";

/// Scoring rubric appended on the terminal round.
pub const TERMINAL_RUBRIC: &str = "IMPORTANTE: Esta es la ÚLTIMA ronda. Debes decidir cuánto darle al jugador.
Al final de tu respuesta, DEBES incluir en una línea separada:
[REWARD: X]
Donde X es un número del 0 al 15 basado en qué tan bien te convenció.

CRITERIOS ESTRICTOS:
- 0: Excusa terrible, grosero, no tiene sentido, o simplemente no te convenció nada. RECHAZA sin pena.
- 1-2: Excusa muy mala o poco esfuerzo. Casi lo rechazas pero le das algo mínimo.
- 3-4: Excusa normal, nada especial. Lo estándar.
- 5-7: Buena excusa, te hizo reír o pensar.
- 8-10: Muy buena excusa, realmente te convenció.
- 11-15: Excusa INCREÍBLE (muy muy raro, casi nunca dar esto).

IMPORTANTE: Tu dificultad es {difficulty}/10. Si eres difícil (7+), sé MUY exigente y da 0-2 a excusas normales.
Si el jugador dice tonterías, insulta, o su excusa no tiene sentido, dale 0 sin dudar.
No tengas miedo de rechazar. Es parte del juego.";

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value in a single pass over the
/// template; substituted values are never scanned again. Unknown
/// placeholders and unmatched braces are left as written.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                result.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                result.push('{');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

/// Per-turn facts that shape the vendor's system prompt.
#[derive(Debug, Clone, Copy)]
pub struct VendorPrompt<'a> {
    /// Free-text persona.
    pub persona: &'a str,
    /// What the player is asking for.
    pub reward_item: &'a str,
    /// 1–10.
    pub difficulty: u8,
    /// 1-based round being played.
    pub round: u32,
    /// Rounds in this session.
    pub round_target: u32,
}

impl VendorPrompt<'_> {
    /// Whether this is the round on which the vendor must score the player.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.round >= self.round_target
    }

    /// Render the full system prompt.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        let difficulty = self.difficulty.to_string();
        let round = self.round.to_string();
        let round_target = self.round_target.to_string();
        let vars = [
            ("reward_item", self.reward_item),
            ("difficulty", difficulty.as_str()),
            ("round", round.as_str()),
            ("round_target", round_target.as_str()),
        ];

        let mut prompt = format!(
            "{}\n\n{}",
            self.persona.trim(),
            render_template(GAME_RULES, &vars)
        );
        if self.is_terminal() {
            prompt.push_str("\n\n");
            prompt.push_str(&render_template(TERMINAL_RUBRIC, &vars));
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(round: u32, round_target: u32) -> VendorPrompt<'static> {
        VendorPrompt {
            persona: "Eres Doña María, una señora amable.",
            reward_item: "frutas frescas",
            difficulty: 3,
            round,
            round_target,
        }
    }

    #[test]
    fn render_replaces_all_occurrences() {
        let out = render_template("{a} y {a} con {b}", &[("a", "uno"), ("b", "dos")]);
        assert_eq!(out, "uno y uno con dos");
    }

    #[test]
    fn render_does_not_expand_placeholders_inside_values() {
        let out = render_template(
            "quiere {reward_item}, dificultad {difficulty}",
            &[("reward_item", "tacos {difficulty}"), ("difficulty", "7")],
        );
        assert_eq!(out, "quiere tacos {difficulty}, dificultad 7");
    }

    #[test]
    fn render_keeps_unknown_placeholders_and_stray_braces() {
        let out = render_template("{x} {a} } {", &[("a", "uno")]);
        assert_eq!(out, "{x} uno } {");
    }

    #[test]
    fn roster_item_with_braces_is_rendered_verbatim() {
        let text = VendorPrompt {
            reward_item: "pan {round_target}",
            ..prompt(2, 5)
        }
        .system_prompt();
        assert!(text.contains("regales pan {round_target}."));
        assert!(text.contains("Esta es la ronda 2 de 5."));
    }

    #[test]
    fn non_terminal_prompt_has_rules_but_no_rubric() {
        let text = prompt(1, 4).system_prompt();
        assert!(text.starts_with("Eres Doña María"));
        assert!(text.contains("Esta es la ronda 1 de 4."));
        assert!(text.contains("regales frutas frescas"));
        assert!(!text.contains("[REWARD: X]"));
        assert!(!text.contains('{'));
    }

    #[test]
    fn terminal_prompt_carries_rubric_with_difficulty() {
        let text = prompt(4, 4).system_prompt();
        assert!(text.contains("[REWARD: X]"));
        assert!(text.contains("Tu dificultad es 3/10"));
        assert!(text.contains("11-15"));
        assert!(!text.contains('{'));
    }
}
