//! Instruction rendering
//!
//! Prompts are in Spanish because the complaints and the taxonomy are.

use crate::taxonomy::TAXONOMY;

/// System instruction sent with every call
pub const SYSTEM_PROMPT: &str =
    "Sos un asistente experto en analizar y categorizar quejas de pasajeros.";

/// Instruction for a single complaint, answered as `Categoría:` / `Razón:` lines
pub fn render_single(text: &str) -> String {
    format!(
        "Leé la siguiente queja de un pasajero y devolvé SOLO:\n\
         \n\
         1. La categoría más adecuada según esta lista centrándote en la causa raíz:\n\
         {labels}\n\
         \n\
         2. Una breve razón de por qué fue clasificada así.\n\
         \n\
         Formato de salida:\n\
         Categoría: <nombre de categoría>\n\
         Razón: <explicación>\n\
         \n\
         Texto: {text}\n",
        labels = TAXONOMY.as_bullet_list(),
        text = text.trim(),
    )
}

/// Fixed part of the batch instruction, before any complaint is listed
pub fn batch_header() -> String {
    format!(
        "Clasifica los siguientes comentarios de pasajeros.\n\
         Para cada comentario, devuelve la categoría más adecuada según la causa raíz y una breve razón.\n\
         \n\
         Categorías permitidas:\n\
         {labels}\n\
         \n\
         Tu respuesta debe ser una lista de objetos JSON. Cada objeto debe tener:\n\
         - \"id\": Un número entero que corresponde al índice del comentario en la lista original (empezando por 0).\n\
         - \"categoria\": La categoría asignada.\n\
         - \"razon\": Una breve explicación de la clasificación.\n\
         \n\
         Comentarios a clasificar:\n",
        labels = TAXONOMY.as_bullet_list(),
    )
}

/// Instruction for a chunk; each item is `(local id, text)`
pub fn render_batch(items: &[(usize, &str)]) -> String {
    let mut prompt = batch_header();
    for (id, text) in items {
        prompt.push_str(&format!("{}: \"{}\"\n", id, flatten(text)));
    }
    prompt
}

/// Keep one complaint on one line and its quotes from closing the listing
fn flatten(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('"', "'")
}
